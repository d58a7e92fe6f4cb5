mod cli;

use streamcopy::config;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;
use std::process::ExitCode;
use streamcopy_av::{
    libavformat_version, MediaSummary, NativeBackend, Progress, RemuxReport, Remuxer,
    TimeWindow,
};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config is needed before logging starts, for its filter
    let loaded = config::load_config_or_default(cli.config.as_deref());

    // Initialize logging
    // RUST_LOG wins, then the config file's filter, then defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| {
            loaded
                .as_ref()
                .ok()
                .and_then(|c| c.logging.filter.clone())
        })
        .unwrap_or_else(|| {
            if cli.verbose {
                "streamcopy=trace,streamcopy_av=trace".to_string()
            } else {
                "streamcopy=info,streamcopy_av=info".to_string()
            }
        });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Extract {
            input,
            output,
            media_type,
        } => loaded.and_then(|config| {
            let remuxer = Remuxer::with_options(NativeBackend::new(), config.remux_options());
            let mut on_progress = print_progress;
            let report =
                remuxer.extract(&input, &output, media_type.into(), Some(&mut on_progress))?;
            print_report(&output, &report);
            Ok(())
        }),
        Commands::Slice {
            input,
            output,
            start,
            duration,
            media_type,
        } => loaded.and_then(|config| {
            let remuxer = Remuxer::with_options(NativeBackend::new(), config.remux_options());
            let window = TimeWindow::new(start, duration);
            let report = remuxer.slice(&input, &output, media_type.into(), window)?;
            print_report(&output, &report);
            Ok(())
        }),
        Commands::Segment { input, playlist } => loaded.and_then(|config| {
            let remuxer = Remuxer::with_options(NativeBackend::new(), config.remux_options());
            let report = remuxer.segment(&input, &playlist)?;
            print_report(&playlist, &report);
            Ok(())
        }),
        Commands::Probe { file, json } => probe_file(&file, json),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            let (major, minor, micro) = libavformat_version();
            println!("streamcopy {}", env!("CARGO_PKG_VERSION"));
            println!("libavformat {}.{}.{}", major, minor, micro);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<streamcopy_av::Error>() {
                Some(av) => eprintln!("error: {:#} (code {})", e, av.code()),
                None => eprintln!("error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn print_progress(progress: Progress) {
    match progress.fraction() {
        Some(fraction) => println!("Progress: {:.1}%", fraction * 100.0),
        None => println!("Progress: {} ticks", progress.processed),
    }
}

fn print_report(output: &str, report: &RemuxReport) {
    tracing::debug!("Report: {:?}", report);
    println!(
        "Wrote {} packets from stream #{} to {}",
        report.packets_written, report.input_stream, output
    );
    if report.write_failures > 0 {
        println!("  Skipped {} packets that failed to write", report.write_failures);
    }
}

fn probe_file(file: &str, json: bool) -> Result<()> {
    let summary = streamcopy_av::probe(file)?;

    if json {
        let json_str = serde_json::to_string_pretty(&summary)?;
        println!("{}", json_str);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &MediaSummary) {
    println!("File: {}", summary.url);
    println!("Container: {}", summary.format);

    let millis = (summary.duration_seconds * 1000.0).round() as u64;
    let secs = millis / 1000;
    let mins = secs / 60;
    let hours = mins / 60;
    println!(
        "Duration: {:02}:{:02}:{:02}.{:03}",
        hours,
        mins % 60,
        secs % 60,
        millis % 1000
    );
    if let Some(ref brand) = summary.major_brand {
        println!("Major brand: {}", brand);
    }
    if let Some(ref timecode) = summary.timecode {
        println!("Timecode: {}", timecode);
    }

    println!("\nStreams: {}", summary.streams.len());
    for stream in &summary.streams {
        print!(
            "  [{}] {} {} (time base {})",
            stream.index, stream.media_type, stream.codec, stream.time_base
        );
        if let (Some(width), Some(height)) = (stream.width, stream.height) {
            print!(" {}x{}", width, height);
        }
        if stream.frame_rate > 0.0 {
            print!(", {:.3} fps", stream.frame_rate);
        }
        if stream.sample_aspect_ratio.num != 0 {
            print!(", SAR {}", stream.sample_aspect_ratio);
        }
        if stream.rotation != 0 {
            print!(", rotated {}°", stream.rotation);
        }
        if let Some(rate) = stream.sample_rate {
            print!(" {} Hz", rate);
        }
        if let Some(channels) = stream.channels {
            print!(" {}ch", channels);
        }
        if let Some(ref lang) = stream.language {
            print!(" ({})", lang);
        }
        println!();
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let (config, source) = match path {
        Some(p) => (config::load_config(p)?, Some(p.to_path_buf())),
        None => match config::find_config() {
            Some(found) => (config::load_config(&found)?, Some(found)),
            None => (config::Config::default(), None),
        },
    };

    match source {
        Some(p) => println!("✓ Configuration is valid: {:?}", p),
        None => println!("No config file found, using defaults"),
    }
    println!("  Progress interval: {}", config.remux.progress_interval);
    println!(
        "  Segments: {} ({} playlist)",
        config.segment.segment_type.as_str(),
        config.segment.playlist_type.as_str()
    );
    if let Some(secs) = config.segment.segment_duration_secs {
        println!("  Segment duration: {}s", secs);
    }
    if let Some(ref filter) = config.logging.filter {
        println!("  Log filter: {}", filter);
    }

    Ok(())
}
