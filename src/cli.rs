use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use streamcopy_av::MediaType;

#[derive(Parser)]
#[command(name = "streamcopy")]
#[command(author, version, about = "Lossless stream extraction, slicing and HLS segmenting")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy one stream into a new container without re-encoding
    Extract {
        /// Input media file or URL
        input: String,

        /// Output file; the container is chosen from its extension
        output: String,

        /// Kind of stream to copy
        #[arg(short, long, value_enum, default_value_t = StreamKind::Audio)]
        media_type: StreamKind,
    },

    /// Copy a time window of one stream without re-encoding
    Slice {
        /// Input media file or URL
        input: String,

        /// Output file; the container is chosen from its extension
        output: String,

        /// Window start in seconds
        #[arg(short, long)]
        start: f64,

        /// Window length in seconds
        #[arg(short, long)]
        duration: f64,

        /// Kind of stream to copy
        #[arg(short, long, value_enum, default_value_t = StreamKind::Audio)]
        media_type: StreamKind,
    },

    /// Repackage the video stream as HLS segments with a playlist
    Segment {
        /// Input media file or URL
        input: String,

        /// Playlist path; segments are written next to it
        playlist: String,
    },

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Stream kinds selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StreamKind {
    Audio,
    Video,
    Subtitle,
}

impl From<StreamKind> for MediaType {
    fn from(kind: StreamKind) -> Self {
        match kind {
            StreamKind::Audio => MediaType::Audio,
            StreamKind::Video => MediaType::Video,
            StreamKind::Subtitle => MediaType::Subtitle,
        }
    }
}
