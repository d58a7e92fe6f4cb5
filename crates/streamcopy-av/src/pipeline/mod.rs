//! Stream-copy remux pipelines.
//!
//! Every entry point runs the same stages: open and probe the input, select
//! one stream and mute the rest, configure an output with a copy of that
//! stream, copy packets until the input or the window ends, write the
//! trailer. The [`Session`] guard releases both containers exactly once on
//! every path out of a run.
//!
//! Three copy modes share the loop:
//!
//! - **Extraction** forwards every packet of the selected stream unchanged.
//! - **Slicing** forwards packets whose pts, relative to the first packet
//!   read, falls inside the requested window.
//! - **Segmented** output rescales timestamps into the muxer's time-base and
//!   writes HLS segments next to the playlist. Its video stream is the
//!   backend's best one rather than the first, so cover art is passed over.

mod session;

pub use session::Stage;

use serde::{Deserialize, Serialize};

use crate::container::{Backend, Input, MuxOptions, Output, Packet, SeekMode};
use crate::duration::progress_total;
use crate::select::{select_best_stream, select_stream, DiscardPolicy};
use crate::types::{MediaType, Progress, Rational, TickWindow, TimeWindow};
use crate::{Error, Result};
use session::Session;

/// Forwarded packets between two progress reports.
pub const PROGRESS_INTERVAL: u64 = 100;

/// Muxer used for segmented output.
pub const SEGMENT_FORMAT: &str = "hls";

/// Media segment container of segmented output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentType {
    /// Fragmented MP4 segments with a separate init segment.
    #[default]
    Fmp4,
    /// MPEG-TS segments.
    MpegTs,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Fmp4 => "fmp4",
            SegmentType::MpegTs => "mpegts",
        }
    }
}

/// Playlist type written into the HLS playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    #[default]
    Vod,
    Event,
}

impl PlaylistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistType::Vod => "vod",
            PlaylistType::Event => "event",
        }
    }
}

/// Options for segmented output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    pub segment_type: SegmentType,
    pub playlist_type: PlaylistType,
    /// Init segment file name for fMP4 segments, `init.mp4` when unset.
    pub init_filename: Option<String>,
    /// Target segment duration in seconds, muxer default when unset.
    pub segment_duration: Option<f64>,
}

impl SegmentOptions {
    /// Init segment file name actually used.
    pub fn init_filename(&self) -> &str {
        self.init_filename.as_deref().unwrap_or("init.mp4")
    }

    /// Muxer options passed to the HLS muxer.
    pub fn mux_options(&self) -> MuxOptions {
        let mut options = MuxOptions::new();
        options
            .set("hls_segment_type", self.segment_type.as_str())
            .set("hls_playlist_type", self.playlist_type.as_str());
        if self.segment_type == SegmentType::Fmp4 {
            options.set("hls_fmp4_init_filename", self.init_filename());
        }
        if let Some(seconds) = self.segment_duration {
            options.set("hls_time", seconds.to_string());
        }
        options
    }
}

/// Pipeline tuning shared by every run of a [`Remuxer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemuxOptions {
    /// Forwarded packets between two progress reports.
    pub progress_interval: u64,
    pub segment: SegmentOptions,
}

impl Default for RemuxOptions {
    fn default() -> Self {
        Self {
            progress_interval: PROGRESS_INTERVAL,
            segment: SegmentOptions::default(),
        }
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemuxReport {
    /// Index of the selected input stream.
    pub input_stream: usize,
    /// Number of streams in the output.
    pub output_streams: usize,
    pub packets_read: u64,
    pub packets_written: u64,
    /// Packets read but not forwarded.
    pub packets_dropped: u64,
    /// Packets whose write failed and were skipped.
    pub write_failures: u64,
    /// Pts of the first written packet, in the output stream's time-base.
    pub first_pts: Option<i64>,
    /// Pts of the last written packet, in the output stream's time-base.
    pub last_pts: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Extract,
    Slice(TimeWindow),
    Segment,
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Mode::Extract => "extract",
            Mode::Slice(_) => "slice",
            Mode::Segment => "segment",
        }
    }
}

/// Per-run copy state, fixed once the output is configured.
enum CopyState {
    Extract {
        total: i64,
    },
    Slice {
        window: TickWindow,
        base_pts: Option<i64>,
    },
    Segment {
        from: Rational,
        to: Rational,
    },
}

/// Runs remux pipelines against one backend.
#[derive(Debug, Clone, Default)]
pub struct Remuxer<B> {
    backend: B,
    options: RemuxOptions,
}

impl<B: Backend> Remuxer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, RemuxOptions::default())
    }

    pub fn with_options(backend: B, options: RemuxOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &RemuxOptions {
        &self.options
    }

    /// Copy the first stream of `media_type` into a new single-stream
    /// container at `output`.
    ///
    /// `on_progress` is called every [`RemuxOptions::progress_interval`]
    /// forwarded packets, whether or not their write succeeded, with the
    /// last written pts and the expected total, both in the stream's
    /// time-base.
    pub fn extract(
        &self,
        input: &str,
        output: &str,
        media_type: MediaType,
        on_progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<RemuxReport> {
        self.run(input, output, media_type, Mode::Extract, on_progress)
    }

    /// Copy the part of the first stream of `media_type` that falls inside
    /// `window`.
    ///
    /// The input is first seeked to the window start. The window is then
    /// measured from the first packet read after the seek; timestamps are
    /// written unchanged.
    pub fn slice(
        &self,
        input: &str,
        output: &str,
        media_type: MediaType,
        window: TimeWindow,
    ) -> Result<RemuxReport> {
        if !window.is_valid() {
            return Err(Error::invalid_argument(format!(
                "invalid time window: start {}s, duration {}s",
                window.start_seconds, window.duration_seconds
            )));
        }
        self.run(input, output, media_type, Mode::Slice(window), None)
    }

    /// Repackage the best video stream of `input` as HLS segments described
    /// by the playlist at `playlist`. Attached pictures are never chosen.
    pub fn segment(&self, input: &str, playlist: &str) -> Result<RemuxReport> {
        self.run(input, playlist, MediaType::Video, Mode::Segment, None)
    }

    fn run(
        &self,
        input: &str,
        output: &str,
        media_type: MediaType,
        mode: Mode,
        on_progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<RemuxReport> {
        tracing::debug!(
            "Starting {} of {} stream: {} -> {}",
            mode.name(),
            media_type,
            input,
            output
        );

        let mut session = Session::<B>::new();
        let result = self.drive(&mut session, input, output, media_type, mode, on_progress);
        session.close();

        match &result {
            Ok(report) => tracing::info!(
                "Finished {} of {}: {} packets written, {} dropped, {} failed",
                mode.name(),
                input,
                report.packets_written,
                report.packets_dropped,
                report.write_failures
            ),
            Err(e) => tracing::error!(
                "{} of {} failed (code {}): {}",
                mode.name(),
                input,
                e.code(),
                e
            ),
        }

        result
    }

    fn drive(
        &self,
        session: &mut Session<B>,
        url: &str,
        path: &str,
        media_type: MediaType,
        mode: Mode,
        mut on_progress: Option<&mut dyn FnMut(Progress)>,
    ) -> Result<RemuxReport> {
        // Closed -> Opened
        let input = session.input.insert(self.backend.open_input(url)?);
        input.find_stream_info()?;
        session.stage.advance(Stage::Opened);

        // Opened -> OutputConfigured
        let policy = DiscardPolicy::AllButSelected;
        let selected = match mode {
            Mode::Segment => select_best_stream(input, media_type, policy)?,
            _ => select_stream(input, media_type, policy)?,
        };
        let stream = input.streams()[selected].clone();

        let mut window = None;
        if let Mode::Slice(requested) = mode {
            let ticks = requested.to_ticks(stream.time_base);
            input.seek(selected, ticks.start, SeekMode::Backward)?;
            input.flush();
            window = Some(ticks);
        }

        let format = match mode {
            Mode::Segment => Some(SEGMENT_FORMAT),
            _ => None,
        };
        let output = session.output.insert(self.backend.alloc_output(path, format)?);
        let out_index = self.backend.add_stream_copy(output, input, selected)?;

        if output.needs_io() {
            output.open_io()?;
        }

        let mux_options = match mode {
            Mode::Segment => self.options.segment.mux_options(),
            _ => MuxOptions::new(),
        };
        output.write_header(&mux_options)?;
        session.stage.advance(Stage::OutputConfigured);

        let mut copy = if let Some(window) = window {
            CopyState::Slice {
                window,
                base_pts: None,
            }
        } else if let Mode::Segment = mode {
            CopyState::Segment {
                from: stream.time_base,
                to: output
                    .stream_time_base(out_index)
                    .unwrap_or(stream.time_base),
            }
        } else {
            CopyState::Extract {
                total: progress_total(&*input, &stream),
            }
        };

        // OutputConfigured -> Streaming
        session.stage.advance(Stage::Streaming);
        let mut report = RemuxReport {
            input_stream: selected,
            output_streams: output.stream_count(),
            ..RemuxReport::default()
        };
        let interval = self.options.progress_interval.max(1);
        let mut forwarded: u64 = 0;

        loop {
            let mut packet = match input.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Stopping read loop: {}", e);
                    break;
                }
            };
            report.packets_read += 1;

            if packet.stream_index() != selected {
                report.packets_dropped += 1;
                continue;
            }

            match &mut copy {
                CopyState::Extract { .. } => {}
                CopyState::Slice { window, base_pts } => {
                    let Some(pts) = packet.pts() else {
                        report.packets_dropped += 1;
                        continue;
                    };
                    let base = *base_pts.get_or_insert(pts);
                    let relative = pts - base;
                    if relative >= window.length {
                        tracing::trace!("Window end reached at pts {}", pts);
                        break;
                    }
                    if relative < 0 {
                        report.packets_dropped += 1;
                        continue;
                    }
                }
                CopyState::Segment { from, to } => packet.rescale_ts(*from, *to),
            }

            packet.set_stream_index(out_index);
            let pts = packet.pts();
            forwarded += 1;

            match output.write_packet(&mut packet) {
                Ok(()) => {
                    report.packets_written += 1;
                    if report.first_pts.is_none() {
                        report.first_pts = pts;
                    }
                    report.last_pts = pts.or(report.last_pts);
                    tracing::trace!("Wrote packet pts {:?}", pts);
                }
                Err(e) => {
                    report.write_failures += 1;
                    tracing::warn!("Skipping packet pts {:?}: {}", pts, e);
                }
            }

            if let CopyState::Extract { total } = copy {
                if forwarded % interval == 0 {
                    if let Some(callback) = on_progress.as_deref_mut() {
                        callback(Progress {
                            processed: report.last_pts.unwrap_or(0),
                            total,
                        });
                    }
                }
            }
        }

        // Streaming -> Finalized
        output.write_trailer()?;
        session.stage.advance(Stage::Finalized);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Event, Fault, MemoryBackend, MemoryContainer, MemoryPacket};
    use crate::types::{CodecParameters, StreamInfo};

    fn stream(index: usize, media_type: MediaType, time_base: Rational) -> StreamInfo {
        let codec = match media_type {
            MediaType::Video => CodecParameters::new(media_type, 27, "h264"),
            MediaType::Audio => CodecParameters::new(media_type, 86018, "aac"),
            _ => CodecParameters::new(media_type, 94213, "subrip"),
        };
        StreamInfo::new(index, time_base, codec)
    }

    /// Video at 1/90000 and two audio streams at 1/48000, interleaved.
    fn movie(packets: i64) -> MemoryContainer {
        let mut container = MemoryContainer::new("matroska");
        container.add_stream(stream(0, MediaType::Video, Rational::new(1, 90_000)));
        container.add_stream(stream(1, MediaType::Audio, Rational::new(1, 48_000)));
        container.add_stream(stream(2, MediaType::Audio, Rational::new(1, 48_000)));
        for i in 0..packets {
            container.push_packet(MemoryPacket::new(0, Some(i * 3000), 3000).key(i % 30 == 0));
            container.push_packet(MemoryPacket::new(1, Some(i * 1600), 1600).key(true));
            container.push_packet(MemoryPacket::new(2, Some(i * 1600), 1600).key(true));
        }
        container
    }

    #[test]
    fn test_extract_first_audio() {
        let backend = MemoryBackend::new().with_input("in.mkv", movie(10));
        let remuxer = Remuxer::new(backend.clone());

        let report = remuxer
            .extract("in.mkv", "out.m4a", MediaType::Audio, None)
            .unwrap();

        assert_eq!(report.input_stream, 1);
        assert_eq!(report.output_streams, 1);
        assert_eq!(report.packets_written, 10);
        // Discarded streams never reach the loop.
        assert_eq!(report.packets_read, 10);

        let out = backend.output("out.m4a").unwrap();
        assert_eq!(out.streams.len(), 1);
        assert_eq!(out.streams[0].codec.codec_id, 86018);
        assert_eq!(out.streams[0].time_base, Rational::new(1, 48_000));
        assert!(out.packets.iter().all(|p| p.stream_index == 0));
        assert!(out.trailer_written);
    }

    #[test]
    fn test_extract_reports_progress() {
        let backend = MemoryBackend::new().with_input("in.mkv", movie(250));
        let options = RemuxOptions {
            progress_interval: 100,
            ..RemuxOptions::default()
        };
        let remuxer = Remuxer::with_options(backend, options);

        let mut seen = Vec::new();
        let mut on_progress = |p: Progress| seen.push(p);
        remuxer
            .extract("in.mkv", "out.h264", MediaType::Video, Some(&mut on_progress))
            .unwrap();

        let processed: Vec<i64> = seen.iter().map(|p| p.processed).collect();
        assert_eq!(processed, vec![99 * 3000, 199 * 3000]);
        // No stream or container duration is known.
        assert!(seen.iter().all(|p| p.total == 0));
    }

    #[test]
    fn test_progress_cadence_counts_failed_writes() {
        let backend = MemoryBackend::new()
            .with_input("in.mkv", movie(250))
            .with_fault(Fault::WritePacket(50));
        let options = RemuxOptions {
            progress_interval: 100,
            ..RemuxOptions::default()
        };

        let mut seen = Vec::new();
        let mut on_progress = |p: Progress| seen.push(p.processed);
        let report = Remuxer::with_options(backend, options)
            .extract("in.mkv", "out.h264", MediaType::Video, Some(&mut on_progress))
            .unwrap();

        assert_eq!(report.write_failures, 1);
        assert_eq!(report.packets_written, 249);
        // Still every 100th forwarded packet, not every 100th written one.
        assert_eq!(seen, vec![99 * 3000, 199 * 3000]);
    }

    #[test]
    fn test_progress_reports_last_written_pts_when_write_fails() {
        let backend = MemoryBackend::new()
            .with_input("in.mkv", movie(10))
            .with_fault(Fault::WritePacket(4));
        let options = RemuxOptions {
            progress_interval: 5,
            ..RemuxOptions::default()
        };

        let mut seen = Vec::new();
        let mut on_progress = |p: Progress| seen.push(p.processed);
        Remuxer::with_options(backend, options)
            .extract("in.mkv", "out.h264", MediaType::Video, Some(&mut on_progress))
            .unwrap();

        // The 5th packet failed, so the first report carries the 4th pts.
        assert_eq!(seen, vec![3 * 3000, 9 * 3000]);
    }

    #[test]
    fn test_progress_total_from_container_duration() {
        let mut container = movie(100);
        container.duration = Some(4_000_000);
        let backend = MemoryBackend::new().with_input("in.mkv", container);

        let mut totals = Vec::new();
        let mut on_progress = |p: Progress| totals.push(p.total);
        Remuxer::new(backend)
            .extract("in.mkv", "out.aac", MediaType::Audio, Some(&mut on_progress))
            .unwrap();

        assert_eq!(totals, vec![192_000]);
    }

    #[test]
    fn test_slice_window_is_relative_to_first_packet() {
        let tb = Rational::new(1, 48_000);
        let mut container = MemoryContainer::new("mov,mp4");
        container.add_stream(stream(0, MediaType::Audio, tb));
        // 30 seconds of audio starting at 10s, one packet per 0.5s.
        for i in 0..60 {
            container.push_packet(MemoryPacket::new(0, Some(480_000 + i * 24_000), 24_000).key(true));
        }
        let backend = MemoryBackend::new().with_input("in.mp4", container);

        let report = Remuxer::new(backend.clone())
            .slice("in.mp4", "out.m4a", MediaType::Audio, TimeWindow::new(5.0, 10.0))
            .unwrap();

        let out = backend.output("out.m4a").unwrap();
        let relative: Vec<i64> = out
            .packets
            .iter()
            .map(|p| p.pts.unwrap() - 480_000)
            .collect();
        assert_eq!(relative.first(), Some(&0));
        assert!(relative.iter().all(|r| (0..480_000).contains(r)));
        assert_eq!(report.packets_written, 20);
    }

    #[test]
    fn test_slice_seeks_to_window_start() {
        let tb = Rational::new(1, 1000);
        let mut container = MemoryContainer::new("matroska");
        container.add_stream(stream(0, MediaType::Video, tb));
        for i in 0..100 {
            container.push_packet(MemoryPacket::new(0, Some(i * 100), 100).key(i % 10 == 0));
        }
        let backend = MemoryBackend::new().with_input("in.mkv", container);

        Remuxer::new(backend.clone())
            .slice("in.mkv", "out.mkv", MediaType::Video, TimeWindow::new(2.5, 1.0))
            .unwrap();

        let out = backend.output("out.mkv").unwrap();
        let pts: Vec<i64> = out.packets.iter().filter_map(|p| p.pts).collect();
        // Keyframe at 2.0s is the seek target; the window runs for 1s from it.
        assert_eq!(pts.first(), Some(&2000));
        assert_eq!(pts.last(), Some(&2900));
        assert_eq!(pts.len(), 10);
    }

    #[test]
    fn test_slice_seek_and_window_share_truncated_ticks() {
        // NTSC frame time-base: 1.0s is 29.97 ticks, truncated to 29.
        let tb = Rational::new(1001, 30_000);
        let mut container = MemoryContainer::new("matroska");
        container.add_stream(stream(0, MediaType::Video, tb));
        for i in 0..100 {
            container.push_packet(MemoryPacket::new(0, Some(i), 1).key(i % 10 == 0));
        }
        let backend = MemoryBackend::new().with_input("in.mkv", container);

        let report = Remuxer::new(backend.clone())
            .slice("in.mkv", "out.mkv", MediaType::Video, TimeWindow::new(1.0, 1.0))
            .unwrap();

        assert_eq!(TimeWindow::new(1.0, 1.0).to_ticks(tb).start, 29);
        // Seeking to tick 29 lands on the keyframe at 20, not the one at 30.
        assert_eq!(report.first_pts, Some(20));
        assert_eq!(report.last_pts, Some(48));
        assert_eq!(report.packets_written, 29);
    }

    #[test]
    fn test_slice_rejects_bad_window() {
        let backend = MemoryBackend::new().with_input("in.mkv", movie(5));
        let err = Remuxer::new(backend.clone())
            .slice("in.mkv", "out.mkv", MediaType::Video, TimeWindow::new(1.0, 0.0))
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_slice_drops_packets_without_pts() {
        let tb = Rational::new(1, 1000);
        let mut container = MemoryContainer::new("mpegts");
        container.add_stream(stream(0, MediaType::Audio, tb));
        for i in 0..10 {
            container.push_packet(MemoryPacket::new(0, Some(i * 20), 20).key(true));
            if i == 4 {
                container.push_packet(MemoryPacket::new(0, None, 20));
            }
        }
        let backend = MemoryBackend::new().with_input("in.ts", container);

        let report = Remuxer::new(backend)
            .slice("in.ts", "out.ts", MediaType::Audio, TimeWindow::new(0.0, 1.0))
            .unwrap();

        assert_eq!(report.packets_written, 10);
        assert_eq!(report.packets_dropped, 1);
        assert_eq!(report.first_pts, Some(0));
    }

    #[test]
    fn test_segment_rescales_into_muxer_time_base() {
        let mut container = MemoryContainer::new("matroska");
        container.add_stream(stream(0, MediaType::Audio, Rational::new(1, 48_000)));
        container.add_stream(stream(1, MediaType::Video, Rational::new(1, 1000)));
        for i in 0..60 {
            container.push_packet(MemoryPacket::new(0, Some(i * 1920), 1920).key(true));
            container.push_packet(MemoryPacket::new(1, Some(i * 40), 40).key(i % 25 == 0));
        }
        let backend = MemoryBackend::new().with_input("in.mkv", container);

        let report = Remuxer::new(backend.clone())
            .segment("in.mkv", "out/playlist.m3u8")
            .unwrap();

        assert_eq!(report.input_stream, 1);
        assert_eq!(report.packets_written, 60);
        assert_eq!(report.last_pts, Some(59 * 3600));

        let out = backend.output("out/playlist.m3u8").unwrap();
        assert_eq!(out.format, "hls");
        assert_eq!(out.streams[0].time_base, Rational::new(1, 90_000));
        assert_eq!(out.packets[1].pts, Some(3600));
        assert_eq!(out.packets[1].duration, 3600);
        assert_eq!(out.options.get("hls_segment_type"), Some("fmp4"));
        assert_eq!(out.options.get("hls_playlist_type"), Some("vod"));
        assert_eq!(out.options.get("hls_fmp4_init_filename"), Some("init.mp4"));
        assert_eq!(out.options.get("hls_time"), None);

        // HLS writes its own files, so no I/O sink is opened.
        assert!(!backend
            .events()
            .iter()
            .any(|e| matches!(e, Event::IoOpened(_))));
    }

    #[test]
    fn test_segment_write_failures_are_skipped() {
        let backend = MemoryBackend::new()
            .with_input("in.mkv", movie(20))
            .with_fault(Fault::WritePacket(3))
            .with_fault(Fault::WritePacket(7));

        let report = Remuxer::new(backend.clone())
            .segment("in.mkv", "hls/index.m3u8")
            .unwrap();

        assert_eq!(report.write_failures, 2);
        assert_eq!(report.packets_written, 18);
        assert!(backend.output("hls/index.m3u8").unwrap().trailer_written);
    }

    #[test]
    fn test_segment_options_are_forwarded() {
        let backend = MemoryBackend::new().with_input("in.mkv", movie(5));
        let options = RemuxOptions {
            segment: SegmentOptions {
                segment_type: SegmentType::MpegTs,
                playlist_type: PlaylistType::Event,
                init_filename: None,
                segment_duration: Some(4.0),
            },
            ..RemuxOptions::default()
        };

        Remuxer::with_options(backend.clone(), options)
            .segment("in.mkv", "live.m3u8")
            .unwrap();

        let out = backend.output("live.m3u8").unwrap();
        assert_eq!(out.options.get("hls_segment_type"), Some("mpegts"));
        assert_eq!(out.options.get("hls_playlist_type"), Some("event"));
        assert_eq!(out.options.get("hls_fmp4_init_filename"), None);
        assert_eq!(out.options.get("hls_time"), Some("4"));
    }

    #[test]
    fn test_segment_passes_over_cover_art() {
        let mut container = MemoryContainer::new("mov,mp4");
        let mut cover = StreamInfo::new(
            0,
            Rational::new(1, 90_000),
            CodecParameters::new(MediaType::Video, 7, "mjpeg"),
        );
        cover.attached_picture = true;
        container.add_stream(cover);
        container.add_stream(stream(1, MediaType::Video, Rational::new(1, 1000)));
        container.push_packet(MemoryPacket::new(0, Some(0), 0).key(true));
        for i in 0..20 {
            container.push_packet(MemoryPacket::new(1, Some(i * 40), 40).key(i % 10 == 0));
        }
        let backend = MemoryBackend::new().with_input("album.m4v", container);

        let report = Remuxer::new(backend.clone())
            .segment("album.m4v", "hls/index.m3u8")
            .unwrap();

        assert_eq!(report.input_stream, 1);
        assert_eq!(report.packets_written, 20);
        let out = backend.output("hls/index.m3u8").unwrap();
        assert_eq!(out.streams[0].codec.codec_name, "h264");
    }

    #[test]
    fn test_extract_still_takes_first_stream() {
        let mut container = movie(5);
        container.streams[2].codec.bit_rate = 320_000;
        let backend = MemoryBackend::new().with_input("in.mkv", container);

        let report = Remuxer::new(backend)
            .extract("in.mkv", "out.m4a", MediaType::Audio, None)
            .unwrap();

        assert_eq!(report.input_stream, 1);
    }

    #[test]
    fn test_segment_without_video_fails() {
        let mut container = MemoryContainer::new("adts");
        container.add_stream(stream(0, MediaType::Audio, Rational::new(1, 48_000)));
        let backend = MemoryBackend::new().with_input("in.aac", container);

        let err = Remuxer::new(backend.clone())
            .segment("in.aac", "out.m3u8")
            .unwrap_err();

        assert!(matches!(
            err,
            Error::StreamNotFound {
                media_type: MediaType::Video
            }
        ));
        assert_eq!(
            backend.events(),
            vec![
                Event::InputOpened("in.aac".into()),
                Event::InputClosed("in.aac".into()),
            ]
        );
    }

    #[test]
    fn test_trailer_failure_is_returned_after_cleanup() {
        let backend = MemoryBackend::new()
            .with_input("in.mkv", movie(5))
            .with_fault(Fault::WriteTrailer);

        let err = Remuxer::new(backend.clone())
            .extract("in.mkv", "out.mkv", MediaType::Video, None)
            .unwrap_err();

        assert!(matches!(err, Error::TrailerWrite { .. }));
        let events = backend.events();
        assert_eq!(events.last(), Some(&Event::InputClosed("in.mkv".into())));
        assert!(events.contains(&Event::IoClosed("out.mkv".into())));
        assert_eq!(backend.live_packets(), 0);
    }

    #[test]
    fn test_read_error_ends_stream() {
        let backend = MemoryBackend::new()
            .with_input("in.mkv", movie(10))
            .with_fault(Fault::Read(4));

        let report = Remuxer::new(backend)
            .extract("in.mkv", "out.mkv", MediaType::Video, None)
            .unwrap();

        assert_eq!(report.packets_read, 4);
        assert_eq!(report.packets_written, 4);
    }
}
