//! # streamcopy-av
//!
//! Lossless stream-copy remuxing of media containers.
//!
//! This crate provides functionality for:
//! - Extracting a single elementary stream into its own container
//! - Slicing a stream to a time window without re-encoding
//! - Repackaging a video stream as HLS segments with a playlist
//! - Estimating play duration and display rotation
//!
//! Every pipeline is generic over a [`Backend`]; the FFmpeg backend is the
//! default and an in-memory backend is available for tests and benchmarks.
//!
//! ## Features
//!
//! - `native-ffmpeg` (default) - FFmpeg backend over ffmpeg-the-third
//! - `memory` - In-memory backend with fault injection
//!
//! ## Example
//!
//! ```no_run
//! use streamcopy_av::{extract_single_stream, MediaType};
//!
//! let report = extract_single_stream("movie.mkv", "audio.m4a", MediaType::Audio, None)?;
//! println!("Copied {} packets", report.packets_written);
//! # Ok::<(), streamcopy_av::Error>(())
//! ```

pub mod container;
pub mod duration;
mod error;
pub mod introspect;
pub mod pipeline;
pub mod rotation;
pub mod select;
pub mod types;

#[cfg(feature = "native-ffmpeg")]
pub mod native;

#[cfg(any(test, feature = "memory"))]
pub mod memory;

// Re-exports
pub use container::{Backend, Input, MuxOptions, Output, Packet, SeekMode};
pub use duration::estimate_duration;
pub use error::{
    averror, describe, fferrtag, result_code, Error, Result, AVERROR_EOF, AVERROR_INVALIDDATA,
    AVERROR_MUXER_NOT_FOUND, AVERROR_STREAM_NOT_FOUND, AVERROR_UNKNOWN,
};
pub use introspect::{MediaSummary, StreamSummary};
pub use pipeline::{
    PlaylistType, RemuxOptions, RemuxReport, Remuxer, SegmentOptions, SegmentType, Stage,
};
pub use rotation::rotation;
pub use select::{find_stream, select_best_stream, select_stream, DiscardPolicy};
pub use types::{MediaType, Progress, Rational, StreamInfo, TimeWindow};

#[cfg(feature = "native-ffmpeg")]
pub use native::{libavformat_version, NativeBackend};

/// Copy the first stream of `media_type` from `input` into a new container
/// at `output`, using FFmpeg.
///
/// # Example
///
/// ```no_run
/// use streamcopy_av::{extract_single_stream, MediaType, Progress};
///
/// let mut on_progress = |p: Progress| {
///     if let Some(fraction) = p.fraction() {
///         println!("{:.0}%", fraction * 100.0);
///     }
/// };
/// extract_single_stream("movie.mkv", "audio.m4a", MediaType::Audio, Some(&mut on_progress))?;
/// # Ok::<(), streamcopy_av::Error>(())
/// ```
#[cfg(feature = "native-ffmpeg")]
pub fn extract_single_stream(
    input: &str,
    output: &str,
    media_type: MediaType,
    on_progress: Option<&mut dyn FnMut(Progress)>,
) -> Result<RemuxReport> {
    Remuxer::new(NativeBackend::new()).extract(input, output, media_type, on_progress)
}

/// Copy `duration_seconds` of the first stream of `media_type`, starting at
/// `start_seconds`, using FFmpeg.
#[cfg(feature = "native-ffmpeg")]
pub fn slice_single_stream(
    input: &str,
    output: &str,
    media_type: MediaType,
    start_seconds: f64,
    duration_seconds: f64,
) -> Result<RemuxReport> {
    Remuxer::new(NativeBackend::new()).slice(
        input,
        output,
        media_type,
        TimeWindow::new(start_seconds, duration_seconds),
    )
}

/// Repackage the first video stream of `input` as fMP4 HLS segments with a
/// VOD playlist at `playlist`, using FFmpeg.
#[cfg(feature = "native-ffmpeg")]
pub fn convert_to_segmented_output(input: &str, playlist: &str) -> Result<RemuxReport> {
    Remuxer::new(NativeBackend::new()).segment(input, playlist)
}

/// Open `url` with FFmpeg and summarize its streams.
#[cfg(feature = "native-ffmpeg")]
pub fn probe(url: &str) -> Result<MediaSummary> {
    introspect::probe(&NativeBackend::new(), url)
}
