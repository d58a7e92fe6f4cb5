//! Play duration estimation.
//!
//! Container metadata is the cheapest signal but is often missing for
//! streamed or fragmented inputs, so the estimate falls back to per-stream
//! durations and, as a last resort, to reading the tail of every video
//! stream.

use crate::container::{Input, Packet, SeekMode};
use crate::types::{MediaType, Rational, StreamInfo, TIME_BASE, TIME_BASE_Q};

/// Estimate the play duration of `input` in seconds.
///
/// Never negative; `0.0` when nothing is known. The last tier seeks the input
/// and reads packets, so the read position is not preserved.
pub fn estimate_duration<I: Input>(input: &mut I) -> f64 {
    if let Some(seconds) = container_duration(input) {
        tracing::trace!("Duration from container: {:.3}s", seconds);
        return seconds;
    }

    if let Some(seconds) = video_stream_duration(input.streams()) {
        tracing::trace!("Duration from video streams: {:.3}s", seconds);
        return seconds;
    }

    let seconds = scan_video_duration(input);
    tracing::trace!("Duration from packet scan: {:.3}s", seconds);
    seconds
}

/// Container-reported duration in seconds, if known and positive.
pub fn container_duration<I: Input>(input: &I) -> Option<f64> {
    input
        .duration()
        .filter(|d| *d > 0)
        .map(|d| d as f64 / TIME_BASE as f64)
}

/// Longest known duration among video streams, in seconds.
pub fn video_stream_duration(streams: &[StreamInfo]) -> Option<f64> {
    streams
        .iter()
        .filter(|s| s.media_type() == MediaType::Video)
        .filter_map(|s| {
            s.known_duration()
                .map(|d| s.time_base.ticks_to_seconds(d))
        })
        .filter(|seconds| *seconds > 0.0)
        .fold(None, |max: Option<f64>, seconds| {
            Some(max.map_or(seconds, |m| m.max(seconds)))
        })
}

/// Read the tail of every video stream and return the latest packet end
/// time in seconds. Streams that cannot be seeked are skipped.
pub fn scan_video_duration<I: Input>(input: &mut I) -> f64 {
    let video: Vec<(usize, Rational)> = input
        .streams()
        .iter()
        .filter(|s| s.media_type() == MediaType::Video)
        .map(|s| (s.index, s.time_base))
        .collect();

    let mut latest = 0.0_f64;
    for (index, time_base) in video {
        if let Err(e) = input.seek(index, i64::MAX, SeekMode::Backward) {
            tracing::debug!("Skipping stream {} in duration scan: {}", index, e);
            continue;
        }

        loop {
            let packet = match input.read_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Duration scan of stream {} stopped: {}", index, e);
                    break;
                }
            };

            if packet.stream_index() != index {
                continue;
            }
            if let Some(pts) = packet.pts() {
                let start = time_base.ticks_to_seconds(pts);
                let length = time_base.ticks_to_seconds(packet.duration()).max(0.0);
                latest = latest.max(start + length);
            }
        }
    }

    latest
}

/// Expected total for progress reports on `stream`, in its own time-base.
///
/// The stream's own duration when known, otherwise the container duration
/// rescaled into the stream's time-base, otherwise 0.
pub fn progress_total<I: Input>(input: &I, stream: &StreamInfo) -> i64 {
    if let Some(duration) = stream.known_duration() {
        return duration;
    }
    input
        .duration()
        .filter(|d| *d > 0)
        .map(|d| Rational::rescale(d, TIME_BASE_Q, stream.time_base))
        .unwrap_or(0)
}
