//! Container introspection.
//!
//! Read-only views over an opened input: brand and timecode tags, per-stream
//! frame rate and aspect ratio, and a serializable summary that ties them
//! together with the duration estimate and rotation.

use serde::{Deserialize, Serialize};

use crate::container::{Backend, Input};
use crate::duration::estimate_duration;
use crate::rotation::stream_rotation;
use crate::types::{tag, MediaType, Rational, StreamInfo};
use crate::Result;

/// Summary of an input container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSummary {
    /// URL the container was opened from.
    pub url: String,
    /// Short name of the detected format.
    pub format: String,
    /// Estimated play duration in seconds.
    pub duration_seconds: f64,
    /// `major_brand` tag, if present.
    pub major_brand: Option<String>,
    /// Container or stream timecode, if present.
    pub timecode: Option<String>,
    pub streams: Vec<StreamSummary>,
}

/// Summary of one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummary {
    pub index: usize,
    pub media_type: MediaType,
    pub codec: String,
    pub time_base: Rational,
    /// Duration in seconds, if the stream reports one.
    pub duration_seconds: Option<f64>,
    /// Frames per second, 0.0 when unknown.
    pub frame_rate: f64,
    pub sample_aspect_ratio: Rational,
    /// Display rotation in degrees.
    pub rotation: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// The container's `major_brand` tag.
pub fn major_brand<I: Input>(input: &I) -> Option<String> {
    tag(input.metadata(), "major_brand").map(str::to_string)
}

/// Timecode from the container tags, else from the first stream carrying
/// one.
pub fn timecode<I: Input>(input: &I) -> Option<String> {
    if let Some(tc) = tag(input.metadata(), "timecode") {
        return Some(tc.to_string());
    }
    input
        .streams()
        .iter()
        .find_map(|s| tag(&s.metadata, "timecode"))
        .map(str::to_string)
}

/// Frame rate of a stream: the average rate, or the real base rate when the
/// average is unset. 0.0 when neither is known.
pub fn frame_rate(stream: &StreamInfo) -> f64 {
    let rate = if stream.avg_frame_rate.num != 0 {
        stream.avg_frame_rate
    } else {
        stream.real_frame_rate
    };
    rate.to_f64()
}

/// Sample aspect ratio of a stream. 0/1 means unknown.
pub fn sample_aspect_ratio(stream: &StreamInfo) -> Rational {
    stream.sample_aspect_ratio
}

/// Build a summary of an opened and probed input.
///
/// May read packets to estimate the duration.
pub fn summarize<I: Input>(input: &mut I) -> MediaSummary {
    let duration_seconds = estimate_duration(input);

    let streams = input.streams().iter().map(summarize_stream).collect();

    MediaSummary {
        url: input.url().to_string(),
        format: input.format_name().to_string(),
        duration_seconds,
        major_brand: major_brand(input),
        timecode: timecode(input),
        streams,
    }
}

fn summarize_stream(stream: &StreamInfo) -> StreamSummary {
    let codec = &stream.codec;
    let (width, height) = match stream.media_type() {
        MediaType::Video => (Some(codec.width), Some(codec.height)),
        _ => (None, None),
    };
    let (sample_rate, channels) = match stream.media_type() {
        MediaType::Audio => (
            Some(codec.sample_rate),
            Some(codec.channel_layout.channels),
        ),
        _ => (None, None),
    };

    StreamSummary {
        index: stream.index,
        media_type: stream.media_type(),
        codec: codec.codec_name.clone(),
        time_base: stream.time_base,
        duration_seconds: stream
            .known_duration()
            .map(|d| stream.time_base.ticks_to_seconds(d)),
        frame_rate: frame_rate(stream),
        sample_aspect_ratio: sample_aspect_ratio(stream),
        rotation: stream_rotation(stream),
        width,
        height,
        sample_rate,
        channels,
        language: tag(&stream.metadata, "language").map(str::to_string),
    }
}

/// Open `url`, probe it and summarize it.
pub fn probe<B: Backend>(backend: &B, url: &str) -> Result<MediaSummary> {
    let mut input = backend.open_input(url)?;
    input.find_stream_info()?;
    Ok(summarize(&mut input))
}
