//! FFmpeg backend.
//!
//! Built on the safe context, stream and packet types of ffmpeg-the-third,
//! which free their FFmpeg objects on drop. The few calls the bindings do
//! not wrap go through `ffi` at the call site, each with a note on what is
//! missing. Conversion between FFmpeg structs and the crate's own types
//! happens here and nowhere else.

mod input;
mod output;
mod packet;

pub use input::NativeInput;
pub use output::NativeOutput;
pub use packet::NativePacket;

use ffmpeg_the_third as ffmpeg;
use std::sync::Once;

use crate::container::Backend;
use crate::types::{MediaType, Rational};
use crate::Result;

/// `AV_NOPTS_VALUE`.
pub(crate) const NOPTS_VALUE: i64 = i64::MIN;

static FFMPEG_INIT: Once = Once::new();

fn init_ffmpeg() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            tracing::error!("Failed to initialize FFmpeg: {}", e);
        }
    });
}

/// Backend over the FFmpeg libraries linked into the process.
#[derive(Debug, Clone, Copy)]
pub struct NativeBackend {
    _private: (),
}

impl NativeBackend {
    pub fn new() -> Self {
        init_ffmpeg();
        Self { _private: () }
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for NativeBackend {
    type Packet = NativePacket;
    type Input = NativeInput;
    type Output = NativeOutput;

    fn open_input(&self, url: &str) -> Result<NativeInput> {
        NativeInput::open(url)
    }

    fn alloc_output(&self, path: &str, format: Option<&str>) -> Result<NativeOutput> {
        NativeOutput::alloc(path, format)
    }

    fn add_stream_copy(
        &self,
        output: &mut NativeOutput,
        input: &NativeInput,
        index: usize,
    ) -> Result<usize> {
        output.add_stream_copy(input, index)
    }
}

/// Version of the linked libavformat as `(major, minor, micro)`.
pub fn libavformat_version() -> (u32, u32, u32) {
    let version = ffmpeg::format::version();
    (version >> 16, (version >> 8) & 0xff, version & 0xff)
}

pub(crate) fn to_ff(r: Rational) -> ffmpeg::Rational {
    ffmpeg::Rational::new(r.num, r.den)
}

pub(crate) fn from_ff(r: ffmpeg::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

pub(crate) fn optional_ts(ts: i64) -> Option<i64> {
    (ts != NOPTS_VALUE).then_some(ts)
}

pub(crate) fn to_media_kind(media_type: MediaType) -> ffmpeg::media::Type {
    match media_type {
        MediaType::Video => ffmpeg::media::Type::Video,
        MediaType::Audio => ffmpeg::media::Type::Audio,
        MediaType::Subtitle => ffmpeg::media::Type::Subtitle,
        MediaType::Data => ffmpeg::media::Type::Data,
        MediaType::Attachment => ffmpeg::media::Type::Attachment,
        MediaType::Unknown => ffmpeg::media::Type::Unknown,
    }
}

pub(crate) fn from_media_kind(kind: ffmpeg::media::Type) -> MediaType {
    match kind {
        ffmpeg::media::Type::Video => MediaType::Video,
        ffmpeg::media::Type::Audio => MediaType::Audio,
        ffmpeg::media::Type::Subtitle => MediaType::Subtitle,
        ffmpeg::media::Type::Data => MediaType::Data,
        ffmpeg::media::Type::Attachment => MediaType::Attachment,
        _ => MediaType::Unknown,
    }
}
