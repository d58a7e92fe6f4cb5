//! Container, stream and timing types shared by every backend.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ticks per second of container-level timestamps and durations.
pub const TIME_BASE: i64 = 1_000_000;

/// [`TIME_BASE`] expressed as a rational time-base.
pub const TIME_BASE_Q: Rational = Rational::new(1, TIME_BASE as i32);

/// Free-form key/value tags attached to a container or a stream.
pub type Metadata = BTreeMap<String, String>;

/// Look up a tag ignoring ASCII case, the way FFmpeg matches dictionary
/// keys. An exact match wins over a case-folded one.
pub fn tag<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .or_else(|| {
            metadata
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

/// A rational number, used for time-bases and frame rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Value as a float, `0.0` when the denominator is zero.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }

    /// Convert a tick count in this time-base to seconds.
    pub fn ticks_to_seconds(self, ticks: i64) -> f64 {
        ticks as f64 * self.to_f64()
    }

    /// Convert seconds to a tick count in this time-base.
    ///
    /// Computed in floating point as `seconds * den / num` and truncated
    /// toward zero. Returns 0 for a degenerate time-base.
    pub fn seconds_to_ticks(self, seconds: f64) -> i64 {
        if self.num == 0 {
            return 0;
        }
        (seconds * self.den as f64 / self.num as f64) as i64
    }

    /// Rescale `ts` from `from` to `to`, rounding to nearest with halves away
    /// from zero.
    pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
        if from == to {
            return ts;
        }

        let mut b = from.num as i128 * to.den as i128;
        let mut c = from.den as i128 * to.num as i128;
        if c == 0 {
            return ts;
        }
        if c < 0 {
            b = -b;
            c = -c;
        }

        let r = ts as i128 * b;
        let half = c / 2;
        let scaled = if r >= 0 {
            (r + half) / c
        } else {
            -((-r + half) / c)
        };

        scaled.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Media type of an elementary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Subtitle => "subtitle",
            MediaType::Data => "data",
            MediaType::Attachment => "attachment",
            MediaType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" | "v" => Ok(MediaType::Video),
            "audio" | "a" => Ok(MediaType::Audio),
            "subtitle" | "subtitles" | "s" => Ok(MediaType::Subtitle),
            "data" | "d" => Ok(MediaType::Data),
            "attachment" | "t" => Ok(MediaType::Attachment),
            _ => Err(format!("Unknown media type: {}", s)),
        }
    }
}

/// Per-stream demuxer policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discard {
    /// Deliver packets normally.
    #[default]
    Keep,
    /// Skip every packet of the stream.
    All,
}

/// Channel layout as a channel count plus a native layout bit mask.
///
/// A mask of 0 means the order is unspecified or not a native layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub channels: u32,
    pub mask: u64,
}

const CH_FRONT_LEFT: u64 = 0x1;
const CH_FRONT_RIGHT: u64 = 0x2;
const CH_FRONT_CENTER: u64 = 0x4;
const CH_LOW_FREQUENCY: u64 = 0x8;
const CH_BACK_LEFT: u64 = 0x10;
const CH_BACK_RIGHT: u64 = 0x20;
const CH_BACK_CENTER: u64 = 0x100;
const CH_SIDE_LEFT: u64 = 0x200;
const CH_SIDE_RIGHT: u64 = 0x400;

impl ChannelLayout {
    pub const fn new(channels: u32, mask: u64) -> Self {
        Self { channels, mask }
    }

    /// The layout FFmpeg picks by default for a channel count.
    pub fn default_for(channels: u32) -> Self {
        Self {
            channels,
            mask: default_layout_mask(channels),
        }
    }

    /// Whether the layout carries an explicit native mask.
    pub fn is_native(&self) -> bool {
        self.mask != 0 && self.mask.count_ones() == self.channels
    }
}

/// Native layout mask FFmpeg uses by default for `channels` channels, or 0
/// when there is none.
pub fn default_layout_mask(channels: u32) -> u64 {
    let stereo = CH_FRONT_LEFT | CH_FRONT_RIGHT;
    let surround = stereo | CH_FRONT_CENTER;
    let five_one = surround | CH_LOW_FREQUENCY | CH_SIDE_LEFT | CH_SIDE_RIGHT;

    match channels {
        1 => CH_FRONT_CENTER,
        2 => stereo,
        3 => stereo | CH_LOW_FREQUENCY,
        4 => surround | CH_BACK_CENTER,
        5 => surround | CH_BACK_LEFT | CH_BACK_RIGHT,
        6 => surround | CH_LOW_FREQUENCY | CH_BACK_LEFT | CH_BACK_RIGHT,
        7 => five_one | CH_BACK_CENTER,
        8 => five_one | CH_BACK_LEFT | CH_BACK_RIGHT,
        _ => 0,
    }
}

/// Codec parameters of a stream.
///
/// This is the single internal representation; backends convert to and from
/// their native layout at the container boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecParameters {
    pub media_type: MediaType,
    /// Backend codec identifier.
    pub codec_id: u32,
    pub codec_name: String,
    /// Container-specific codec tag (fourcc), 0 when unset.
    pub codec_tag: u32,
    /// Pixel format for video, sample format for audio, -1 when unknown.
    pub format: i32,
    pub bit_rate: i64,
    pub width: u32,
    pub height: u32,
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
    pub profile: i32,
    pub level: i32,
    pub extradata: Vec<u8>,
}

impl CodecParameters {
    pub fn new(media_type: MediaType, codec_id: u32, codec_name: impl Into<String>) -> Self {
        Self {
            media_type,
            codec_id,
            codec_name: codec_name.into(),
            codec_tag: 0,
            format: -1,
            bit_rate: 0,
            width: 0,
            height: 0,
            sample_rate: 0,
            channel_layout: ChannelLayout::default(),
            profile: -99,
            level: -99,
            extradata: Vec::new(),
        }
    }

    /// Parameters for an output stream copied from this one.
    ///
    /// Everything is kept except the codec tag, which the output format
    /// assigns itself.
    pub fn for_remux(&self) -> Self {
        Self {
            codec_tag: 0,
            ..self.clone()
        }
    }
}

/// Kind of a side-channel data entry attached to a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideDataKind {
    /// 3x3 display transformation matrix of 32-bit values.
    DisplayMatrix,
    /// Any other side data, by backend type id.
    Other(u32),
}

/// A side-channel data entry attached to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideData {
    pub kind: SideDataKind,
    pub data: Vec<u8>,
}

/// Descriptor of one elementary stream inside a container.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Position in the owning container; stable for its lifetime.
    pub index: usize,
    pub time_base: Rational,
    /// Duration in `time_base` units, `None` when unknown.
    pub duration: Option<i64>,
    /// First timestamp in `time_base` units, `None` when unknown.
    pub start_time: Option<i64>,
    pub discard: Discard,
    /// Cover art or another still image carried as a one-packet stream.
    pub attached_picture: bool,
    pub codec: CodecParameters,
    pub metadata: Metadata,
    pub side_data: Vec<SideData>,
    pub avg_frame_rate: Rational,
    pub real_frame_rate: Rational,
    pub sample_aspect_ratio: Rational,
}

impl StreamInfo {
    pub fn new(index: usize, time_base: Rational, codec: CodecParameters) -> Self {
        Self {
            index,
            time_base,
            duration: None,
            start_time: None,
            discard: Discard::Keep,
            attached_picture: false,
            codec,
            metadata: Metadata::new(),
            side_data: Vec::new(),
            avg_frame_rate: Rational::new(0, 1),
            real_frame_rate: Rational::new(0, 1),
            sample_aspect_ratio: Rational::new(0, 1),
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.codec.media_type
    }

    /// Known, positive duration in the stream's own time-base.
    pub fn known_duration(&self) -> Option<i64> {
        self.duration.filter(|d| *d > 0)
    }
}

/// A requested time range, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

impl TimeWindow {
    pub fn new(start_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            start_seconds,
            duration_seconds,
        }
    }

    /// A window is usable when the start is finite and non-negative and the
    /// duration is finite and positive.
    pub fn is_valid(&self) -> bool {
        self.start_seconds.is_finite()
            && self.start_seconds >= 0.0
            && self.duration_seconds.is_finite()
            && self.duration_seconds > 0.0
    }

    /// Convert once into `time_base` ticks.
    pub fn to_ticks(&self, time_base: Rational) -> TickWindow {
        TickWindow {
            start: time_base.seconds_to_ticks(self.start_seconds),
            length: time_base.seconds_to_ticks(self.duration_seconds),
        }
    }
}

/// A [`TimeWindow`] expressed in a stream's native ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindow {
    pub start: i64,
    pub length: i64,
}

/// Progress of a running extraction, in the stream's time-base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Timestamp of the last forwarded packet.
    pub processed: i64,
    /// Expected total, 0 when unknown.
    pub total: i64,
}

impl Progress {
    /// Completed fraction in `[0, 1]`, `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        if self.total <= 0 {
            return None;
        }
        Some((self.processed as f64 / self.total as f64).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rescale_rounds_to_nearest() {
        let ms = Rational::new(1, 1000);
        let ts90k = Rational::new(1, 90_000);
        assert_eq!(Rational::rescale(1000, ms, ts90k), 90_000);
        assert_eq!(Rational::rescale(1, ts90k, ms), 0);
        assert_eq!(Rational::rescale(45, ts90k, ms), 1);
        assert_eq!(Rational::rescale(-45, ts90k, ms), -1);
        assert_eq!(Rational::rescale(7, ms, ms), 7);
    }

    #[test]
    fn test_rescale_container_duration_into_stream() {
        let audio = Rational::new(1, 48_000);
        assert_eq!(Rational::rescale(2_500_000, TIME_BASE_Q, audio), 120_000);
    }

    #[test]
    fn test_seconds_to_ticks_truncates() {
        let tb = Rational::new(1, 48_000);
        assert_eq!(tb.seconds_to_ticks(10.0), 480_000);
        assert_eq!(tb.seconds_to_ticks(0.000_01), 0);
        assert_eq!(Rational::new(1001, 30_000).seconds_to_ticks(1.0), 29);
        assert_eq!(Rational::new(0, 1).seconds_to_ticks(3.0), 0);
    }

    #[test]
    fn test_tag_lookup_ignores_case() {
        let mut metadata = Metadata::new();
        metadata.insert("MAJOR_BRAND".into(), "qt  ".into());
        metadata.insert("Rotate".into(), "90".into());
        assert_eq!(tag(&metadata, "major_brand"), Some("qt  "));
        assert_eq!(tag(&metadata, "rotate"), Some("90"));
        assert_eq!(tag(&metadata, "timecode"), None);

        metadata.insert("rotate".into(), "180".into());
        assert_eq!(tag(&metadata, "rotate"), Some("180"));
    }

    #[test]
    fn test_media_type_from_str() {
        assert_eq!("audio".parse::<MediaType>().ok(), Some(MediaType::Audio));
        assert_eq!("VIDEO".parse::<MediaType>().ok(), Some(MediaType::Video));
        assert_eq!("s".parse::<MediaType>().ok(), Some(MediaType::Subtitle));
        assert!("nope".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_default_layout_masks() {
        assert_eq!(default_layout_mask(1), 0x4);
        assert_eq!(default_layout_mask(2), 0x3);
        assert_eq!(default_layout_mask(6), 0x3F);
        assert_eq!(default_layout_mask(8), 0x63F);
        assert_eq!(default_layout_mask(0), 0);
        for channels in 1..=8 {
            assert!(ChannelLayout::default_for(channels).is_native());
        }
    }

    #[test]
    fn test_for_remux_clears_codec_tag_only() {
        let mut params = CodecParameters::new(MediaType::Audio, 86018, "aac");
        params.codec_tag = 0x6134_706d;
        params.sample_rate = 48_000;
        params.extradata = vec![0x11, 0x90];

        let copy = params.for_remux();
        assert_eq!(copy.codec_tag, 0);
        assert_eq!(copy.sample_rate, 48_000);
        assert_eq!(copy.extradata, params.extradata);
        assert_eq!(copy.codec_id, params.codec_id);
    }

    #[test]
    fn test_time_window_validation() {
        assert!(TimeWindow::new(5.0, 10.0).is_valid());
        assert!(TimeWindow::new(0.0, 0.5).is_valid());
        assert!(!TimeWindow::new(5.0, 0.0).is_valid());
        assert!(!TimeWindow::new(-1.0, 1.0).is_valid());
        assert!(!TimeWindow::new(f64::NAN, 1.0).is_valid());
        assert!(!TimeWindow::new(0.0, f64::INFINITY).is_valid());
    }

    #[test]
    fn test_progress_fraction() {
        let p = Progress {
            processed: 50,
            total: 200,
        };
        assert_eq!(p.fraction(), Some(0.25));
        let unknown = Progress {
            processed: 50,
            total: 0,
        };
        assert_eq!(unknown.fraction(), None);
    }
}
