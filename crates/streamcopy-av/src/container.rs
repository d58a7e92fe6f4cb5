//! Container abstraction.
//!
//! A [`Backend`] opens input containers and allocates output containers. The
//! remux pipeline, the duration estimator and the stream selector are written
//! against these traits only, so the FFmpeg backend and the in-memory backend
//! run exactly the same logic.
//!
//! Handles release their native resources on drop. An output handle closes
//! its I/O sink (when its format needed one and it was opened) before freeing
//! the context; an input handle closes the demuxer.

use crate::types::{Discard, MediaType, Metadata, Rational, StreamInfo};
use crate::Result;

/// How a seek request positions the demuxer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// Frame seek biased backward: the closest keyframe at or before the
    /// target.
    Backward,
    /// The closest keyframe at or after the target.
    AtLeast,
    /// The closest keyframe at or before the target, never after it.
    AtMost,
    /// The keyframe closest to the target in either direction.
    Nearest,
}

/// A compressed packet read from an input container.
pub trait Packet {
    /// Index of the stream the packet belongs to.
    fn stream_index(&self) -> usize;

    /// Retag the packet for another stream.
    fn set_stream_index(&mut self, index: usize);

    /// Presentation timestamp, `None` when unset.
    fn pts(&self) -> Option<i64>;

    /// Decoding timestamp, `None` when unset.
    fn dts(&self) -> Option<i64>;

    /// Duration in the stream's time-base, 0 when unknown.
    fn duration(&self) -> i64;

    /// Rescale pts, dts and duration from one time-base to another. Unset
    /// timestamps stay unset.
    fn rescale_ts(&mut self, from: Rational, to: Rational);
}

/// An open input container.
pub trait Input {
    type Packet: Packet;

    /// The URL the container was opened from.
    fn url(&self) -> &str;

    /// Short name of the detected container format.
    fn format_name(&self) -> &str;

    /// Read enough of the input to fill in stream information.
    fn find_stream_info(&mut self) -> Result<()>;

    /// Stream descriptors, indexed by stream index.
    fn streams(&self) -> &[StreamInfo];

    /// The stream of `media_type` a player would pick: attached pictures
    /// lose to real streams, then longer and higher bit rate streams win.
    fn best_stream(&self, media_type: MediaType) -> Option<usize>;

    /// Container duration in [`crate::types::TIME_BASE`] ticks, `None` when
    /// the container does not report one.
    fn duration(&self) -> Option<i64>;

    /// Container-level metadata tags.
    fn metadata(&self) -> &Metadata;

    /// Set the demuxer policy for one stream.
    fn set_discard(&mut self, index: usize, discard: Discard);

    /// Read the next packet. `Ok(None)` marks end of stream.
    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;

    /// Seek `stream` to `timestamp`, expressed in that stream's time-base.
    fn seek(&mut self, stream: usize, timestamp: i64, mode: SeekMode) -> Result<()>;

    /// Drop any buffered demuxer state after a seek.
    fn flush(&mut self);
}

/// An output container under construction.
pub trait Output {
    type Packet: Packet;

    /// Target path or URL.
    fn path(&self) -> &str;

    /// Short name of the output format.
    fn format_name(&self) -> &str;

    /// Whether the format writes through an I/O sink the caller must open.
    fn needs_io(&self) -> bool;

    /// Open the I/O sink for [`Output::path`].
    fn open_io(&mut self) -> Result<()>;

    /// Number of output streams created so far.
    fn stream_count(&self) -> usize;

    /// Time-base of an output stream. Muxers may change it while writing the
    /// header.
    fn stream_time_base(&self, index: usize) -> Option<Rational>;

    /// Write the container header, passing format options to the muxer.
    fn write_header(&mut self, options: &MuxOptions) -> Result<()>;

    /// Write one packet with interleaving. The packet payload may be consumed.
    fn write_packet(&mut self, packet: &mut Self::Packet) -> Result<()>;

    /// Write the container trailer.
    fn write_trailer(&mut self) -> Result<()>;
}

/// Factory for input and output containers of one implementation.
pub trait Backend {
    type Packet: Packet;
    type Input: Input<Packet = Self::Packet>;
    type Output: Output<Packet = Self::Packet>;

    /// Open an input container. Stream information is not probed yet.
    fn open_input(&self, url: &str) -> Result<Self::Input>;

    /// Allocate an output container. The format is guessed from `path` when
    /// `format` is `None`.
    fn alloc_output(&self, path: &str, format: Option<&str>) -> Result<Self::Output>;

    /// Create an output stream copying the codec parameters and time-base of
    /// input stream `index`, with the codec tag cleared. Returns the new
    /// output stream index.
    fn add_stream_copy(
        &self,
        output: &mut Self::Output,
        input: &Self::Input,
        index: usize,
    ) -> Result<usize>;
}

/// Ordered muxer options passed when writing the output header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuxOptions {
    entries: Vec<(String, String)>,
}

impl MuxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, replacing any earlier value for the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
