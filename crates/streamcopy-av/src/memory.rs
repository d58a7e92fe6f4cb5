//! In-memory container backend.
//!
//! Inputs are scripted [`MemoryContainer`]s registered under a URL; outputs
//! are recorded as [`OutputRecord`]s when they are freed. Every open, close
//! and free is appended to an event journal, every packet handed out is
//! counted while alive, and any fallible call can be made to fail once with
//! a [`Fault`]. This makes the teardown guarantees of the pipeline observable
//! without FFmpeg.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::container::{Backend, Input, MuxOptions, Output, Packet, SeekMode};
use crate::error::{averror, AVERROR_INVALIDDATA};
use crate::types::{Discard, MediaType, Metadata, Rational, StreamInfo};
use crate::{Error, Result};

/// A fallible backend call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Open,
    Probe,
    AllocOutput,
    NewStream,
    CopyParameters,
    OpenIo,
    WriteHeader,
    Seek,
    /// The n-th `read_packet` call of an input, counting from 0.
    Read(usize),
    /// The n-th `write_packet` call of an output, counting from 0.
    WritePacket(usize),
    WriteTrailer,
}

/// Resource lifecycle event, tagged with the input URL or output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    InputOpened(String),
    InputClosed(String),
    OutputAllocated(String),
    IoOpened(String),
    IoClosed(String),
    OutputFreed(String),
}

/// A scripted input container.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    pub format_name: String,
    /// Duration in [`crate::types::TIME_BASE`] ticks.
    pub duration: Option<i64>,
    pub metadata: Metadata,
    pub streams: Vec<StreamInfo>,
    /// Packets in demux order.
    pub packets: Vec<MemoryPacket>,
}

impl MemoryContainer {
    pub fn new(format_name: impl Into<String>) -> Self {
        Self {
            format_name: format_name.into(),
            ..Self::default()
        }
    }

    /// Append a stream. Its index is set to its position.
    pub fn add_stream(&mut self, mut stream: StreamInfo) -> &mut Self {
        stream.index = self.streams.len();
        self.streams.push(stream);
        self
    }

    pub fn push_packet(&mut self, packet: MemoryPacket) -> &mut Self {
        self.packets.push(packet);
        self
    }
}

/// Packet data of the in-memory backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPacket {
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub key: bool,
    pub data: Vec<u8>,
}

impl MemoryPacket {
    /// A non-key packet with dts equal to pts and no payload.
    pub fn new(stream_index: usize, pts: Option<i64>, duration: i64) -> Self {
        Self {
            stream_index,
            pts,
            dts: pts,
            duration,
            key: false,
            data: Vec::new(),
        }
    }

    pub fn key(mut self, key: bool) -> Self {
        self.key = key;
        self
    }

    pub fn with_data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }
}

impl Packet for MemoryPacket {
    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn set_stream_index(&mut self, index: usize) {
        self.stream_index = index;
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn dts(&self) -> Option<i64> {
        self.dts
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.pts = self.pts.map(|ts| Rational::rescale(ts, from, to));
        self.dts = self.dts.map(|ts| Rational::rescale(ts, from, to));
        if self.duration > 0 {
            self.duration = Rational::rescale(self.duration, from, to);
        }
    }
}

/// A packet handed out by [`MemoryInput::read_packet`], counted as live
/// until dropped.
#[derive(Debug)]
pub struct LivePacket {
    packet: MemoryPacket,
    live: Rc<Cell<i64>>,
}

impl LivePacket {
    fn new(packet: MemoryPacket, live: Rc<Cell<i64>>) -> Self {
        live.set(live.get() + 1);
        Self { packet, live }
    }

    pub fn packet(&self) -> &MemoryPacket {
        &self.packet
    }
}

impl Drop for LivePacket {
    fn drop(&mut self) {
        self.live.set(self.live.get() - 1);
    }
}

impl Packet for LivePacket {
    fn stream_index(&self) -> usize {
        self.packet.stream_index()
    }

    fn set_stream_index(&mut self, index: usize) {
        self.packet.set_stream_index(index);
    }

    fn pts(&self) -> Option<i64> {
        self.packet.pts()
    }

    fn dts(&self) -> Option<i64> {
        self.packet.dts()
    }

    fn duration(&self) -> i64 {
        self.packet.duration()
    }

    fn rescale_ts(&mut self, from: Rational, to: Rational) {
        self.packet.rescale_ts(from, to);
    }
}

/// Everything written to an output, captured when it is freed.
#[derive(Debug, Clone, Default)]
pub struct OutputRecord {
    pub path: String,
    pub format: String,
    pub streams: Vec<StreamInfo>,
    pub options: MuxOptions,
    pub header_written: bool,
    pub trailer_written: bool,
    pub packets: Vec<MemoryPacket>,
}

#[derive(Debug, Default)]
struct Store {
    inputs: HashMap<String, MemoryContainer>,
    outputs: Vec<OutputRecord>,
    events: Vec<Event>,
    faults: Vec<Fault>,
}

type Shared = Rc<RefCell<Store>>;

fn record(store: &Shared, event: Event) {
    tracing::trace!("Memory backend event: {:?}", event);
    store.borrow_mut().events.push(event);
}

/// Consume an armed fault. Returns whether it was armed.
fn trip(store: &Shared, fault: Fault) -> bool {
    let mut store = store.borrow_mut();
    match store.faults.iter().position(|f| *f == fault) {
        Some(pos) => {
            store.faults.remove(pos);
            true
        }
        None => false,
    }
}

/// Backend over scripted in-memory containers.
///
/// Clones share the same inputs, journal and recorded outputs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Shared,
    live: Rc<Cell<i64>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an input container under `url`.
    pub fn with_input(self, url: impl Into<String>, container: MemoryContainer) -> Self {
        self.add_input(url, container);
        self
    }

    pub fn add_input(&self, url: impl Into<String>, container: MemoryContainer) {
        self.store
            .borrow_mut()
            .inputs
            .insert(url.into(), container);
    }

    /// Arm a fault that fires once.
    pub fn with_fault(self, fault: Fault) -> Self {
        self.inject(fault);
        self
    }

    pub fn inject(&self, fault: Fault) {
        self.store.borrow_mut().faults.push(fault);
    }

    /// Faults armed but not fired yet.
    pub fn pending_faults(&self) -> Vec<Fault> {
        self.store.borrow().faults.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.store.borrow().events.clone()
    }

    pub fn outputs(&self) -> Vec<OutputRecord> {
        self.store.borrow().outputs.clone()
    }

    /// The most recently freed output written to `path`.
    pub fn output(&self, path: &str) -> Option<OutputRecord> {
        self.store
            .borrow()
            .outputs
            .iter()
            .rev()
            .find(|o| o.path == path)
            .cloned()
    }

    /// Packets handed out and not yet dropped.
    pub fn live_packets(&self) -> i64 {
        self.live.get()
    }
}

impl Backend for MemoryBackend {
    type Packet = LivePacket;
    type Input = MemoryInput;
    type Output = MemoryOutput;

    fn open_input(&self, url: &str) -> Result<MemoryInput> {
        let found = self.store.borrow().inputs.get(url).cloned();
        let container = match found {
            Some(container) if !trip(&self.store, Fault::Open) => container,
            Some(_) => {
                return Err(Error::Open {
                    url: url.to_string(),
                    code: AVERROR_INVALIDDATA,
                })
            }
            None => {
                return Err(Error::Open {
                    url: url.to_string(),
                    code: averror(libc::ENOENT),
                })
            }
        };

        record(&self.store, Event::InputOpened(url.to_string()));
        Ok(MemoryInput {
            url: url.to_string(),
            container,
            position: 0,
            reads: 0,
            store: Rc::clone(&self.store),
            live: Rc::clone(&self.live),
        })
    }

    fn alloc_output(&self, path: &str, format: Option<&str>) -> Result<MemoryOutput> {
        if trip(&self.store, Fault::AllocOutput) {
            return Err(Error::Allocation {
                what: "output context",
                code: averror(libc::ENOMEM),
            });
        }

        let format = match format.or_else(|| guess_format(path)) {
            Some(format) => format.to_string(),
            None => {
                return Err(Error::Allocation {
                    what: "output context",
                    code: averror(libc::EINVAL),
                })
            }
        };

        record(&self.store, Event::OutputAllocated(path.to_string()));
        Ok(MemoryOutput {
            needs_io: format != "hls",
            record: OutputRecord {
                path: path.to_string(),
                format,
                ..OutputRecord::default()
            },
            io_open: false,
            writes: 0,
            store: Rc::clone(&self.store),
        })
    }

    fn add_stream_copy(
        &self,
        output: &mut MemoryOutput,
        input: &MemoryInput,
        index: usize,
    ) -> Result<usize> {
        let source = input.streams().get(index).ok_or_else(|| {
            Error::invalid_argument(format!("no input stream {}", index))
        })?;

        if trip(&self.store, Fault::NewStream) {
            return Err(Error::Allocation {
                what: "output stream",
                code: averror(libc::ENOMEM),
            });
        }
        let out_index = output.record.streams.len();
        let mut stream = StreamInfo::new(out_index, source.time_base, source.codec.for_remux());
        output.record.streams.push(stream.clone());

        if trip(&self.store, Fault::CopyParameters) {
            return Err(Error::ParameterCopy {
                code: averror(libc::ENOMEM),
            });
        }
        stream.side_data = source.side_data.clone();
        output.record.streams[out_index] = stream;

        Ok(out_index)
    }
}

/// Output format name for a path, by extension.
fn guess_format(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    let format = match ext.as_str() {
        "mp4" | "m4a" | "m4v" | "mov" => "mp4",
        "mkv" | "mka" => "matroska",
        "webm" => "webm",
        "ts" | "m2ts" => "mpegts",
        "m3u8" => "hls",
        "aac" => "adts",
        "h264" | "264" => "h264",
        "hevc" | "h265" => "hevc",
        "srt" => "srt",
        _ => return None,
    };
    Some(format)
}

/// Input handle of [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryInput {
    url: String,
    container: MemoryContainer,
    position: usize,
    reads: usize,
    store: Shared,
    live: Rc<Cell<i64>>,
}

impl MemoryInput {
    fn key_positions(&self, stream: usize) -> Vec<(usize, i64)> {
        self.container
            .packets
            .iter()
            .enumerate()
            .filter(|(_, p)| p.stream_index == stream && p.key)
            .filter_map(|(pos, p)| p.pts.map(|pts| (pos, pts)))
            .collect()
    }
}

impl Input for MemoryInput {
    type Packet = LivePacket;

    fn url(&self) -> &str {
        &self.url
    }

    fn format_name(&self) -> &str {
        &self.container.format_name
    }

    fn find_stream_info(&mut self) -> Result<()> {
        if trip(&self.store, Fault::Probe) {
            return Err(Error::Probe {
                url: self.url.clone(),
                code: AVERROR_INVALIDDATA,
            });
        }
        Ok(())
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.container.streams
    }

    fn best_stream(&self, media_type: MediaType) -> Option<usize> {
        // Ranked like the FFmpeg demuxer helper: packet count saturating at
        // 5, then bit rate, then full packet count. Ties keep the first.
        let mut best: Option<(usize, (usize, i64, usize))> = None;
        for stream in &self.container.streams {
            if stream.media_type() != media_type || stream.attached_picture {
                continue;
            }
            let count = self
                .container
                .packets
                .iter()
                .filter(|p| p.stream_index == stream.index)
                .count();
            let rank = (count.min(5), stream.codec.bit_rate, count);
            if best.map_or(true, |(_, top)| rank > top) {
                best = Some((stream.index, rank));
            }
        }
        best.map(|(index, _)| index)
    }

    fn duration(&self) -> Option<i64> {
        self.container.duration
    }

    fn metadata(&self) -> &Metadata {
        &self.container.metadata
    }

    fn set_discard(&mut self, index: usize, discard: Discard) {
        if let Some(stream) = self.container.streams.get_mut(index) {
            stream.discard = discard;
        }
    }

    fn read_packet(&mut self) -> Result<Option<LivePacket>> {
        let call = self.reads;
        self.reads += 1;
        if trip(&self.store, Fault::Read(call)) {
            return Err(Error::Read {
                code: averror(libc::EIO),
            });
        }

        while let Some(packet) = self.container.packets.get(self.position) {
            self.position += 1;
            let discarded = self
                .container
                .streams
                .get(packet.stream_index)
                .map_or(true, |s| s.discard == Discard::All);
            if !discarded {
                return Ok(Some(LivePacket::new(packet.clone(), Rc::clone(&self.live))));
            }
        }
        Ok(None)
    }

    fn seek(&mut self, stream: usize, timestamp: i64, mode: SeekMode) -> Result<()> {
        let failed = Error::Seek {
            stream,
            code: averror(libc::EPERM),
        };
        if trip(&self.store, Fault::Seek) || stream >= self.container.streams.len() {
            return Err(failed);
        }

        let keys = self.key_positions(stream);
        let before = keys.iter().rev().find(|(_, pts)| *pts <= timestamp);
        let after = keys.iter().find(|(_, pts)| *pts >= timestamp);

        let target = match mode {
            // Demuxers clamp a backward seek before the first keyframe to it.
            SeekMode::Backward => before.or_else(|| keys.first()),
            SeekMode::AtMost => before,
            SeekMode::AtLeast => after,
            SeekMode::Nearest => keys
                .iter()
                .min_by_key(|(_, pts)| (i128::from(*pts) - i128::from(timestamp)).abs()),
        };

        match target {
            Some((pos, _)) => {
                self.position = *pos;
                Ok(())
            }
            None => Err(failed),
        }
    }

    fn flush(&mut self) {}
}

impl Drop for MemoryInput {
    fn drop(&mut self) {
        record(&self.store, Event::InputClosed(self.url.clone()));
    }
}

/// Output handle of [`MemoryBackend`].
#[derive(Debug)]
pub struct MemoryOutput {
    record: OutputRecord,
    needs_io: bool,
    io_open: bool,
    writes: usize,
    store: Shared,
}

impl Output for MemoryOutput {
    type Packet = LivePacket;

    fn path(&self) -> &str {
        &self.record.path
    }

    fn format_name(&self) -> &str {
        &self.record.format
    }

    fn needs_io(&self) -> bool {
        self.needs_io
    }

    fn open_io(&mut self) -> Result<()> {
        if trip(&self.store, Fault::OpenIo) {
            return Err(Error::IoOpen {
                path: self.record.path.clone(),
                code: averror(libc::EACCES),
            });
        }
        self.io_open = true;
        record(&self.store, Event::IoOpened(self.record.path.clone()));
        Ok(())
    }

    fn stream_count(&self) -> usize {
        self.record.streams.len()
    }

    fn stream_time_base(&self, index: usize) -> Option<Rational> {
        self.record.streams.get(index).map(|s| s.time_base)
    }

    fn write_header(&mut self, options: &MuxOptions) -> Result<()> {
        if trip(&self.store, Fault::WriteHeader) || self.needs_io && !self.io_open {
            return Err(Error::HeaderWrite {
                code: averror(libc::EINVAL),
            });
        }

        // Like their FFmpeg counterparts, these muxers force a 90kHz clock.
        if matches!(self.record.format.as_str(), "hls" | "mpegts") {
            for stream in &mut self.record.streams {
                stream.time_base = Rational::new(1, 90_000);
            }
        }
        self.record.options = options.clone();
        self.record.header_written = true;
        Ok(())
    }

    fn write_packet(&mut self, packet: &mut LivePacket) -> Result<()> {
        let call = self.writes;
        self.writes += 1;
        if trip(&self.store, Fault::WritePacket(call))
            || !self.record.header_written
            || packet.stream_index() >= self.record.streams.len()
        {
            return Err(Error::PacketWrite {
                code: averror(libc::EIO),
            });
        }
        self.record.packets.push(packet.packet.clone());
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        if trip(&self.store, Fault::WriteTrailer) || !self.record.header_written {
            return Err(Error::TrailerWrite {
                code: averror(libc::EIO),
            });
        }
        self.record.trailer_written = true;
        Ok(())
    }
}

impl Drop for MemoryOutput {
    fn drop(&mut self) {
        let path = self.record.path.clone();
        if self.io_open && self.needs_io {
            record(&self.store, Event::IoClosed(path.clone()));
        }
        record(&self.store, Event::OutputFreed(path));
        let output = std::mem::take(&mut self.record);
        self.store.borrow_mut().outputs.push(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CodecParameters, MediaType};

    fn container() -> MemoryContainer {
        let mut container = MemoryContainer::new("matroska");
        container.add_stream(StreamInfo::new(
            7,
            Rational::new(1, 1000),
            CodecParameters::new(MediaType::Video, 27, "h264"),
        ));
        container.add_stream(StreamInfo::new(
            7,
            Rational::new(1, 48_000),
            CodecParameters::new(MediaType::Audio, 86018, "aac"),
        ));
        for i in 0..6 {
            container.push_packet(MemoryPacket::new(0, Some(i * 100), 100).key(i % 2 == 0));
            container.push_packet(MemoryPacket::new(1, Some(i * 4800), 4800).key(true));
        }
        container
    }

    #[test]
    fn test_add_stream_assigns_index() {
        let c = container();
        assert_eq!(c.streams[0].index, 0);
        assert_eq!(c.streams[1].index, 1);
    }

    #[test]
    fn test_read_skips_discarded_and_counts_live() {
        let backend = MemoryBackend::new().with_input("a.mkv", container());
        let mut input = backend.open_input("a.mkv").unwrap();
        input.set_discard(1, Discard::All);

        let first = input.read_packet().unwrap().unwrap();
        let second = input.read_packet().unwrap().unwrap();
        assert_eq!(first.stream_index(), 0);
        assert_eq!(second.pts(), Some(100));
        assert_eq!(backend.live_packets(), 2);

        drop(first);
        drop(second);
        assert_eq!(backend.live_packets(), 0);
    }

    #[test]
    fn test_best_stream_skips_cover_art() {
        let mut c = MemoryContainer::new("mov,mp4");
        let mut cover = StreamInfo::new(
            0,
            Rational::new(1, 90_000),
            CodecParameters::new(MediaType::Video, 7, "mjpeg"),
        );
        cover.attached_picture = true;
        c.add_stream(cover);
        c.add_stream(StreamInfo::new(
            0,
            Rational::new(1, 1000),
            CodecParameters::new(MediaType::Video, 27, "h264"),
        ));
        c.push_packet(MemoryPacket::new(0, Some(0), 0).key(true));
        c.push_packet(MemoryPacket::new(1, Some(0), 40).key(true));

        let backend = MemoryBackend::new().with_input("a.mp4", c);
        let input = backend.open_input("a.mp4").unwrap();
        assert_eq!(input.best_stream(MediaType::Video), Some(1));
        assert_eq!(input.best_stream(MediaType::Audio), None);
    }

    #[test]
    fn test_best_stream_prefers_higher_bit_rate() {
        let mut c = container();
        let mut hi = StreamInfo::new(
            0,
            Rational::new(1, 48_000),
            CodecParameters::new(MediaType::Audio, 86018, "aac"),
        );
        hi.codec.bit_rate = 256_000;
        c.add_stream(hi);
        for i in 0..6 {
            c.push_packet(MemoryPacket::new(2, Some(i * 4800), 4800).key(true));
        }

        let backend = MemoryBackend::new().with_input("a.mkv", c);
        let input = backend.open_input("a.mkv").unwrap();
        assert_eq!(input.best_stream(MediaType::Audio), Some(2));
        assert_eq!(input.best_stream(MediaType::Video), Some(0));
    }

    #[test]
    fn test_seek_modes() {
        let backend = MemoryBackend::new().with_input("a.mkv", container());
        let mut input = backend.open_input("a.mkv").unwrap();
        input.set_discard(1, Discard::All);

        fn next_pts(input: &mut MemoryInput, ts: i64, mode: SeekMode) -> Option<i64> {
            input.seek(0, ts, mode).unwrap();
            input.read_packet().unwrap().unwrap().pts()
        }

        // Keyframes at 0, 200 and 400.
        assert_eq!(next_pts(&mut input, 350, SeekMode::Backward), Some(200));
        assert_eq!(next_pts(&mut input, 350, SeekMode::AtMost), Some(200));
        assert_eq!(next_pts(&mut input, 250, SeekMode::AtLeast), Some(400));
        assert_eq!(next_pts(&mut input, 350, SeekMode::Nearest), Some(400));
        assert_eq!(next_pts(&mut input, i64::MAX, SeekMode::Backward), Some(400));
        assert_eq!(next_pts(&mut input, -50, SeekMode::Backward), Some(0));

        assert!(input.seek(0, -50, SeekMode::AtMost).is_err());
        assert!(input.seek(0, 401, SeekMode::AtLeast).is_err());
        assert!(input.seek(5, 0, SeekMode::Backward).is_err());
    }

    #[test]
    fn test_faults_fire_once() {
        let backend = MemoryBackend::new()
            .with_input("a.mkv", container())
            .with_fault(Fault::Open);

        assert!(matches!(
            backend.open_input("a.mkv"),
            Err(Error::Open { .. })
        ));
        assert!(backend.open_input("a.mkv").is_ok());
        assert!(backend.pending_faults().is_empty());
    }

    #[test]
    fn test_unknown_input_and_format() {
        let backend = MemoryBackend::new();
        let err = backend.open_input("missing.mkv").unwrap_err();
        assert_eq!(err.code(), -libc::ENOENT);

        let err = backend.alloc_output("out.xyz", None).unwrap_err();
        assert!(matches!(err, Error::Allocation { .. }));
        assert!(backend.events().is_empty());
    }

    #[test]
    fn test_output_is_recorded_on_drop() {
        let backend = MemoryBackend::new().with_input("a.mkv", container());
        let input = backend.open_input("a.mkv").unwrap();
        let mut output = backend.alloc_output("out.ts", None).unwrap();
        assert_eq!(output.format_name(), "mpegts");

        let index = backend.add_stream_copy(&mut output, &input, 1).unwrap();
        output.open_io().unwrap();
        output.write_header(&MuxOptions::new()).unwrap();
        assert_eq!(output.stream_time_base(index), Some(Rational::new(1, 90_000)));
        output.write_trailer().unwrap();
        drop(output);

        let record = backend.output("out.ts").unwrap();
        assert_eq!(record.streams[0].codec.codec_name, "aac");
        assert!(record.header_written && record.trailer_written);
        assert_eq!(
            backend.events()[1..],
            [
                Event::OutputAllocated("out.ts".into()),
                Event::IoOpened("out.ts".into()),
                Event::IoClosed("out.ts".into()),
                Event::OutputFreed("out.ts".into()),
            ]
        );
    }
}
