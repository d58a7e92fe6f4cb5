use ffmpeg_the_third as ffmpeg;
use ffmpeg::ffi;
use ffmpeg::format::stream::{Disposition, Stream};
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_int;
use std::ptr;
use std::slice;

use super::packet::NativePacket;
use super::{from_ff, from_media_kind, optional_ts, to_media_kind};
use crate::container::{Input, SeekMode};
use crate::types::{
    ChannelLayout, CodecParameters, Discard, MediaType, Metadata, Rational, SideData,
    SideDataKind, StreamInfo,
};
use crate::{Error, Result};

/// An open demuxer context.
pub struct NativeInput {
    ctx: ffmpeg::format::context::Input,
    url: String,
    format_name: String,
    streams: Vec<StreamInfo>,
    metadata: Metadata,
}

impl NativeInput {
    pub(crate) fn open(url: &str) -> Result<Self> {
        let c_url = CString::new(url)
            .map_err(|_| Error::invalid_argument(format!("URL contains NUL: {:?}", url)))?;

        // `format::input` probes right after opening; here the probe is a
        // separate step, so the context is opened through ffi and wrapped.
        let mut raw = ptr::null_mut();
        let ret = unsafe {
            ffi::avformat_open_input(&mut raw, c_url.as_ptr(), ptr::null_mut(), ptr::null_mut())
        };
        if ret < 0 {
            return Err(Error::Open {
                url: url.to_string(),
                code: ret,
            });
        }
        let ctx = unsafe { ffmpeg::format::context::Input::wrap(raw) };

        let mut input = Self {
            ctx,
            url: url.to_string(),
            format_name: String::new(),
            streams: Vec::new(),
            metadata: Metadata::new(),
        };
        input.refresh();
        tracing::debug!("Opened input {} ({})", input.url, input.format_name);
        Ok(input)
    }

    pub(crate) fn context(&self) -> &ffmpeg::format::context::Input {
        &self.ctx
    }

    /// Rebuild the cached descriptors from the context.
    fn refresh(&mut self) {
        self.format_name = self.ctx.format().name().to_string();
        self.metadata = self
            .ctx
            .metadata()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.streams = self.ctx.streams().map(|s| stream_info(&s)).collect();
    }
}

impl fmt::Debug for NativeInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeInput")
            .field("url", &self.url)
            .field("format_name", &self.format_name)
            .field("streams", &self.streams.len())
            .finish()
    }
}

impl Input for NativeInput {
    type Packet = NativePacket;

    fn url(&self) -> &str {
        &self.url
    }

    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn find_stream_info(&mut self) -> Result<()> {
        // Only reachable through `format::input`, which also opens.
        let ret =
            unsafe { ffi::avformat_find_stream_info(self.ctx.as_mut_ptr(), ptr::null_mut()) };
        if ret < 0 {
            return Err(Error::Probe {
                url: self.url.clone(),
                code: ret,
            });
        }
        self.refresh();
        Ok(())
    }

    fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    fn best_stream(&self, media_type: MediaType) -> Option<usize> {
        self.ctx
            .streams()
            .best(to_media_kind(media_type))
            .map(|s| s.index())
    }

    fn duration(&self) -> Option<i64> {
        optional_ts(self.ctx.duration())
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn set_discard(&mut self, index: usize, discard: Discard) {
        let Some(mut stream) = self.ctx.stream_mut(index) else {
            return;
        };
        let value = match discard {
            Discard::Keep => ffi::AVDiscard::AVDISCARD_DEFAULT,
            Discard::All => ffi::AVDiscard::AVDISCARD_ALL,
        };
        // StreamMut has no discard setter.
        unsafe { (*stream.as_mut_ptr()).discard = value };
        self.streams[index].discard = discard;
    }

    fn read_packet(&mut self) -> Result<Option<NativePacket>> {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.ctx) {
            Ok(()) => Ok(Some(NativePacket::new(packet))),
            Err(ffmpeg::Error::Eof) => Ok(None),
            Err(e) => Err(Error::Read { code: e.into() }),
        }
    }

    fn seek(&mut self, stream: usize, timestamp: i64, mode: SeekMode) -> Result<()> {
        // `context::Input::seek` always targets the default stream in
        // AV_TIME_BASE units; seeking in a stream's own time-base needs ffi.
        let ctx = unsafe { self.ctx.as_mut_ptr() };
        let index = stream as c_int;
        let ret = unsafe {
            match mode {
                SeekMode::Backward => ffi::av_seek_frame(
                    ctx,
                    index,
                    timestamp,
                    ffi::AVSEEK_FLAG_BACKWARD as c_int,
                ),
                SeekMode::AtLeast => {
                    ffi::avformat_seek_file(ctx, index, timestamp, timestamp, i64::MAX, 0)
                }
                SeekMode::AtMost => {
                    ffi::avformat_seek_file(ctx, index, i64::MIN, timestamp, timestamp, 0)
                }
                SeekMode::Nearest => {
                    ffi::avformat_seek_file(ctx, index, i64::MIN, timestamp, i64::MAX, 0)
                }
            }
        };
        if ret < 0 {
            return Err(Error::Seek { stream, code: ret });
        }
        Ok(())
    }

    fn flush(&mut self) {
        // No safe wrapper for avformat_flush.
        unsafe { ffi::avformat_flush(self.ctx.as_mut_ptr()) };
    }
}

fn stream_info(stream: &Stream) -> StreamInfo {
    let params = stream.parameters();
    let id = params.id();
    let mut codec = CodecParameters::new(
        from_media_kind(params.medium()),
        ffi::AVCodecID::from(id) as u32,
        id.name(),
    );

    // Parameters only exposes the media type and codec id; the remaining
    // fields are read from the struct itself.
    let (sample_aspect_ratio, side_data) = unsafe {
        let par = &*params.as_ptr();
        read_parameters(&mut codec, par);
        let sar = par.sample_aspect_ratio;
        (Rational::new(sar.num, sar.den), read_side_data(par))
    };

    let mut info = StreamInfo::new(stream.index(), from_ff(stream.time_base()), codec);
    info.duration = optional_ts(stream.duration());
    info.start_time = optional_ts(stream.start_time());
    info.discard = if stream.discard() == ffmpeg::Discard::All {
        Discard::All
    } else {
        Discard::Keep
    };
    info.attached_picture = stream.disposition().contains(Disposition::ATTACHED_PIC);
    info.metadata = stream
        .metadata()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    info.side_data = side_data;
    info.avg_frame_rate = from_ff(stream.avg_frame_rate());
    info.real_frame_rate = from_ff(stream.rate());
    info.sample_aspect_ratio = if sample_aspect_ratio.den == 0 {
        Rational::new(0, 1)
    } else {
        sample_aspect_ratio
    };
    info
}

unsafe fn read_parameters(codec: &mut CodecParameters, par: &ffi::AVCodecParameters) {
    codec.codec_tag = par.codec_tag;
    codec.format = par.format;
    codec.bit_rate = par.bit_rate;
    codec.width = par.width.max(0) as u32;
    codec.height = par.height.max(0) as u32;
    codec.sample_rate = par.sample_rate.max(0) as u32;
    codec.channel_layout = channel_layout(&par.ch_layout);
    codec.profile = par.profile;
    codec.level = par.level;
    if !par.extradata.is_null() && par.extradata_size > 0 {
        codec.extradata = slice::from_raw_parts(par.extradata, par.extradata_size as usize).to_vec();
    }
}

unsafe fn channel_layout(layout: &ffi::AVChannelLayout) -> ChannelLayout {
    let channels = layout.nb_channels.max(0) as u32;
    let mask = if layout.order == ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE {
        layout.u.mask
    } else {
        0
    };
    ChannelLayout::new(channels, mask)
}

unsafe fn read_side_data(par: &ffi::AVCodecParameters) -> Vec<SideData> {
    if par.coded_side_data.is_null() || par.nb_coded_side_data <= 0 {
        return Vec::new();
    }

    slice::from_raw_parts(par.coded_side_data, par.nb_coded_side_data as usize)
        .iter()
        .map(|sd| {
            let kind = if sd.type_ == ffi::AVPacketSideDataType::AV_PKT_DATA_DISPLAYMATRIX {
                SideDataKind::DisplayMatrix
            } else {
                SideDataKind::Other(sd.type_ as u32)
            };
            let data = if sd.data.is_null() {
                Vec::new()
            } else {
                slice::from_raw_parts(sd.data, sd.size).to_vec()
            };
            SideData { kind, data }
        })
        .collect()
}
