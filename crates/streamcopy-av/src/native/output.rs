use ffmpeg_the_third as ffmpeg;
use ffmpeg::ffi;
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_int;
use std::ptr;

use super::input::NativeInput;
use super::packet::NativePacket;
use super::from_ff;
use crate::container::{MuxOptions, Output};
use crate::error::averror;
use crate::types::Rational;
use crate::{Error, Result};

/// A muxer context under construction.
///
/// Dropping it closes the I/O sink, if one was opened, then frees the
/// context.
pub struct NativeOutput {
    ctx: ffmpeg::format::context::Output,
    path: String,
    c_path: CString,
    format_name: String,
}

impl NativeOutput {
    pub(crate) fn alloc(path: &str, format: Option<&str>) -> Result<Self> {
        let c_path = CString::new(path)
            .map_err(|_| Error::invalid_argument(format!("path contains NUL: {:?}", path)))?;
        let c_format = format
            .map(|f| {
                CString::new(f)
                    .map_err(|_| Error::invalid_argument(format!("format contains NUL: {:?}", f)))
            })
            .transpose()?;

        // `format::output_as` opens the I/O sink together with the context;
        // allocation and `open_io` are separate steps here.
        let mut raw = ptr::null_mut();
        let ret = unsafe {
            ffi::avformat_alloc_output_context2(
                &mut raw,
                ptr::null_mut(),
                c_format.as_ref().map_or(ptr::null(), |f| f.as_ptr()),
                c_path.as_ptr(),
            )
        };
        if ret < 0 || raw.is_null() {
            return Err(Error::Allocation {
                what: "output context",
                code: if ret < 0 { ret } else { averror(libc::ENOMEM) },
            });
        }
        let ctx = unsafe { ffmpeg::format::context::Output::wrap(raw) };

        let format_name = ctx.format().name().to_string();
        tracing::debug!("Allocated {} output for {}", format_name, path);

        Ok(Self {
            ctx,
            path: path.to_string(),
            c_path,
            format_name,
        })
    }

    pub(crate) fn add_stream_copy(&mut self, input: &NativeInput, index: usize) -> Result<usize> {
        let source = input
            .context()
            .stream(index)
            .ok_or_else(|| Error::invalid_argument(format!("no input stream {}", index)))?;

        let mut stream = self
            .ctx
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| Error::Allocation {
                what: "output stream",
                code: e.into(),
            })?;
        stream.set_parameters(source.parameters());
        // The codec tag has no setter; the output format assigns its own.
        unsafe {
            (*(*stream.as_mut_ptr()).codecpar).codec_tag = 0;
        }
        stream.set_time_base(source.time_base());

        Ok(stream.index())
    }
}

impl fmt::Debug for NativeOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeOutput")
            .field("path", &self.path)
            .field("format_name", &self.format_name)
            .finish()
    }
}

/// Copy muxer options into an FFmpeg dictionary.
fn mux_dictionary(options: &MuxOptions) -> Result<ffmpeg::Dictionary<'static>> {
    let mut dict = ffmpeg::Dictionary::new();
    for (key, value) in options.iter() {
        if key.contains('\0') || value.contains('\0') {
            return Err(Error::invalid_argument(format!(
                "muxer option contains NUL: {:?}",
                key
            )));
        }
        dict.set(key, value);
    }
    Ok(dict)
}

impl Output for NativeOutput {
    type Packet = NativePacket;

    fn path(&self) -> &str {
        &self.path
    }

    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn needs_io(&self) -> bool {
        !self
            .ctx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::NO_FILE)
    }

    fn open_io(&mut self) -> Result<()> {
        // No safe entry point opens I/O on an already allocated context.
        let ret = unsafe {
            ffi::avio_open(
                &mut (*self.ctx.as_mut_ptr()).pb,
                self.c_path.as_ptr(),
                ffi::AVIO_FLAG_WRITE as c_int,
            )
        };
        if ret < 0 {
            return Err(Error::IoOpen {
                path: self.path.clone(),
                code: ret,
            });
        }
        Ok(())
    }

    fn stream_count(&self) -> usize {
        self.ctx.streams().count()
    }

    fn stream_time_base(&self, index: usize) -> Option<Rational> {
        self.ctx.stream(index).map(|s| from_ff(s.time_base()))
    }

    fn write_header(&mut self, options: &MuxOptions) -> Result<()> {
        let dict = mux_dictionary(options)?;
        let ignored = self
            .ctx
            .write_header_with(dict)
            .map_err(|e| Error::HeaderWrite { code: e.into() })?;

        for (key, _) in ignored.iter() {
            tracing::warn!("Muxer {} ignored option {}", self.format_name, key);
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: &mut NativePacket) -> Result<()> {
        let inner = packet.inner_mut();
        inner.set_position(-1);
        inner
            .write_interleaved(&mut self.ctx)
            .map_err(|e| Error::PacketWrite { code: e.into() })
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.ctx
            .write_trailer()
            .map_err(|e| Error::TrailerWrite { code: e.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::NativeBackend;
    use crate::Backend;

    #[test]
    fn test_hls_output_needs_no_io() {
        let backend = NativeBackend::new();
        let output = backend
            .alloc_output("/tmp/streamcopy-test/index.m3u8", Some("hls"))
            .unwrap();
        assert_eq!(output.format_name(), "hls");
        assert!(!output.needs_io());
        assert_eq!(output.stream_count(), 0);
        assert_eq!(output.stream_time_base(0), None);
    }

    #[test]
    fn test_format_guessed_from_extension() {
        let backend = NativeBackend::new();
        let output = backend.alloc_output("clip.mkv", None).unwrap();
        assert_eq!(output.format_name(), "matroska");
        assert!(output.needs_io());
    }

    #[test]
    fn test_unknown_format_fails() {
        let backend = NativeBackend::new();
        let err = backend
            .alloc_output("clip.unknown-extension", None)
            .unwrap_err();
        assert!(matches!(err, Error::Allocation { .. }));
    }

    #[test]
    fn test_mux_dictionary_keeps_every_option() {
        let mut options = MuxOptions::new();
        options
            .set("hls_playlist_type", "vod")
            .set("hls_segment_type", "fmp4");

        let dict = mux_dictionary(&options).unwrap();
        assert_eq!(dict.get("hls_playlist_type"), Some("vod"));
        assert_eq!(dict.get("hls_segment_type"), Some("fmp4"));
        assert_eq!(dict.iter().count(), 2);
    }

    #[test]
    fn test_mux_dictionary_rejects_nul() {
        let mut options = MuxOptions::new();
        options.set("bad\0key", "v");
        assert!(matches!(
            mux_dictionary(&options),
            Err(Error::InvalidArgument(_))
        ));
    }
}
