//! Error types for streamcopy-av.
//!
//! Every error maps onto an FFmpeg-style signed result code through
//! [`Error::code`], so callers that only deal in integers can still tell the
//! failure apart and format it with [`describe`].

use crate::types::MediaType;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Build an FFmpeg error tag code from four bytes.
pub const fn fferrtag(a: u8, b: u8, c: u8, d: u8) -> i32 {
    -((a as i32) | ((b as i32) << 8) | ((c as i32) << 16) | ((d as i32) << 24))
}

/// Negative result code for a POSIX errno value.
pub const fn averror(errno: i32) -> i32 {
    -errno
}

/// End of file.
pub const AVERROR_EOF: i32 = fferrtag(b'E', b'O', b'F', b' ');
/// Stream not found.
pub const AVERROR_STREAM_NOT_FOUND: i32 = fferrtag(0xF8, b'S', b'T', b'R');
/// Invalid data found when processing input.
pub const AVERROR_INVALIDDATA: i32 = fferrtag(b'I', b'N', b'D', b'A');
/// Muxer not found.
pub const AVERROR_MUXER_NOT_FOUND: i32 = fferrtag(0xF8, b'M', b'U', b'X');
/// Unknown error.
pub const AVERROR_UNKNOWN: i32 = fferrtag(b'U', b'N', b'K', b'N');

/// Errors that can occur while opening, inspecting or remuxing containers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input container could not be opened.
    #[error("failed to open input {url}: {}", error_text(.code))]
    Open { url: String, code: i32 },

    /// Stream information could not be read from the input.
    #[error("failed to read stream information from {url}: {}", error_text(.code))]
    Probe { url: String, code: i32 },

    /// The input has no stream of the requested type.
    #[error("no {media_type} stream found")]
    StreamNotFound { media_type: MediaType },

    /// An output context, output stream, packet or dictionary could not be
    /// allocated.
    #[error("failed to allocate {what}: {}", error_text(.code))]
    Allocation { what: &'static str, code: i32 },

    /// Codec parameters could not be copied to the output stream.
    #[error("failed to copy codec parameters: {}", error_text(.code))]
    ParameterCopy { code: i32 },

    /// The output I/O sink could not be opened.
    #[error("failed to open output {path}: {}", error_text(.code))]
    IoOpen { path: String, code: i32 },

    /// The output container header could not be written.
    #[error("failed to write output header: {}", error_text(.code))]
    HeaderWrite { code: i32 },

    /// Seeking the input failed.
    #[error("failed to seek stream {stream}: {}", error_text(.code))]
    Seek { stream: usize, code: i32 },

    /// Reading a packet from the input failed.
    #[error("failed to read packet: {}", error_text(.code))]
    Read { code: i32 },

    /// Writing a packet to the output failed.
    #[error("failed to write packet: {}", error_text(.code))]
    PacketWrite { code: i32 },

    /// The output container trailer could not be written.
    #[error("failed to write output trailer: {}", error_text(.code))]
    TrailerWrite { code: i32 },

    /// Invalid input provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Signed result code for this error, always negative.
    pub fn code(&self) -> i32 {
        match self {
            Error::Open { code, .. }
            | Error::Probe { code, .. }
            | Error::Allocation { code, .. }
            | Error::ParameterCopy { code }
            | Error::IoOpen { code, .. }
            | Error::HeaderWrite { code }
            | Error::Seek { code, .. }
            | Error::Read { code }
            | Error::PacketWrite { code }
            | Error::TrailerWrite { code } => negative(*code),
            Error::StreamNotFound { .. } => AVERROR_STREAM_NOT_FOUND,
            Error::InvalidArgument(_) => averror(libc::EINVAL),
        }
    }
}

/// Collapse a result into the signed result code convention: 0 on success,
/// the negative error code otherwise.
pub fn result_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => err.code(),
    }
}

fn negative(code: i32) -> i32 {
    if code < 0 {
        code
    } else {
        AVERROR_UNKNOWN
    }
}

fn error_text(code: &i32) -> String {
    describe(*code)
}

/// Human-readable text for a signed result code.
#[cfg(feature = "native-ffmpeg")]
pub fn describe(code: i32) -> String {
    if code >= 0 {
        return "Success".to_string();
    }
    ffmpeg_the_third::Error::from(code).to_string()
}

/// Human-readable text for a signed result code.
#[cfg(not(feature = "native-ffmpeg"))]
pub fn describe(code: i32) -> String {
    if code >= 0 {
        return "Success".to_string();
    }
    let text = match code {
        AVERROR_EOF => "End of file",
        AVERROR_STREAM_NOT_FOUND => "Stream not found",
        AVERROR_INVALIDDATA => "Invalid data found when processing input",
        AVERROR_MUXER_NOT_FOUND => "Muxer not found",
        AVERROR_UNKNOWN => "Unknown error occurred",
        c if c == averror(libc::EINVAL) => "Invalid argument",
        c if c == averror(libc::ENOMEM) => "Cannot allocate memory",
        c if c == averror(libc::ENOENT) => "No such file or directory",
        c if c == averror(libc::EACCES) => "Permission denied",
        c if c == averror(libc::EIO) => "I/O error",
        c if c == averror(libc::EPERM) => "Operation not permitted",
        _ => return format!("Error number {} occurred", code),
    };
    text.to_string()
}
