//! Frame encoders for feeding paced raw media into webrtc-rs tracks.
//!
//! Supported codecs:
//! - PCMU: G.711 mu-law for 8 kHz audio
//!
//! Anything else is plugged in by implementing [`FrameEncoder`].

pub mod g711;

pub use g711::PcmuEncoder;

use crate::stream::MediaFrame;

/// Media kind of a stream, track or m-section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// SDP media type token
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common codec error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Frame layout the encoder cannot handle (e.g. wrong sample rate)
    UnsupportedFormat(String),
    /// Invalid input data
    InvalidInput,
    /// Encode error with message
    EncodeError(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            CodecError::InvalidInput => write!(f, "Invalid input data"),
            CodecError::EncodeError(msg) => write!(f, "Encode error: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

/// Turns one raw frame into one RTP sample payload.
pub trait FrameEncoder: Send {
    /// Encode `frame`, appending the payload to `output`.
    fn encode(&mut self, frame: &MediaFrame, output: &mut Vec<u8>) -> Result<(), CodecError>;
}
