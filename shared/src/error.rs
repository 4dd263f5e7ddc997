//! Wire-level error type

use core::fmt;

/// Errors raised while decoding frames, reassembling messages or decoding bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Not enough bytes for the structure being decoded
    TooShort,
    /// Frame size field is zero or exceeds the maximum frame payload
    InvalidFrameSize(usize),
    /// Channel byte does not name a known channel
    UnknownChannel(u8),
    /// A MIDDLE/LAST fragment arrived without a FIRST fragment
    UnexpectedContinuation,
    /// A FIRST/BULK fragment arrived while another message was unfinished
    InterleavedMessage,
    /// Reassembled size differs from the size announced in the FIRST frame
    SizeMismatch { expected: usize, actual: usize },
    /// Message id does not belong to the channel's vocabulary
    UnknownMessageId(u16),
    /// Body serialization failed
    SerializationError,
    /// Body deserialization failed
    DeserializationError,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::TooShort => write!(f, "buffer too short"),
            WireError::InvalidFrameSize(size) => write!(f, "invalid frame size {}", size),
            WireError::UnknownChannel(id) => write!(f, "unknown channel id {}", id),
            WireError::UnexpectedContinuation => write!(f, "continuation frame without first frame"),
            WireError::InterleavedMessage => write!(f, "new message started before previous one finished"),
            WireError::SizeMismatch { expected, actual } => {
                write!(f, "reassembled size {} differs from announced {}", actual, expected)
            }
            WireError::UnknownMessageId(id) => write!(f, "unknown message id 0x{:04x}", id),
            WireError::SerializationError => write!(f, "serialization failed"),
            WireError::DeserializationError => write!(f, "deserialization failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WireError {}

impl From<postcard::Error> for WireError {
    fn from(e: postcard::Error) -> Self {
        match e {
            postcard::Error::SerializeBufferFull | postcard::Error::SerializeSeqLengthUnknown => {
                WireError::SerializationError
            }
            _ => WireError::DeserializationError,
        }
    }
}
