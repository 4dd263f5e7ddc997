//! # Protocol Message Definitions
//!
//! Typed bodies for every message the head unit sends or understands.
//! Messages are serialized using `postcard`, except for the few bodies whose
//! layout is fixed by the phone side (version exchange, handshake bytes and
//! media payloads) which are encoded by hand. The postcard bodies carry the
//! same fields as the phone's protobuf messages but not their encoding.
//!
//! ## Message Families
//!
//! - **control**: Version, handshake, discovery, channel open, focus, keepalive, shutdown
//! - **media**: Audio/video sink and microphone source setup, streaming and acks
//! - **input**: Key bindings and input event reports
//! - **sensor**: Sensor start and event reports
//! - **bluetooth**: Pairing
//! - **wifi**: Access point credentials for wireless projection

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::frame::MessageType;

pub mod bluetooth;
pub mod control;
pub mod input;
pub mod media;
pub mod sensor;
pub mod wifi;

/// A typed message body bound to a message id
pub trait WireMessage: Sized {
    /// Message id prepended to the body on the wire
    const ID: u16;
    /// Control for channel open messages, Specific for everything else
    const MESSAGE_TYPE: MessageType = MessageType::Specific;

    /// Serialize the body (without message id)
    fn encode_body(&self) -> Result<Vec<u8>, WireError>;

    /// Deserialize the body (without message id)
    fn decode_body(body: &[u8]) -> Result<Self, WireError>;
}

/// Implement [`WireMessage`] for a serde type using postcard
macro_rules! postcard_message {
    ($ty:ty, $id:expr) => {
        postcard_message!($ty, $id, $crate::frame::MessageType::Specific);
    };
    ($ty:ty, $id:expr, $message_type:expr) => {
        impl $crate::protocol::WireMessage for $ty {
            const ID: u16 = $id;
            const MESSAGE_TYPE: $crate::frame::MessageType = $message_type;

            fn encode_body(&self) -> Result<alloc::vec::Vec<u8>, $crate::error::WireError> {
                postcard::to_allocvec(self).map_err($crate::error::WireError::from)
            }

            fn decode_body(body: &[u8]) -> Result<Self, $crate::error::WireError> {
                postcard::from_bytes(body).map_err($crate::error::WireError::from)
            }
        }
    };
}
pub(crate) use postcard_message;

/// Generic status carried by responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Success,
    Fail,
    InvalidChannel,
    InvalidService,
    UnsolicitedMessage,
    InternalError,
    NoCompatibleVersion,
    FramingError,
}

impl MessageStatus {
    pub fn is_success(self) -> bool {
        self == MessageStatus::Success
    }
}

/// Read a big-endian u16 at `offset`
pub(crate) fn read_u16(body: &[u8], offset: usize) -> Result<u16, WireError> {
    body.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(WireError::TooShort)
}

/// Read a big-endian u64 at `offset`
pub(crate) fn read_u64(body: &[u8], offset: usize) -> Result<u64, WireError> {
    let bytes = body.get(offset..offset + 8).ok_or(WireError::TooShort)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_be_bytes(raw))
}
