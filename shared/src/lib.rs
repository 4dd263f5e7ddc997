//! # Shared Protocol Library
//!
//! This crate provides the wire-level abstractions for the Android Auto head unit:
//!
//! - **Channels**: Logical sub-streams multiplexed over one transport
//! - **Frames**: Channel tag, fragmentation flags, size header and payload slice
//! - **Reassembly**: Per-channel accumulation of fragments into whole messages
//! - **Protocol Messages**: Typed control/media/input/sensor/bluetooth/wifi bodies
//! - **Traits**: Transport halves and the cryptor capability supplied by the host
//!
//! ## Architecture
//!
//! ```text
//! Transport bytes ──► FrameDecoder ──► MessageAssembler ──► Message
//!                                          (per channel)        │
//!                                                         protocol::decode
//!                                                               │
//! Transport bytes ◄── Frame::encode ◄── fragment() ◄──── protocol::encode
//! ```
//!
//! ## Wire Compatibility
//!
//! Frame layout, message ids and the raw version/handshake/media bodies
//! follow the projection protocol. Structured bodies (discovery, channel
//! open, focus, keepalive, media setup, input, sensor, pairing, wifi) are
//! encoded with `postcard` and are only understood by peers built on this
//! crate. Talking to a stock phone needs those bodies in the phone's
//! protobuf schema; `WireMessage` is the single place that would change.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod buffer;
pub mod channel;
pub mod error;
pub mod frame;
pub mod message;
pub mod protocol;
pub mod traits;

// Re-export main types for convenience
pub use buffer::MessageAssembler;
pub use channel::ChannelId;
pub use error::WireError;
pub use frame::{fragment, EncryptionType, Frame, FrameDecoder, FrameHeader, FrameType, MessageType};
pub use message::Message;
pub use protocol::WireMessage;
pub use traits::{
    Cryptor, CryptorError, HandshakeStatus, TransportError, TransportReader, TransportResult,
    TransportWriter,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum payload carried by a single frame
pub const MAX_FRAME_PAYLOAD: usize = 0x4000;

/// Protocol version announced by the head unit in the version request
pub const PROTOCOL_MAJOR_VERSION: u16 = 1;
/// Protocol minor version announced by the head unit
pub const PROTOCOL_MINOR_VERSION: u16 = 1;
