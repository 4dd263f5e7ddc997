//! # Frame Codec
//!
//! Frames are the unit written to and read from the transport. A message
//! larger than [`MAX_FRAME_PAYLOAD`] is split into FIRST, MIDDLE... and LAST
//! frames; a message that fits is sent as a single BULK frame.
//!
//! ## Frame Format
//!
//! ```text
//! ┌──────────┬─────────┬──────────────┬────────────────────┬───────────────┐
//! │ Channel  │  Flags  │  Frame size  │ Total size (FIRST) │    Payload    │
//! │  1 byte  │ 1 byte  │  u16 BE      │  u32 BE            │  frame size   │
//! └──────────┴─────────┴──────────────┴────────────────────┴───────────────┘
//! ```
//!
//! Flags: bits 0..1 frame type, bit 2 message type, bit 3 encryption.

use alloc::vec::Vec;

use heapless::Vec as HVec;
use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::error::WireError;
use crate::MAX_FRAME_PAYLOAD;

/// Largest encoded frame header: channel + flags + frame size + total size
pub const MAX_FRAME_HEADER_SIZE: usize = 8;

const FRAME_TYPE_MASK: u8 = 0b0000_0011;
const MESSAGE_TYPE_MASK: u8 = 0b0000_0100;
const ENCRYPTION_MASK: u8 = 0b0000_1000;

/// Position of a frame within its message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Neither first nor last fragment
    Middle = 0,
    /// First fragment, carries the total message size
    First = 1,
    /// Last fragment
    Last = 2,
    /// Whole message in one frame
    Bulk = 3,
}

impl FrameType {
    fn from_flags(flags: u8) -> Self {
        match flags & FRAME_TYPE_MASK {
            0 => FrameType::Middle,
            1 => FrameType::First,
            2 => FrameType::Last,
            _ => FrameType::Bulk,
        }
    }
}

/// Whether a message belongs to the channel-agnostic control vocabulary
/// (channel open) or to the channel's own vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Channel specific message
    Specific = 0,
    /// Channel control message (open request/response)
    Control = MESSAGE_TYPE_MASK,
}

/// Whether the frame payload went through the cryptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionType {
    /// Payload sent as-is
    Plain = 0,
    /// Payload encrypted per frame
    Encrypted = ENCRYPTION_MASK,
}

/// Decoded fixed part of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw channel byte. Kept raw so frames for unknown channels can be skipped
    pub channel: u8,
    pub frame_type: FrameType,
    pub message_type: MessageType,
    pub encryption: EncryptionType,
}

impl FrameHeader {
    /// Create a header for a known channel
    pub fn new(
        channel: ChannelId,
        frame_type: FrameType,
        encryption: EncryptionType,
        message_type: MessageType,
    ) -> Self {
        Self {
            channel: channel.as_u8(),
            frame_type,
            message_type,
            encryption,
        }
    }

    /// Pack frame type, message type and encryption into the flags byte
    pub fn flags(&self) -> u8 {
        self.frame_type as u8 | self.message_type as u8 | self.encryption as u8
    }

    /// Parse channel and flags bytes
    pub fn parse(channel: u8, flags: u8) -> Self {
        let message_type = if flags & MESSAGE_TYPE_MASK != 0 {
            MessageType::Control
        } else {
            MessageType::Specific
        };
        let encryption = if flags & ENCRYPTION_MASK != 0 {
            EncryptionType::Encrypted
        } else {
            EncryptionType::Plain
        };
        Self {
            channel,
            frame_type: FrameType::from_flags(flags),
            message_type,
            encryption,
        }
    }

    /// Typed channel of this frame
    pub fn channel_id(&self) -> Result<ChannelId, WireError> {
        ChannelId::try_from(self.channel)
    }
}

/// One frame as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    /// Plain size of the whole message; only present on FIRST frames
    pub total_size: Option<u32>,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Encode the fixed header (channel, flags and size fields)
    pub fn encode_header(&self) -> Result<HVec<u8, MAX_FRAME_HEADER_SIZE>, WireError> {
        let frame_size = u16::try_from(self.payload.len())
            .map_err(|_| WireError::InvalidFrameSize(self.payload.len()))?;

        let mut header = HVec::new();
        // Capacity covers the largest header, pushes below cannot fail
        let _ = header.push(self.header.channel);
        let _ = header.push(self.header.flags());
        let _ = header.extend_from_slice(&frame_size.to_be_bytes());
        if self.header.frame_type == FrameType::First {
            let total = self.total_size.unwrap_or(self.payload.len() as u32);
            let _ = header.extend_from_slice(&total.to_be_bytes());
        }
        Ok(header)
    }

    /// Append header and payload to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), WireError> {
        let header = self.encode_header()?;
        out.reserve(header.len() + self.payload.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.payload);
        Ok(())
    }

    /// Encode the frame into a fresh buffer
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }
}

/// A slice of a plain message payload destined for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub frame_type: FrameType,
    /// Plain size of the whole message; only present on FIRST fragments
    pub total_size: Option<u32>,
    pub data: &'a [u8],
}

/// Split a message payload into frame-sized fragments
///
/// A payload of at most [`MAX_FRAME_PAYLOAD`] bytes yields one BULK fragment.
pub fn fragment(data: &[u8]) -> impl Iterator<Item = Fragment<'_>> {
    let total = data.len();
    let single = total <= MAX_FRAME_PAYLOAD;
    let mut chunks = data.chunks(MAX_FRAME_PAYLOAD).peekable();
    let mut first = true;
    let mut empty_emitted = false;

    core::iter::from_fn(move || {
        if total == 0 {
            if empty_emitted {
                return None;
            }
            empty_emitted = true;
            return Some(Fragment {
                frame_type: FrameType::Bulk,
                total_size: None,
                data: &[],
            });
        }

        let chunk = chunks.next()?;
        let is_last = chunks.peek().is_none();
        let fragment = if single {
            Fragment {
                frame_type: FrameType::Bulk,
                total_size: None,
                data: chunk,
            }
        } else if first {
            Fragment {
                frame_type: FrameType::First,
                total_size: Some(total as u32),
                data: chunk,
            }
        } else if is_last {
            Fragment {
                frame_type: FrameType::Last,
                total_size: None,
                data: chunk,
            }
        } else {
            Fragment {
                frame_type: FrameType::Middle,
                total_size: None,
                data: chunk,
            }
        };
        first = false;
        Some(fragment)
    })
}

/// Incremental frame parser fed with arbitrary transport reads
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read from the transport
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes buffered but not yet consumed as a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete frame, if enough bytes are buffered
    ///
    /// A zero frame size means the stream lost sync; the error is not
    /// recoverable and the caller should stop decoding.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, WireError> {
        if self.buffer.len() < 4 {
            return Ok(None);
        }

        let header = FrameHeader::parse(self.buffer[0], self.buffer[1]);
        let frame_size = u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as usize;
        if frame_size == 0 {
            return Err(WireError::InvalidFrameSize(0));
        }

        let (header_len, total_size) = if header.frame_type == FrameType::First {
            if self.buffer.len() < MAX_FRAME_HEADER_SIZE {
                return Ok(None);
            }
            let total = u32::from_be_bytes([
                self.buffer[4],
                self.buffer[5],
                self.buffer[6],
                self.buffer[7],
            ]);
            (MAX_FRAME_HEADER_SIZE, Some(total))
        } else {
            (4, None)
        };

        if self.buffer.len() < header_len + frame_size {
            return Ok(None);
        }

        let payload = self.buffer[header_len..header_len + frame_size].to_vec();
        self.buffer.drain(..header_len + frame_size);

        Ok(Some(Frame {
            header,
            total_size,
            payload,
        }))
    }
}
