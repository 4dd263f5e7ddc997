//! # Message Reassembly
//!
//! Frames of different channels may interleave on the wire, but on a single
//! channel a message must be complete before the next one starts. The
//! assembler keeps one partial message per channel.
//!
//! ```text
//! ch 3: FIRST ─────── MIDDLE ─────────────── LAST ──► Message(ch 3)
//! ch 0:        BULK ──────────► Message(ch 0)
//! ch 4:                  FIRST ── LAST ──► Message(ch 4)
//! ```
//!
//! A violation (continuation without FIRST, new message before LAST, size
//! mismatch) resets that channel only and is reported to the caller.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::channel::ChannelId;
use crate::error::WireError;
use crate::frame::{EncryptionType, FrameHeader, FrameType, MessageType};
use crate::message::Message;
use crate::MAX_FRAME_PAYLOAD;

/// Upper bound for the up-front reservation of a partial message
const MAX_RESERVE: usize = MAX_FRAME_PAYLOAD * 4;

#[derive(Debug)]
struct PartialMessage {
    encryption: EncryptionType,
    message_type: MessageType,
    expected: usize,
    data: Vec<u8>,
}

/// Per-channel fragment accumulator
#[derive(Debug, Default)]
pub struct MessageAssembler {
    partial: BTreeMap<ChannelId, PartialMessage>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a message is being reassembled on `channel`
    pub fn is_in_progress(&self, channel: ChannelId) -> bool {
        self.partial.contains_key(&channel)
    }

    /// Feed one (already decrypted) frame payload
    ///
    /// Returns `Ok(Some(message))` when the frame completes a message and
    /// `Ok(None)` while more fragments are needed.
    pub fn push(
        &mut self,
        channel: ChannelId,
        header: &FrameHeader,
        total_size: Option<u32>,
        payload: &[u8],
    ) -> Result<Option<Message>, WireError> {
        match header.frame_type {
            FrameType::Bulk => {
                if self.partial.remove(&channel).is_some() {
                    return Err(WireError::InterleavedMessage);
                }
                Message::from_wire(channel, header.encryption, header.message_type, payload)
                    .map(Some)
            }
            FrameType::First => {
                if self.partial.remove(&channel).is_some() {
                    return Err(WireError::InterleavedMessage);
                }
                let expected = total_size.map(|t| t as usize).unwrap_or(payload.len());
                let mut data = Vec::with_capacity(expected.min(MAX_RESERVE));
                data.extend_from_slice(payload);
                self.partial.insert(
                    channel,
                    PartialMessage {
                        encryption: header.encryption,
                        message_type: header.message_type,
                        expected,
                        data,
                    },
                );
                Ok(None)
            }
            FrameType::Middle => {
                let partial = self
                    .partial
                    .get_mut(&channel)
                    .ok_or(WireError::UnexpectedContinuation)?;
                partial.data.extend_from_slice(payload);
                if partial.data.len() > partial.expected {
                    let expected = partial.expected;
                    let actual = partial.data.len();
                    self.partial.remove(&channel);
                    return Err(WireError::SizeMismatch { expected, actual });
                }
                Ok(None)
            }
            FrameType::Last => {
                let mut partial = self
                    .partial
                    .remove(&channel)
                    .ok_or(WireError::UnexpectedContinuation)?;
                partial.data.extend_from_slice(payload);
                if partial.data.len() != partial.expected {
                    return Err(WireError::SizeMismatch {
                        expected: partial.expected,
                        actual: partial.data.len(),
                    });
                }
                Message::from_wire(
                    channel,
                    partial.encryption,
                    partial.message_type,
                    &partial.data,
                )
                .map(Some)
            }
        }
    }

    /// Drop the partial message of one channel
    pub fn discard(&mut self, channel: ChannelId) {
        self.partial.remove(&channel);
    }

    /// Drop every partial message
    pub fn reset(&mut self) {
        self.partial.clear();
    }
}
