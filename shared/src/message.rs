//! Message envelope exchanged between the messenger and the session

use alloc::vec::Vec;

use crate::channel::ChannelId;
use crate::error::WireError;
use crate::frame::{EncryptionType, MessageType};
use crate::protocol::WireMessage;

/// A complete, reassembled protocol message
///
/// `payload` holds the body only; the message id is kept separately and is
/// prepended as a big-endian `u16` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: ChannelId,
    pub encryption: EncryptionType,
    pub message_type: MessageType,
    pub message_id: u16,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(
        channel: ChannelId,
        encryption: EncryptionType,
        message_type: MessageType,
        message_id: u16,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            channel,
            encryption,
            message_type,
            message_id,
            payload,
        }
    }

    /// Build a message carrying a typed body
    pub fn encode<M: WireMessage>(
        channel: ChannelId,
        encryption: EncryptionType,
        body: &M,
    ) -> Result<Self, WireError> {
        Ok(Self::new(
            channel,
            encryption,
            M::MESSAGE_TYPE,
            M::ID,
            body.encode_body()?,
        ))
    }

    /// Split a reassembled wire payload into message id and body
    pub fn from_wire(
        channel: ChannelId,
        encryption: EncryptionType,
        message_type: MessageType,
        data: &[u8],
    ) -> Result<Self, WireError> {
        if data.len() < 2 {
            return Err(WireError::TooShort);
        }
        let message_id = u16::from_be_bytes([data[0], data[1]]);
        Ok(Self::new(
            channel,
            encryption,
            message_type,
            message_id,
            data[2..].to_vec(),
        ))
    }

    /// Wire payload: message id followed by the body
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.payload.len());
        out.extend_from_slice(&self.message_id.to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Whether this message carries the typed body `M`
    pub fn is<M: WireMessage>(&self) -> bool {
        self.message_id == M::ID && self.message_type == M::MESSAGE_TYPE
    }

    /// Decode the body as `M`
    pub fn decode<M: WireMessage>(&self) -> Result<M, WireError> {
        if self.message_id != M::ID {
            return Err(WireError::UnknownMessageId(self.message_id));
        }
        M::decode_body(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::control::{PingRequest, VersionRequest};
    use alloc::vec;

    #[test]
    fn test_wire_layout() {
        let msg = Message::new(
            ChannelId::Control,
            EncryptionType::Plain,
            MessageType::Specific,
            0x0001,
            vec![0, 1, 0, 1],
        );
        assert_eq!(msg.to_wire(), vec![0, 1, 0, 1, 0, 1]);

        let parsed = Message::from_wire(
            ChannelId::Control,
            EncryptionType::Plain,
            MessageType::Specific,
            &msg.to_wire(),
        )
        .unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn test_from_wire_too_short() {
        let result = Message::from_wire(
            ChannelId::Control,
            EncryptionType::Plain,
            MessageType::Specific,
            &[0x01],
        );
        assert_eq!(result, Err(WireError::TooShort));
    }

    #[test]
    fn test_decode_checks_message_id() {
        let msg = Message::encode(
            ChannelId::Control,
            EncryptionType::Plain,
            &VersionRequest::default(),
        )
        .unwrap();
        assert!(msg.is::<VersionRequest>());
        assert!(!msg.is::<PingRequest>());
        assert_eq!(
            msg.decode::<PingRequest>(),
            Err(WireError::UnknownMessageId(VersionRequest::ID))
        );
    }
}
