//! Unit test fixtures: a session I/O bundle wired to an in-memory phone

use aa_shared::{ChannelId, Cryptor, CryptorError, HandshakeStatus, Message, WireMessage};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::messenger::{share_cryptor, Messenger};
use crate::promise::Strand;
use crate::session::{SessionEvent, SessionIo};
use crate::transport::StreamTransport;

/// Identity record layer, active from the start
pub(crate) struct PassthroughCryptor;

impl Cryptor for PassthroughCryptor {
    fn init(&mut self) -> Result<(), CryptorError> {
        Ok(())
    }
    fn deinit(&mut self) {}
    fn advance_handshake(&mut self, _input: &[u8]) -> Result<HandshakeStatus, CryptorError> {
        Ok(HandshakeStatus::Done)
    }
    fn pending_handshake_output(&mut self) -> Result<Vec<u8>, CryptorError> {
        Ok(Vec::new())
    }
    fn encrypt(&mut self, plain: &[u8]) -> Result<Vec<u8>, CryptorError> {
        Ok(plain.to_vec())
    }
    fn decrypt(&mut self, cipher: &[u8]) -> Result<Vec<u8>, CryptorError> {
        Ok(cipher.to_vec())
    }
    fn is_active(&self) -> bool {
        true
    }
}

pub(crate) struct Harness {
    pub io: SessionIo,
    pub mailbox: mpsc::UnboundedReceiver<SessionEvent>,
    /// Far end of the transport, speaking the same framing
    pub phone: Messenger,
}

impl Harness {
    pub fn new() -> Self {
        let (local, remote) = tokio::io::duplex(256 * 1024);
        let (reader, writer) = StreamTransport::split(local);
        let messenger = Messenger::spawn(reader, writer, share_cryptor(Box::new(PassthroughCryptor)));
        let (reader, writer) = StreamTransport::split(remote);
        let phone = Messenger::spawn(reader, writer, share_cryptor(Box::new(PassthroughCryptor)));

        let (strand, mailbox) = Strand::channel();
        Self {
            io: SessionIo {
                messenger,
                strand,
                tasks: JoinSet::new(),
            },
            mailbox,
            phone,
        }
    }

    pub async fn next_event(&mut self) -> SessionEvent {
        self.mailbox.recv().await.unwrap()
    }

    /// Next message the head unit sent on `channel`
    pub async fn sent(&self, channel: ChannelId) -> Message {
        self.phone.enqueue_receive(channel).await.unwrap()
    }

    /// Next message on `channel`, decoded as `M`
    pub async fn sent_as<M: WireMessage>(&self, channel: ChannelId) -> M {
        let message = self.sent(channel).await;
        assert_eq!(message.message_id, M::ID, "unexpected message on {}", channel);
        message.decode().unwrap()
    }
}
