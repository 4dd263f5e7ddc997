//! Scripted phone and recording fakes for session tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aa_headunit::messenger::share_cryptor;
use aa_headunit::projection::AudioOutput;
use aa_headunit::service::{Service, ServiceContext, ServiceRegistry};
use aa_headunit::{
    Configuration, Messenger, Result, Session, SessionEventHandler, SessionHandle, SessionState,
    StreamTransport,
};
use aa_shared::protocol::control::{
    AuthComplete, ChannelConfig, ChannelDescriptor, ChannelOpenRequest, Handshake,
    ServiceDiscoveryRequest, ServiceDiscoveryResponse, VersionRequest, VersionResponse,
    VERSION_STATUS_MATCH,
};
use aa_shared::protocol::input::InputChannel;
use aa_shared::protocol::MessageStatus;
use aa_shared::{
    ChannelId, Cryptor, CryptorError, EncryptionType, HandshakeStatus, Message, WireMessage,
};

const XOR_KEY: u8 = 0x5A;

fn xor(data: &[u8]) -> Vec<u8> {
    data.iter().map(|b| b ^ XOR_KEY).collect()
}

/// Head unit cryptor: two phone handshake messages complete the exchange
#[derive(Default)]
pub struct ScriptedCryptor {
    steps: usize,
    output: Vec<u8>,
    active: bool,
    pub deinits: Arc<AtomicUsize>,
}

impl Cryptor for ScriptedCryptor {
    fn init(&mut self) -> std::result::Result<(), CryptorError> {
        self.steps = 0;
        self.active = false;
        Ok(())
    }

    fn deinit(&mut self) {
        self.active = false;
        self.deinits.fetch_add(1, Ordering::SeqCst);
    }

    fn advance_handshake(
        &mut self,
        input: &[u8],
    ) -> std::result::Result<HandshakeStatus, CryptorError> {
        if input.is_empty() {
            self.output = b"hello".to_vec();
            return Ok(HandshakeStatus::More);
        }
        self.steps += 1;
        if self.steps == 1 {
            self.output = b"key-exchange".to_vec();
            Ok(HandshakeStatus::More)
        } else {
            self.active = true;
            Ok(HandshakeStatus::Done)
        }
    }

    fn pending_handshake_output(&mut self) -> std::result::Result<Vec<u8>, CryptorError> {
        Ok(std::mem::take(&mut self.output))
    }

    fn encrypt(&mut self, plain: &[u8]) -> std::result::Result<Vec<u8>, CryptorError> {
        Ok(xor(plain))
    }

    fn decrypt(&mut self, cipher: &[u8]) -> std::result::Result<Vec<u8>, CryptorError> {
        Ok(xor(cipher))
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Phone side record layer matching [`ScriptedCryptor`]
struct PhoneCryptor;

impl Cryptor for PhoneCryptor {
    fn init(&mut self) -> std::result::Result<(), CryptorError> {
        Ok(())
    }
    fn deinit(&mut self) {}
    fn advance_handshake(
        &mut self,
        _input: &[u8],
    ) -> std::result::Result<HandshakeStatus, CryptorError> {
        Ok(HandshakeStatus::Done)
    }
    fn pending_handshake_output(&mut self) -> std::result::Result<Vec<u8>, CryptorError> {
        Ok(Vec::new())
    }
    fn encrypt(&mut self, plain: &[u8]) -> std::result::Result<Vec<u8>, CryptorError> {
        Ok(xor(plain))
    }
    fn decrypt(&mut self, cipher: &[u8]) -> std::result::Result<Vec<u8>, CryptorError> {
        Ok(xor(cipher))
    }
    fn is_active(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct QuitCounter(AtomicUsize);

impl QuitCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl SessionEventHandler for QuitCounter {
    fn on_quit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Service that only records its lifecycle
pub struct RecordingService {
    channel: ChannelId,
    log: EventLog,
}

impl RecordingService {
    pub fn new(channel: ChannelId, log: EventLog) -> Self {
        Self { channel, log }
    }

    fn record(&self, what: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", what, self.channel.as_u8()));
    }
}

impl Service for RecordingService {
    fn channel_id(&self) -> ChannelId {
        self.channel
    }
    fn start(&mut self, _ctx: &mut ServiceContext<'_>) {
        self.record("start");
    }
    fn stop(&mut self) {
        self.record("stop");
    }
    fn pause(&mut self) {
        self.record("pause");
    }
    fn resume(&mut self) {
        self.record("resume");
    }
    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        response.channels.push(ChannelDescriptor {
            channel_id: self.channel,
            config: ChannelConfig::Input(InputChannel {
                supported_keycodes: Vec::new(),
                touch_screen: None,
            }),
        });
    }
    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        MessageStatus::Success
    }
    fn on_message(&mut self, _ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        self.record(&format!("message-{:04x}", message.message_id));
        Ok(())
    }
}

/// Audio device recording exactly what it was asked to play
#[derive(Clone, Default)]
pub struct RecordingOutput {
    pub written: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl AudioOutput for RecordingOutput {
    fn open(&mut self) -> Result<()> {
        Ok(())
    }
    fn write(&mut self, _timestamp: u64, data: &[u8]) {
        self.written.lock().unwrap().push(data.to_vec());
    }
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn suspend(&mut self) {}
}

/// The far end of the transport
pub struct Phone {
    messenger: Messenger,
}

impl Phone {
    pub async fn recv(&self, channel: ChannelId) -> aa_headunit::Result<Message> {
        self.messenger.enqueue_receive(channel).await
    }

    /// Next message on `channel`, which must carry `M`
    pub async fn expect<M: WireMessage>(&self, channel: ChannelId) -> M {
        let message = self.recv(channel).await.unwrap();
        assert_eq!(
            message.message_id,
            M::ID,
            "unexpected message 0x{:04x} on {}",
            message.message_id,
            channel
        );
        message.decode().unwrap()
    }

    pub async fn send<M: WireMessage>(&self, channel: ChannelId, encryption: EncryptionType, body: &M) {
        let message = Message::encode(channel, encryption, body).unwrap();
        self.messenger.enqueue_send(message).await.unwrap();
    }

    /// Encrypted control message
    pub async fn send_control<M: WireMessage>(&self, body: &M) {
        self.send(ChannelId::Control, EncryptionType::Encrypted, body).await;
    }

    pub fn hang_up(&self) {
        self.messenger.stop();
    }
}

pub struct Fixture {
    pub handle: SessionHandle,
    pub phone: Phone,
    pub quits: Arc<QuitCounter>,
    pub deinits: Arc<AtomicUsize>,
}

/// Start a session over an in-memory pipe
pub fn start_session(registry: ServiceRegistry, config: &Configuration) -> Fixture {
    let (car, phone) = tokio::io::duplex(256 * 1024);

    let cryptor = ScriptedCryptor::default();
    let deinits = cryptor.deinits.clone();
    let quits = Arc::new(QuitCounter::default());

    let (reader, writer) = StreamTransport::split(car);
    let session = Session::new(
        reader,
        writer,
        Box::new(cryptor),
        registry,
        config,
        quits.clone(),
    );
    let handle = session.handle();
    session.start();

    let (reader, writer) = StreamTransport::split(phone);
    let messenger = Messenger::spawn(reader, writer, share_cryptor(Box::new(PhoneCryptor)));

    Fixture {
        handle,
        phone: Phone { messenger },
        quits,
        deinits,
    }
}

pub async fn wait_state(handle: &SessionHandle, state: SessionState) {
    let mut rx = handle.watch_state();
    rx.wait_for(|current| *current == state).await.unwrap();
}

/// Version exchange and the two-step handshake
pub async fn authenticate(fixture: &Fixture) {
    let phone = &fixture.phone;
    let request: VersionRequest = phone.expect(ChannelId::Control).await;
    assert_eq!((request.major, request.minor), (1, 1));

    phone
        .send(
            ChannelId::Control,
            EncryptionType::Plain,
            &VersionResponse {
                major: 1,
                minor: 0,
                status: VERSION_STATUS_MATCH,
            },
        )
        .await;
    let hello: Handshake = phone.expect(ChannelId::Control).await;
    assert_eq!(hello.data, b"hello");

    phone
        .send(
            ChannelId::Control,
            EncryptionType::Plain,
            &Handshake {
                data: b"client-hello".to_vec(),
            },
        )
        .await;
    let exchange: Handshake = phone.expect(ChannelId::Control).await;
    assert_eq!(exchange.data, b"key-exchange");

    phone
        .send(
            ChannelId::Control,
            EncryptionType::Plain,
            &Handshake {
                data: b"finished".to_vec(),
            },
        )
        .await;
    let auth: AuthComplete = phone.expect(ChannelId::Control).await;
    assert_eq!(auth.status, MessageStatus::Success);

    wait_state(&fixture.handle, SessionState::AwaitingServiceDiscoveryRequest).await;
}

/// Authenticate, then run service discovery
pub async fn activate(fixture: &Fixture) -> ServiceDiscoveryResponse {
    authenticate(fixture).await;
    fixture
        .phone
        .send_control(&ServiceDiscoveryRequest {
            device_name: "Pixel".into(),
            device_brand: "Google".into(),
        })
        .await;
    let response: ServiceDiscoveryResponse = fixture.phone.expect(ChannelId::Control).await;
    wait_state(&fixture.handle, SessionState::Active).await;
    response
}

pub fn recording_registry(channels: &[ChannelId], log: &EventLog) -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();
    for &channel in channels {
        registry
            .register(Box::new(RecordingService::new(channel, log.clone())))
            .unwrap();
    }
    registry
}
