//! # Session Engine
//!
//! One actor task per connection owns the control channel state machine,
//! the service registry and the keepalive watchdog. Every input (received
//! messages, send completions, timers, device results and host commands)
//! arrives as a [`SessionEvent`] in one mailbox, so exactly one state
//! mutation is in flight at a time.
//!
//! ```text
//!  Init ──start──► AwaitingVersionResponse ──compatible──► Handshaking
//!                        │ incompatible                        │ Done
//!                        ▼                                     ▼
//!                    Quitting ◄──bye-bye── Active ◄──── AwaitingServiceDiscoveryRequest
//!                        │                   │ discovery response sent
//!                        ▼                   │
//!                   Terminated ◄─────────────┘ channel error / ping timeout / stop()
//! ```
//!
//! Triggers that are not valid for the current state are logged and
//! ignored; the control receive is re-armed and the state is unchanged.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use aa_shared::protocol::control::{
    id, AudioFocusNotification, AudioFocusRequest, AudioFocusState, AudioFocusType, AuthComplete,
    BatteryStatusNotification, ByeByeRequest, ByeByeResponse, Handshake, NavFocusNotification,
    NavFocusRequest, NavFocusType, PingRequest, PingResponse, ServiceDiscoveryRequest,
    ShutdownReason, VersionRequest, VersionResponse, VoiceSessionNotification,
};
use aa_shared::protocol::MessageStatus;
use aa_shared::{
    ChannelId, Cryptor, EncryptionType, HandshakeStatus, Message, TransportReader,
    TransportWriter, WireMessage,
};
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::messenger::{lock, share_cryptor, Messenger, SharedCryptor};
use crate::pinger::Pinger;
use crate::promise::{self, Promise, Resolver, Strand};
use crate::service::{DeviceEvent, Followup, ServiceRegistry};

/// Control channel phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Init,
    AwaitingVersionResponse,
    Handshaking,
    AwaitingServiceDiscoveryRequest,
    Active,
    Quitting,
    Terminated,
}

/// Observer of session termination
pub trait SessionEventHandler: Send + Sync {
    /// The session ended on its own (phone bye-bye, channel error, ping timeout)
    fn on_quit(&self);
}

#[derive(Debug)]
pub(crate) enum SessionCommand {
    Stop(Resolver<()>),
    Pause,
    Resume,
    Shutdown(ShutdownReason),
}

#[derive(Debug)]
pub(crate) enum SessionEvent {
    Command(SessionCommand),
    Received {
        channel: ChannelId,
        result: Result<Message>,
    },
    SendCompleted {
        channel: ChannelId,
        followup: Followup,
    },
    SendFailed {
        channel: ChannelId,
        error: Error,
    },
    ByeByeSent(Result<()>),
    PingTimer(u64),
    PingOutcome(Result<()>),
    Device {
        channel: ChannelId,
        event: DeviceEvent,
    },
}

/// Messenger access bound to the session mailbox
pub(crate) struct SessionIo {
    pub(crate) messenger: Messenger,
    pub(crate) strand: Strand<SessionEvent>,
    /// Watchers and timers; aborting the set cancels every continuation
    pub(crate) tasks: JoinSet<()>,
}

impl SessionIo {
    /// Deliver the next message on `channel` as a `Received` event
    pub(crate) fn receive(&mut self, channel: ChannelId) {
        let promise = self.messenger.enqueue_receive(channel);
        self.strand
            .watch(&mut self.tasks, promise, move |result| SessionEvent::Received {
                channel,
                result,
            });
    }

    /// Queue a send; completion is reported only when a followup is attached
    pub(crate) fn send(&mut self, message: Message, followup: Option<Followup>) {
        let channel = message.channel;
        let promise = self.messenger.enqueue_send(message);
        self.strand
            .watch_filtered(&mut self.tasks, promise, move |result| match result {
                Ok(()) => followup.map(|followup| SessionEvent::SendCompleted { channel, followup }),
                Err(error) => Some(SessionEvent::SendFailed { channel, error }),
            });
    }
}

/// Microseconds since the unix epoch
pub(crate) fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Host side handle of a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Wait until the session reached `Terminated`
    pub async fn terminated(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|state| *state == SessionState::Terminated).await;
    }

    /// Tear the session down without notifying the quit handler
    ///
    /// Resolves once services, watchdog, messenger and cryptor are stopped.
    /// Stopping a session that already ended resolves immediately.
    pub fn stop(&self) -> Promise<()> {
        let (resolver, promise) = promise::pair();
        match self.tx.send(SessionEvent::Command(SessionCommand::Stop(resolver))) {
            Ok(()) => promise,
            Err(_) => Promise::resolved(()),
        }
    }

    pub fn pause(&self) {
        let _ = self.tx.send(SessionEvent::Command(SessionCommand::Pause));
    }

    pub fn resume(&self) {
        let _ = self.tx.send(SessionEvent::Command(SessionCommand::Resume));
    }

    /// Say bye-bye to the phone and end the session once it answers
    pub fn shutdown(&self, reason: ShutdownReason) {
        let _ = self
            .tx
            .send(SessionEvent::Command(SessionCommand::Shutdown(reason)));
    }
}

pub struct Session {
    config: Configuration,
    cryptor: SharedCryptor,
    io: SessionIo,
    mailbox: mpsc::UnboundedReceiver<SessionEvent>,
    registry: ServiceRegistry,
    pinger: Pinger,
    handler: Arc<dyn SessionEventHandler>,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    torn_down: bool,
}

impl Session {
    /// Wire a session to its transport; must be called within a tokio runtime
    pub fn new<R, W>(
        reader: R,
        writer: W,
        cryptor: Box<dyn Cryptor>,
        registry: ServiceRegistry,
        config: &Configuration,
        handler: Arc<dyn SessionEventHandler>,
    ) -> Self
    where
        R: TransportReader,
        W: TransportWriter,
    {
        let cryptor = share_cryptor(cryptor);
        let messenger = Messenger::spawn(reader, writer, cryptor.clone());
        let (strand, mailbox) = Strand::channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Init);

        Self {
            config: config.clone(),
            cryptor,
            io: SessionIo {
                messenger,
                strand,
                tasks: JoinSet::new(),
            },
            mailbox,
            registry,
            pinger: Pinger::new(config.ping.interval(), config.ping.max_outstanding),
            handler,
            state: SessionState::Init,
            state_tx,
            state_rx,
            torn_down: false,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            tx: self.io.strand.sender(),
            state: self.state_rx.clone(),
        }
    }

    /// Spawn the actor and begin version negotiation
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        self.on_start();

        while !self.torn_down {
            tokio::select! {
                event = self.mailbox.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(joined) = self.io.tasks.join_next(), if !self.io.tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("[Session] continuation panicked: {}", e);
                        }
                    }
                }
            }
        }

        // Late stop requests still resolve
        self.mailbox.close();
        while let Ok(event) = self.mailbox.try_recv() {
            if let SessionEvent::Command(SessionCommand::Stop(resolver)) = event {
                resolver.resolve(());
            }
        }
        debug!("[Session] actor finished");
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!("[Session] {:?} -> {:?}", self.state, state);
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Command(command) => self.on_command(command),
            SessionEvent::Received { channel, result } => self.on_received(channel, result),
            SessionEvent::SendCompleted { channel, followup } => {
                if let Err(e) = self
                    .registry
                    .dispatch_send_complete(&mut self.io, channel, followup)
                {
                    warn!("[Session] {} followup failed: {}", channel, e);
                }
            }
            SessionEvent::SendFailed { channel, error } => self.on_send_failed(channel, error),
            SessionEvent::ByeByeSent(result) => {
                if let Err(e) = result {
                    warn!("[Session] bye-bye response not sent: {}", e);
                }
                self.quit();
            }
            SessionEvent::PingTimer(generation) => self.pinger.on_timer(generation),
            SessionEvent::PingOutcome(result) => self.on_ping_outcome(result),
            SessionEvent::Device { channel, event } => {
                if let Err(e) = self
                    .registry
                    .dispatch_device_event(&mut self.io, channel, event)
                {
                    warn!("[Session] {} device event failed: {}", channel, e);
                }
            }
        }
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Stop(resolver) => {
                info!("[Session] stop requested in {:?}", self.state);
                self.teardown();
                resolver.resolve(());
            }
            SessionCommand::Pause => self.registry.pause_all(),
            SessionCommand::Resume => self.registry.resume_all(),
            SessionCommand::Shutdown(reason) => self.on_shutdown(reason),
        }
    }

    fn on_shutdown(&mut self, reason: ShutdownReason) {
        if self.state != SessionState::Active {
            info!("[Session] shutdown ({:?}) in {:?}, quitting", reason, self.state);
            self.quit();
            return;
        }

        info!("[Session] saying bye-bye ({:?})", reason);
        self.set_state(SessionState::Quitting);
        if let Err(e) = self.send_control(&ByeByeRequest { reason }, EncryptionType::Encrypted) {
            error!("[Session] bye-bye request failed: {}", e);
            self.quit();
        }
    }

    fn on_received(&mut self, channel: ChannelId, result: Result<Message>) {
        match result {
            Ok(message) if channel == ChannelId::Control => {
                if let Err(e) = self.on_control_message(message) {
                    error!("[Session] control channel failed: {}", e);
                    self.quit();
                }
            }
            Ok(message) => {
                if let Err(e) = self.registry.dispatch_message(&mut self.io, channel, message) {
                    warn!("[Session] {} message failed: {}", channel, e);
                }
            }
            Err(Error::Aborted) => debug!("[Session] receive on {} aborted", channel),
            Err(e) => {
                error!("[Session] receive on {} failed: {}", channel, e);
                self.quit();
            }
        }
    }

    fn on_send_failed(&mut self, channel: ChannelId, error: Error) {
        match error {
            Error::Aborted => {}
            error if channel == ChannelId::Control => {
                error!("[Session] control send failed: {}", error);
                self.quit();
            }
            error => warn!("[Session] send on {} failed: {}", channel, error),
        }
    }

    fn on_start(&mut self) {
        info!("[Session] starting");
        let init = lock(&self.cryptor).init();
        if let Err(e) = init {
            error!("[Session] cryptor init failed: {}", e);
            self.quit();
            return;
        }

        self.set_state(SessionState::AwaitingVersionResponse);
        match self.send_control(&VersionRequest::default(), EncryptionType::Plain) {
            Ok(()) => self.receive_control(),
            Err(e) => {
                error!("[Session] version request failed: {}", e);
                self.quit();
            }
        }
    }

    fn send_control<M: WireMessage>(&mut self, body: &M, encryption: EncryptionType) -> Result<()> {
        let message = Message::encode(ChannelId::Control, encryption, body)?;
        self.io.send(message, None);
        Ok(())
    }

    fn receive_control(&mut self) {
        self.io.receive(ChannelId::Control);
    }

    fn on_control_message(&mut self, message: Message) -> Result<()> {
        match self.state {
            SessionState::AwaitingVersionResponse if message.is::<VersionResponse>() => {
                self.on_version_response(message.decode()?)
            }
            SessionState::Handshaking if message.is::<Handshake>() => {
                self.on_handshake(message.decode()?)
            }
            SessionState::AwaitingServiceDiscoveryRequest
                if message.is::<ServiceDiscoveryRequest>() =>
            {
                self.on_discovery_request(message.decode()?)
            }
            SessionState::Active => self.on_active_message(message),
            SessionState::Quitting if message.is::<ByeByeRequest>() => {
                self.on_byebye_request(message.decode()?)
            }
            SessionState::Quitting if message.is::<ByeByeResponse>() => {
                info!("[Session] phone acknowledged bye-bye");
                self.quit();
                Ok(())
            }
            state => {
                warn!(
                    "[Session] ignoring control message 0x{:04x} in {:?}",
                    message.message_id, state
                );
                self.receive_control();
                Ok(())
            }
        }
    }

    fn on_version_response(&mut self, response: VersionResponse) -> Result<()> {
        info!(
            "[Session] phone protocol {}.{} (status 0x{:04x})",
            response.major, response.minor, response.status
        );
        if !response.is_compatible() {
            error!("[Session] no compatible protocol version");
            self.set_state(SessionState::Quitting);
            self.quit();
            return Ok(());
        }

        self.set_state(SessionState::Handshaking);
        let status = lock(&self.cryptor).advance_handshake(&[])?;
        self.after_handshake_step(status)
    }

    fn on_handshake(&mut self, handshake: Handshake) -> Result<()> {
        debug!("[Session] handshake step ({} bytes)", handshake.data.len());
        let status = lock(&self.cryptor).advance_handshake(&handshake.data)?;
        self.after_handshake_step(status)
    }

    fn after_handshake_step(&mut self, status: HandshakeStatus) -> Result<()> {
        let output = lock(&self.cryptor).pending_handshake_output()?;
        match status {
            HandshakeStatus::More => {
                self.send_control(&Handshake { data: output }, EncryptionType::Plain)?;
            }
            HandshakeStatus::Done => {
                if !output.is_empty() {
                    self.send_control(&Handshake { data: output }, EncryptionType::Plain)?;
                }
                info!("[Session] handshake complete");
                self.send_control(
                    &AuthComplete {
                        status: MessageStatus::Success,
                    },
                    EncryptionType::Plain,
                )?;
                self.set_state(SessionState::AwaitingServiceDiscoveryRequest);
            }
        }
        self.receive_control();
        Ok(())
    }

    fn on_discovery_request(&mut self, request: ServiceDiscoveryRequest) -> Result<()> {
        info!(
            "[Session] discovery request from {} ({})",
            request.device_name, request.device_brand
        );
        let mut response = self.config.head_unit.discovery_response();
        self.registry.fill_discovery_info(&mut response);
        debug!("[Session] advertising {} channels", response.channels.len());
        self.send_control(&response, EncryptionType::Encrypted)?;

        self.registry.start_all(&mut self.io);
        self.set_state(SessionState::Active);
        self.schedule_ping();
        self.receive_control();
        Ok(())
    }

    fn on_active_message(&mut self, message: Message) -> Result<()> {
        match message.message_id {
            id::AUDIO_FOCUS_REQUEST => {
                let request: AudioFocusRequest = message.decode()?;
                let focus_state = match request.focus_type {
                    AudioFocusType::Release => AudioFocusState::Loss,
                    _ => AudioFocusState::Gain,
                };
                info!("[Session] audio focus {:?} -> {:?}", request.focus_type, focus_state);
                self.send_control(
                    &AudioFocusNotification {
                        focus_state,
                        unsolicited: false,
                    },
                    EncryptionType::Encrypted,
                )?;
            }
            id::NAV_FOCUS_REQUEST => {
                let request: NavFocusRequest = message.decode()?;
                info!("[Session] navigation focus {:?}", request.focus_type);
                self.send_control(
                    &NavFocusNotification {
                        focus_type: NavFocusType::Projected,
                    },
                    EncryptionType::Encrypted,
                )?;
            }
            id::VOICE_SESSION_NOTIFICATION => {
                let notification: VoiceSessionNotification = message.decode()?;
                info!("[Session] voice session {:?}", notification.status);
            }
            id::BATTERY_STATUS_NOTIFICATION => {
                let battery: BatteryStatusNotification = message.decode()?;
                info!(
                    "[Session] phone battery {}%{}",
                    battery.battery_level,
                    if battery.critical_battery { " (critical)" } else { "" }
                );
            }
            id::PING_REQUEST => {
                let ping: PingRequest = message.decode()?;
                self.send_control(
                    &PingResponse {
                        timestamp: ping.timestamp,
                    },
                    EncryptionType::Encrypted,
                )?;
            }
            id::PING_RESPONSE => {
                debug!("[Session] pong");
                self.pinger.pong();
            }
            id::BYEBYE_REQUEST => return self.on_byebye_request(message.decode()?),
            id::BYEBYE_RESPONSE => {
                info!("[Session] bye-bye response without request");
                self.quit();
                return Ok(());
            }
            other => warn!("[Session] ignoring control message 0x{:04x} while active", other),
        }
        self.receive_control();
        Ok(())
    }

    fn on_byebye_request(&mut self, request: ByeByeRequest) -> Result<()> {
        info!("[Session] phone said bye-bye ({:?})", request.reason);
        self.set_state(SessionState::Quitting);
        let message = Message::encode(ChannelId::Control, EncryptionType::Encrypted, &ByeByeResponse)?;
        let promise = self.io.messenger.enqueue_send(message);
        self.io
            .strand
            .watch(&mut self.io.tasks, promise, SessionEvent::ByeByeSent);
        Ok(())
    }

    fn schedule_ping(&mut self) {
        let promise = self
            .pinger
            .ping(&self.io.strand, &mut self.io.tasks, SessionEvent::PingTimer);
        self.io
            .strand
            .watch(&mut self.io.tasks, promise, SessionEvent::PingOutcome);
    }

    fn on_ping_outcome(&mut self, result: Result<()>) {
        match result {
            Ok(()) => {
                let timestamp = i64::try_from(now_micros()).unwrap_or(i64::MAX);
                if let Err(e) = self.send_control(&PingRequest { timestamp }, EncryptionType::Encrypted) {
                    error!("[Session] ping request failed: {}", e);
                    self.quit();
                    return;
                }
                self.schedule_ping();
            }
            Err(Error::Aborted) | Err(Error::OperationInProgress) => {
                debug!("[Session] ping superseded");
            }
            Err(e) => {
                error!("[Session] keepalive failed: {}", e);
                self.quit();
            }
        }
    }

    /// End the session on its own initiative; notifies the handler once
    fn quit(&mut self) {
        if self.torn_down {
            return;
        }
        self.teardown();
        self.handler.on_quit();
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.registry.stop_all();
        self.pinger.cancel();
        self.io.tasks.abort_all();
        self.io.messenger.stop();
        lock(&self.cryptor).deinit();
        self.set_state(SessionState::Terminated);
    }
}
