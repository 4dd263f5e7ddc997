//! # Channel Services
//!
//! Every data channel is driven by one [`Service`]. Services never touch the
//! transport: they talk through a [`ServiceContext`] handed to them by the
//! [`ServiceRegistry`] on the session actor.
//!
//! ## Lifecycle
//!
//! ```text
//!  fill_discovery_info ──► start ──► on_message* ──► stop
//!                            │        ▲   │
//!                            │        │   └─ receive re-armed after each message
//!                            └─ pause/resume (any time, idempotent)
//! ```
//!
//! The registry owns the receive loop: it arms the first receive on start
//! and re-arms after every handled message, once the handler's own sends are
//! queued. It also answers channel open requests uniformly and guarantees
//! that `stop` reaches each service exactly once.

use std::collections::HashMap;
use std::time::Duration;

use aa_shared::protocol::control::{ChannelOpenRequest, ChannelOpenResponse, ServiceDiscoveryResponse};
use aa_shared::protocol::sensor::SensorType;
use aa_shared::protocol::{MessageStatus, WireMessage};
use aa_shared::{ChannelId, EncryptionType, Message};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::{Error, Result};
use crate::projection::InputEvent;
use crate::promise::Promise;
use crate::session::{SessionEvent, SessionIo};

pub mod audio_sink;
pub mod bluetooth;
pub mod factory;
pub mod input_source;
pub mod microphone;
pub mod sensor;
pub mod video_sink;
pub mod wifi_projection;

pub use audio_sink::AudioSinkService;
pub use bluetooth::BluetoothService;
pub use factory::{DeviceProvider, ServiceFactory};
pub use input_source::InputSourceService;
pub use microphone::MicrophoneService;
pub use sensor::SensorService;
pub use video_sink::VideoSinkService;
pub use wifi_projection::WifiProjectionService;

/// Work a service wants to do once one of its sends reached the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Followup {
    /// Announce projected video focus after the setup response
    VideoFocusIndication,
    /// Push the first sample of a sensor after its start response
    SensorData(SensorType),
    /// Read the next microphone buffer
    NextCapture,
}

/// Device results routed back to the owning service
#[derive(Debug)]
pub enum DeviceEvent {
    InputStarted(Result<()>),
    Captured(Result<Vec<u8>>),
    Input(InputEvent),
    Tick,
}

/// Handle given to input devices to report events from any thread
#[derive(Debug, Clone)]
pub struct InputEventSink {
    channel: ChannelId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl InputEventSink {
    /// Forward one event; false once the session is gone
    pub fn send(&self, event: InputEvent) -> bool {
        self.tx
            .send(SessionEvent::Device {
                channel: self.channel,
                event: DeviceEvent::Input(event),
            })
            .is_ok()
    }
}

/// Capabilities a service gets while handling a call
pub struct ServiceContext<'a> {
    channel: ChannelId,
    io: &'a mut SessionIo,
}

impl<'a> ServiceContext<'a> {
    pub(crate) fn new(channel: ChannelId, io: &'a mut SessionIo) -> Self {
        Self { channel, io }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Send an encrypted message on this channel
    pub fn send<M: WireMessage>(&mut self, body: &M) -> Result<()> {
        let message = Message::encode(self.channel, EncryptionType::Encrypted, body)?;
        self.io.send(message, None);
        Ok(())
    }

    /// Send, then get `on_send_complete(followup)` once it was written
    pub fn send_then<M: WireMessage>(&mut self, body: &M, followup: Followup) -> Result<()> {
        let message = Message::encode(self.channel, EncryptionType::Encrypted, body)?;
        self.io.send(message, Some(followup));
        Ok(())
    }

    /// Deliver the outcome of a device promise through `on_device_event`
    pub fn watch_device<T, F>(&mut self, promise: Promise<T>, map: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T>) -> DeviceEvent + Send + 'static,
    {
        let channel = self.channel;
        let io = &mut *self.io;
        io.strand.watch(&mut io.tasks, promise, move |result| SessionEvent::Device {
            channel,
            event: map(result),
        });
    }

    /// Get `on_device_event(DeviceEvent::Tick)` after `delay`
    pub fn schedule_tick(&mut self, delay: Duration) -> AbortHandle {
        let event = SessionEvent::Device {
            channel: self.channel,
            event: DeviceEvent::Tick,
        };
        let io = &mut *self.io;
        io.strand.post_after(&mut io.tasks, delay, event)
    }

    pub fn input_sink(&self) -> InputEventSink {
        InputEventSink {
            channel: self.channel,
            tx: self.io.strand.sender(),
        }
    }
}

/// Behavior bound to one channel
pub trait Service: Send {
    fn channel_id(&self) -> ChannelId;

    /// Called once when the session becomes active
    fn start(&mut self, _ctx: &mut ServiceContext<'_>) {}

    /// Release the backing device; called at most once
    fn stop(&mut self) {}

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    /// Append this channel's descriptor, if it should be advertised
    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse);

    /// Open the backing device; a failure status is reported to the phone
    fn on_channel_open(&mut self, request: &ChannelOpenRequest) -> MessageStatus;

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()>;

    fn on_send_complete(&mut self, _ctx: &mut ServiceContext<'_>, _followup: Followup) -> Result<()> {
        Ok(())
    }

    fn on_device_event(&mut self, _ctx: &mut ServiceContext<'_>, _event: DeviceEvent) -> Result<()> {
        Ok(())
    }
}

struct Slot {
    service: Box<dyn Service>,
    started: bool,
    stopped: bool,
}

/// Services of one session in registration order, indexed by channel
#[derive(Default)]
pub struct ServiceRegistry {
    slots: Vec<Slot>,
    index: HashMap<ChannelId, usize>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service; each channel may be bound once
    pub fn register(&mut self, service: Box<dyn Service>) -> Result<()> {
        let channel = service.channel_id();
        if channel == ChannelId::Control || self.index.contains_key(&channel) {
            return Err(Error::Config(format!("channel {} already bound", channel)));
        }
        self.index.insert(channel, self.slots.len());
        self.slots.push(Slot {
            service,
            started: false,
            stopped: false,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Channels in registration order
    pub fn channels(&self) -> Vec<ChannelId> {
        self.slots.iter().map(|slot| slot.service.channel_id()).collect()
    }

    pub fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        for slot in &self.slots {
            slot.service.fill_discovery_info(response);
        }
    }

    pub(crate) fn start_all(&mut self, io: &mut SessionIo) {
        for slot in &mut self.slots {
            if slot.started || slot.stopped {
                continue;
            }
            slot.started = true;
            let channel = slot.service.channel_id();
            info!("[ServiceRegistry] starting {}", channel);
            slot.service.start(&mut ServiceContext::new(channel, io));
            io.receive(channel);
        }
    }

    pub(crate) fn stop_all(&mut self) {
        for slot in &mut self.slots {
            if slot.stopped {
                continue;
            }
            slot.stopped = true;
            info!("[ServiceRegistry] stopping {}", slot.service.channel_id());
            slot.service.stop();
        }
    }

    pub(crate) fn pause_all(&mut self) {
        for slot in self.slots.iter_mut().filter(|slot| !slot.stopped) {
            slot.service.pause();
        }
    }

    pub(crate) fn resume_all(&mut self) {
        for slot in self.slots.iter_mut().filter(|slot| !slot.stopped) {
            slot.service.resume();
        }
    }

    fn active_slot(&mut self, channel: ChannelId) -> Option<&mut Slot> {
        let index = *self.index.get(&channel)?;
        let slot = &mut self.slots[index];
        (slot.started && !slot.stopped).then_some(slot)
    }

    /// Route a received message and re-arm the channel's receive
    pub(crate) fn dispatch_message(
        &mut self,
        io: &mut SessionIo,
        channel: ChannelId,
        message: Message,
    ) -> Result<()> {
        let Some(slot) = self.active_slot(channel) else {
            warn!("[ServiceRegistry] no active service for {}", channel);
            return Ok(());
        };

        let mut ctx = ServiceContext::new(channel, io);
        let result = if message.is::<ChannelOpenRequest>() {
            open_channel(slot.service.as_mut(), &mut ctx, &message)
        } else {
            slot.service.on_message(&mut ctx, message)
        };

        // A handler failure affects only that message
        io.receive(channel);
        result
    }

    pub(crate) fn dispatch_send_complete(
        &mut self,
        io: &mut SessionIo,
        channel: ChannelId,
        followup: Followup,
    ) -> Result<()> {
        match self.active_slot(channel) {
            Some(slot) => slot
                .service
                .on_send_complete(&mut ServiceContext::new(channel, io), followup),
            None => {
                debug!("[ServiceRegistry] dropping {:?} for inactive {}", followup, channel);
                Ok(())
            }
        }
    }

    pub(crate) fn dispatch_device_event(
        &mut self,
        io: &mut SessionIo,
        channel: ChannelId,
        event: DeviceEvent,
    ) -> Result<()> {
        match self.active_slot(channel) {
            Some(slot) => slot
                .service
                .on_device_event(&mut ServiceContext::new(channel, io), event),
            None => {
                debug!("[ServiceRegistry] dropping device event for inactive {}", channel);
                Ok(())
            }
        }
    }
}

fn open_channel(
    service: &mut dyn Service,
    ctx: &mut ServiceContext<'_>,
    message: &Message,
) -> Result<()> {
    let request: ChannelOpenRequest = message.decode()?;
    let status = service.on_channel_open(&request);
    info!(
        "[ServiceRegistry] open {} (priority {}): {:?}",
        ctx.channel(),
        request.priority,
        status
    );
    ctx.send(&ChannelOpenResponse { status })
}

/// Log a malformed or unknown message on a service channel
pub(crate) fn unexpected(channel: ChannelId, message: &Message) {
    warn!(
        "[{}] ignoring message 0x{:04x} ({} bytes)",
        channel,
        message.message_id,
        message.payload.len()
    );
}

/// Map a device open result to a channel open status
pub(crate) fn open_status(channel: ChannelId, result: Result<()>) -> MessageStatus {
    match result {
        Ok(()) => MessageStatus::Success,
        Err(e) => {
            warn!("[{}] device open failed: {}", channel, e);
            MessageStatus::Fail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedService(ChannelId);

    impl Service for NamedService {
        fn channel_id(&self) -> ChannelId {
            self.0
        }
        fn fill_discovery_info(&self, _response: &mut ServiceDiscoveryResponse) {}
        fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
            MessageStatus::Success
        }
        fn on_message(&mut self, _ctx: &mut ServiceContext<'_>, _message: Message) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_register_keeps_order_and_rejects_duplicates() {
        let mut registry = ServiceRegistry::new();
        registry.register(Box::new(NamedService(ChannelId::MediaSinkVideo))).unwrap();
        registry.register(Box::new(NamedService(ChannelId::InputSource))).unwrap();

        assert!(matches!(
            registry.register(Box::new(NamedService(ChannelId::MediaSinkVideo))),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            registry.register(Box::new(NamedService(ChannelId::Control))),
            Err(Error::Config(_))
        ));
        assert_eq!(
            registry.channels(),
            vec![ChannelId::MediaSinkVideo, ChannelId::InputSource]
        );
    }

    #[test]
    fn test_open_status_mapping() {
        assert_eq!(
            open_status(ChannelId::MediaSinkVideo, Ok(())),
            MessageStatus::Success
        );
        assert_eq!(
            open_status(ChannelId::MediaSinkVideo, Err(Error::Device("busy".into()))),
            MessageStatus::Fail
        );
    }
}
