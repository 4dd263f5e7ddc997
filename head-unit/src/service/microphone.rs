//! Microphone source channel
//!
//! The phone opens the microphone with a request; captured buffers are then
//! streamed back one at a time, the next read starting only once the
//! previous buffer was written to the transport.

use aa_shared::protocol::control::{
    ChannelConfig, ChannelDescriptor, ChannelOpenRequest, ServiceDiscoveryResponse,
};
use aa_shared::protocol::media::{
    id, AudioConfig, AvInputChannel, AvStreamType, MediaAck, MediaSetupResponse,
    MediaSetupStatus, MediaWithTimestamp, MicrophoneRequest, MicrophoneResponse,
};
use aa_shared::protocol::MessageStatus;
use aa_shared::{ChannelId, Message};
use log::{debug, info, warn};

use super::{open_status, unexpected, DeviceEvent, Followup, Service, ServiceContext};
use crate::error::{Error, Result};
use crate::projection::AudioInput;
use crate::session::now_micros;

pub struct MicrophoneService {
    format: AudioConfig,
    input: Box<dyn AudioInput>,
    session: i32,
    starting: bool,
    capturing: bool,
}

impl MicrophoneService {
    pub fn new(format: AudioConfig, input: Box<dyn AudioInput>) -> Self {
        Self {
            format,
            input,
            session: 0,
            starting: false,
            capturing: false,
        }
    }

    fn read_next(&mut self, ctx: &mut ServiceContext<'_>) {
        if self.capturing && self.input.is_active() {
            ctx.watch_device(self.input.read(), DeviceEvent::Captured);
        }
    }

    fn respond(&self, ctx: &mut ServiceContext<'_>, status: MessageStatus) -> Result<()> {
        ctx.send(&MicrophoneResponse {
            status,
            session: self.session,
        })
    }
}

impl Service for MicrophoneService {
    fn channel_id(&self) -> ChannelId {
        ChannelId::MediaSourceMicrophone
    }

    fn stop(&mut self) {
        self.starting = false;
        self.capturing = false;
        self.input.stop();
    }

    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        response.channels.push(ChannelDescriptor {
            channel_id: ChannelId::MediaSourceMicrophone,
            config: ChannelConfig::MediaSource(AvInputChannel {
                stream_type: AvStreamType::Audio,
                audio_config: self.format,
            }),
        });
    }

    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        open_status(ChannelId::MediaSourceMicrophone, self.input.open())
    }

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        match message.message_id {
            id::SETUP_REQUEST => ctx.send(&MediaSetupResponse {
                status: MediaSetupStatus::Ready,
                max_unacked: 1,
                configs: vec![0],
            }),
            id::MICROPHONE_REQUEST => {
                let request: MicrophoneRequest = message.decode()?;
                if request.open && self.starting {
                    debug!("[Microphone] open while starting session {}", self.session);
                    Ok(())
                } else if request.open && self.capturing {
                    debug!("[Microphone] already capturing session {}", self.session);
                    self.respond(ctx, MessageStatus::Success)
                } else if request.open {
                    self.session += 1;
                    self.starting = true;
                    info!("[Microphone] open, session {}", self.session);
                    ctx.watch_device(self.input.start(), DeviceEvent::InputStarted);
                    Ok(())
                } else {
                    info!("[Microphone] close");
                    self.starting = false;
                    self.capturing = false;
                    self.input.stop();
                    self.respond(ctx, MessageStatus::Success)
                }
            }
            id::MEDIA_ACK => {
                let ack: MediaAck = message.decode()?;
                debug!("[Microphone] ack {} for session {}", ack.value, ack.session);
                Ok(())
            }
            _ => {
                unexpected(ChannelId::MediaSourceMicrophone, &message);
                Ok(())
            }
        }
    }

    fn on_send_complete(&mut self, ctx: &mut ServiceContext<'_>, followup: Followup) -> Result<()> {
        if followup == Followup::NextCapture {
            self.read_next(ctx);
        }
        Ok(())
    }

    fn on_device_event(&mut self, ctx: &mut ServiceContext<'_>, event: DeviceEvent) -> Result<()> {
        match event {
            DeviceEvent::InputStarted(_) if !self.starting => {
                debug!("[Microphone] closed before capture started");
                self.input.stop();
                Ok(())
            }
            DeviceEvent::InputStarted(Ok(())) => {
                self.starting = false;
                self.capturing = true;
                self.respond(ctx, MessageStatus::Success)?;
                self.read_next(ctx);
                Ok(())
            }
            DeviceEvent::InputStarted(Err(e)) => {
                self.starting = false;
                warn!("[Microphone] capture start failed: {}", e);
                self.respond(ctx, MessageStatus::InternalError)
            }
            DeviceEvent::Captured(Ok(data)) if self.capturing => ctx.send_then(
                &MediaWithTimestamp {
                    timestamp: now_micros(),
                    data,
                },
                Followup::NextCapture,
            ),
            DeviceEvent::Captured(Ok(_)) => Ok(()),
            DeviceEvent::Captured(Err(Error::Aborted)) => Ok(()),
            DeviceEvent::Captured(Err(e)) => {
                warn!("[Microphone] capture failed: {}", e);
                self.capturing = false;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
