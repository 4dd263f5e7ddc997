//! PCM playback channels: media, guidance, system and telephony audio

use aa_shared::protocol::control::{
    ChannelConfig, ChannelDescriptor, ChannelOpenRequest, ServiceDiscoveryResponse,
};
use aa_shared::protocol::media::{
    id, AudioConfig, AudioType, AvChannel, AvStreamType, MediaAck, MediaIndication,
    MediaSetupRequest, MediaSetupResponse, MediaSetupStatus, MediaStartIndication,
    MediaWithTimestamp,
};
use aa_shared::protocol::MessageStatus;
use aa_shared::{ChannelId, Message};
use log::{debug, info, warn};

use super::{open_status, unexpected, Service, ServiceContext};
use crate::error::Result;
use crate::projection::AudioOutput;

pub struct AudioSinkService {
    channel: ChannelId,
    format: AudioConfig,
    output: Box<dyn AudioOutput>,
    /// Media session bound by the last start indication
    session: Option<i32>,
    ack_count: u32,
}

impl AudioSinkService {
    pub fn new(channel: ChannelId, format: AudioConfig, output: Box<dyn AudioOutput>) -> Self {
        Self {
            channel,
            format,
            output,
            session: None,
            ack_count: 0,
        }
    }

    fn audio_type(&self) -> AudioType {
        match self.channel {
            ChannelId::MediaSinkGuidanceAudio => AudioType::Guidance,
            ChannelId::MediaSinkSystemAudio => AudioType::System,
            ChannelId::MediaSinkTelephonyAudio => AudioType::Telephony,
            _ => AudioType::Media,
        }
    }

    fn on_media(&mut self, ctx: &mut ServiceContext<'_>, timestamp: u64, data: &[u8]) -> Result<()> {
        let Some(session) = self.session else {
            warn!("[{}] dropping {} bytes outside a media session", self.channel, data.len());
            return Ok(());
        };
        self.output.write(timestamp, data);
        self.ack_count += 1;
        ctx.send(&MediaAck {
            session,
            value: self.ack_count,
        })
    }
}

impl Service for AudioSinkService {
    fn channel_id(&self) -> ChannelId {
        self.channel
    }

    fn stop(&mut self) {
        self.session = None;
        self.output.stop();
    }

    fn pause(&mut self) {
        if self.session.is_some() {
            self.output.suspend();
        }
    }

    fn resume(&mut self) {
        if self.session.is_some() {
            self.output.start();
        }
    }

    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        response.channels.push(ChannelDescriptor {
            channel_id: self.channel,
            config: ChannelConfig::MediaSink(AvChannel {
                stream_type: AvStreamType::Audio,
                audio_type: Some(self.audio_type()),
                audio_configs: vec![self.format],
                video_configs: Vec::new(),
                available_while_in_call: true,
            }),
        });
    }

    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        open_status(self.channel, self.output.open())
    }

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        match message.message_id {
            id::SETUP_REQUEST => {
                let request: MediaSetupRequest = message.decode()?;
                debug!("[{}] setup, config index {}", self.channel, request.config_index);
                ctx.send(&MediaSetupResponse {
                    status: MediaSetupStatus::Ready,
                    max_unacked: 1,
                    configs: vec![0],
                })
            }
            id::START_INDICATION => {
                let start: MediaStartIndication = message.decode()?;
                info!("[{}] start, session {}", self.channel, start.session);
                self.session = Some(start.session);
                self.ack_count = 0;
                self.output.start();
                Ok(())
            }
            id::STOP_INDICATION => {
                info!("[{}] stop", self.channel);
                self.session = None;
                self.output.suspend();
                Ok(())
            }
            id::MEDIA_WITH_TIMESTAMP => {
                let media: MediaWithTimestamp = message.decode()?;
                self.on_media(ctx, media.timestamp, &media.data)
            }
            id::MEDIA_INDICATION => {
                let media: MediaIndication = message.decode()?;
                self.on_media(ctx, 0, &media.data)
            }
            _ => {
                unexpected(self.channel, &message);
                Ok(())
            }
        }
    }
}
