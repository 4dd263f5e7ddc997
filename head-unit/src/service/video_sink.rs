//! H.264 projection channel

use aa_shared::protocol::control::{
    ChannelConfig, ChannelDescriptor, ChannelOpenRequest, ServiceDiscoveryResponse,
};
use aa_shared::protocol::media::{
    id, AvChannel, AvStreamType, MediaAck, MediaIndication, MediaSetupResponse, MediaSetupStatus,
    MediaStartIndication, MediaWithTimestamp, VideoConfig, VideoFocusMode, VideoFocusNotification,
    VideoFocusRequest,
};
use aa_shared::protocol::MessageStatus;
use aa_shared::{ChannelId, Message};
use log::{info, warn};

use super::{open_status, unexpected, Followup, Service, ServiceContext};
use crate::error::Result;
use crate::projection::VideoOutput;

pub struct VideoSinkService {
    config: VideoConfig,
    output: Box<dyn VideoOutput>,
    session: Option<i32>,
    ack_count: u32,
}

impl VideoSinkService {
    pub fn new(config: VideoConfig, output: Box<dyn VideoOutput>) -> Self {
        Self {
            config,
            output,
            session: None,
            ack_count: 0,
        }
    }

    fn on_media(&mut self, ctx: &mut ServiceContext<'_>, timestamp: u64, data: &[u8]) -> Result<()> {
        let Some(session) = self.session else {
            warn!("[Video] dropping {} bytes outside a media session", data.len());
            return Ok(());
        };
        self.output.write(timestamp, data);
        self.ack_count += 1;
        ctx.send(&MediaAck {
            session,
            value: self.ack_count,
        })
    }

    fn send_focus(ctx: &mut ServiceContext<'_>, unsolicited: bool) -> Result<()> {
        ctx.send(&VideoFocusNotification {
            focus_mode: VideoFocusMode::Projected,
            unsolicited,
        })
    }
}

impl Service for VideoSinkService {
    fn channel_id(&self) -> ChannelId {
        ChannelId::MediaSinkVideo
    }

    fn stop(&mut self) {
        self.session = None;
        self.output.stop();
    }

    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        response.channels.push(ChannelDescriptor {
            channel_id: ChannelId::MediaSinkVideo,
            config: ChannelConfig::MediaSink(AvChannel {
                stream_type: AvStreamType::Video,
                audio_type: None,
                audio_configs: Vec::new(),
                video_configs: vec![self.config],
                available_while_in_call: true,
            }),
        });
    }

    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        open_status(ChannelId::MediaSinkVideo, self.output.open())
    }

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        match message.message_id {
            id::SETUP_REQUEST => {
                let status = match self.output.init() {
                    Ok(()) => MediaSetupStatus::Ready,
                    Err(e) => {
                        warn!("[Video] decoder init failed: {}", e);
                        MediaSetupStatus::Wait
                    }
                };
                info!("[Video] setup: {:?}", status);
                ctx.send_then(
                    &MediaSetupResponse {
                        status,
                        max_unacked: 1,
                        configs: vec![0],
                    },
                    Followup::VideoFocusIndication,
                )
            }
            id::START_INDICATION => {
                let start: MediaStartIndication = message.decode()?;
                info!("[Video] start, session {}", start.session);
                self.session = Some(start.session);
                self.ack_count = 0;
                Ok(())
            }
            id::STOP_INDICATION => {
                info!("[Video] stop");
                self.session = None;
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
            id::VIDEO_FOCUS_REQUEST => {
                let request: VideoFocusRequest = message.decode()?;
                if request.focus_mode == VideoFocusMode::Native {
                    info!("[Video] phone asked to return to head unit UI ({:?})", request.reason);
                }
                Self::send_focus(ctx, false)
            }
            _ => {
                unexpected(ChannelId::MediaSinkVideo, &message);
                Ok(())
            }
        }
    }

    fn on_send_complete(&mut self, ctx: &mut ServiceContext<'_>, followup: Followup) -> Result<()> {
        match followup {
            Followup::VideoFocusIndication => Self::send_focus(ctx, false),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use aa_shared::protocol::media::{MediaSetupRequest, VideoFocusReason, VideoFps, VideoResolution};
    use aa_shared::{EncryptionType, WireMessage};

    use super::*;
    use crate::error::Error;
    use crate::session::SessionEvent;
    use crate::testing::Harness;

    #[derive(Default)]
    struct Decoder {
        frames: Vec<Vec<u8>>,
        init_fails: bool,
    }

    struct FakeVideo(Arc<Mutex<Decoder>>);

    impl VideoOutput for FakeVideo {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }
        fn init(&mut self) -> Result<()> {
            if self.0.lock().unwrap().init_fails {
                return Err(Error::Device("surface not ready".into()));
            }
            Ok(())
        }
        fn write(&mut self, _timestamp: u64, data: &[u8]) {
            self.0.lock().unwrap().frames.push(data.to_vec());
        }
        fn stop(&mut self) {}
    }

    fn video(init_fails: bool) -> (VideoSinkService, Arc<Mutex<Decoder>>) {
        let decoder = Arc::new(Mutex::new(Decoder {
            init_fails,
            ..Decoder::default()
        }));
        let config = VideoConfig {
            resolution: VideoResolution::P720,
            fps: VideoFps::Fps30,
            margin_width: 0,
            margin_height: 0,
            dpi: 160,
        };
        (VideoSinkService::new(config, Box::new(FakeVideo(decoder.clone()))), decoder)
    }

    fn message<M: WireMessage>(body: &M) -> Message {
        Message::encode(ChannelId::MediaSinkVideo, EncryptionType::Encrypted, body).unwrap()
    }

    #[test]
    fn test_discovery_advertises_video_config() {
        let (service, _) = video(false);
        let mut response = ServiceDiscoveryResponse::default();
        service.fill_discovery_info(&mut response);

        let ChannelConfig::MediaSink(av) = &response.channels[0].config else {
            panic!("expected a media sink descriptor");
        };
        assert_eq!(av.stream_type, AvStreamType::Video);
        assert_eq!(av.video_configs[0].resolution, VideoResolution::P720);
        assert_eq!(av.video_configs[0].dpi, 160);
    }

    #[tokio::test]
    async fn test_setup_then_focus_after_send() {
        let mut harness = Harness::new();
        let (mut service, _) = video(false);

        let mut ctx = ServiceContext::new(ChannelId::MediaSinkVideo, &mut harness.io);
        service
            .on_message(&mut ctx, message(&MediaSetupRequest { config_index: 0 }))
            .unwrap();

        let followup = match harness.next_event().await {
            SessionEvent::SendCompleted { channel, followup } => {
                assert_eq!(channel, ChannelId::MediaSinkVideo);
                followup
            }
            other => panic!("unexpected event {:?}", other),
        };
        let mut ctx = ServiceContext::new(ChannelId::MediaSinkVideo, &mut harness.io);
        service.on_send_complete(&mut ctx, followup).unwrap();

        let setup: MediaSetupResponse = harness.sent_as(ChannelId::MediaSinkVideo).await;
        assert_eq!(setup.status, MediaSetupStatus::Ready);
        let focus: VideoFocusNotification = harness.sent_as(ChannelId::MediaSinkVideo).await;
        assert_eq!(focus.focus_mode, VideoFocusMode::Projected);
        assert!(!focus.unsolicited);
    }

    #[tokio::test]
    async fn test_setup_waits_when_decoder_not_ready() {
        let mut harness = Harness::new();
        let (mut service, _) = video(true);
        let mut ctx = ServiceContext::new(ChannelId::MediaSinkVideo, &mut harness.io);
        service
            .on_message(&mut ctx, message(&MediaSetupRequest { config_index: 0 }))
            .unwrap();

        let setup: MediaSetupResponse = harness.sent_as(ChannelId::MediaSinkVideo).await;
        assert_eq!(setup.status, MediaSetupStatus::Wait);
    }

    #[tokio::test]
    async fn test_native_focus_request_answered_projected() {
        let mut harness = Harness::new();
        let (mut service, _) = video(false);
        let mut ctx = ServiceContext::new(ChannelId::MediaSinkVideo, &mut harness.io);
        let request = VideoFocusRequest {
            disp_index: 0,
            focus_mode: VideoFocusMode::Native,
            reason: VideoFocusReason::LaunchNative,
        };
        service.on_message(&mut ctx, message(&request)).unwrap();

        let focus: VideoFocusNotification = harness.sent_as(ChannelId::MediaSinkVideo).await;
        assert_eq!(focus.focus_mode, VideoFocusMode::Projected);
    }

    #[tokio::test]
    async fn test_frames_decoded_and_acked() {
        let mut harness = Harness::new();
        let (mut service, decoder) = video(false);
        let mut ctx = ServiceContext::new(ChannelId::MediaSinkVideo, &mut harness.io);

        service
            .on_message(&mut ctx, message(&MediaStartIndication { session: 4, config: 0 }))
            .unwrap();
        service
            .on_message(
                &mut ctx,
                message(&MediaWithTimestamp {
                    timestamp: 1,
                    data: vec![0, 0, 0, 1, 0x67],
                }),
            )
            .unwrap();

        let ack: MediaAck = harness.sent_as(ChannelId::MediaSinkVideo).await;
        assert_eq!(ack, MediaAck { session: 4, value: 1 });
        assert_eq!(decoder.lock().unwrap().frames, vec![vec![0, 0, 0, 1, 0x67]]);
    }
}
