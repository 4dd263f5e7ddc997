//! Audio/video sink and microphone source messages

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::{postcard_message, read_u64, MessageStatus, WireMessage};
use crate::error::WireError;

pub mod id {
    pub const MEDIA_WITH_TIMESTAMP: u16 = 0x0000;
    pub const MEDIA_INDICATION: u16 = 0x0001;
    pub const SETUP_REQUEST: u16 = 0x8000;
    pub const START_INDICATION: u16 = 0x8001;
    pub const STOP_INDICATION: u16 = 0x8002;
    pub const SETUP_RESPONSE: u16 = 0x8003;
    pub const MEDIA_ACK: u16 = 0x8004;
    pub const MICROPHONE_REQUEST: u16 = 0x8005;
    pub const MICROPHONE_RESPONSE: u16 = 0x8006;
    pub const VIDEO_FOCUS_REQUEST: u16 = 0x8007;
    pub const VIDEO_FOCUS_NOTIFICATION: u16 = 0x8008;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AvStreamType {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioType {
    Guidance,
    System,
    Media,
    Telephony,
}

/// PCM format of an audio stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub bit_depth: u32,
    pub channel_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoResolution {
    P480,
    P720,
    P1080,
}

impl VideoResolution {
    /// Width and height in pixels
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            VideoResolution::P480 => (800, 480),
            VideoResolution::P720 => (1280, 720),
            VideoResolution::P1080 => (1920, 1080),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFps {
    Fps30,
    Fps60,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoConfig {
    pub resolution: VideoResolution,
    pub fps: VideoFps,
    pub margin_width: u32,
    pub margin_height: u32,
    pub dpi: u32,
}

/// Discovery descriptor of an audio or video sink channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvChannel {
    pub stream_type: AvStreamType,
    pub audio_type: Option<AudioType>,
    pub audio_configs: Vec<AudioConfig>,
    pub video_configs: Vec<VideoConfig>,
    pub available_while_in_call: bool,
}

/// Discovery descriptor of the microphone channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvInputChannel {
    pub stream_type: AvStreamType,
    pub audio_config: AudioConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSetupRequest {
    pub config_index: u32,
}
postcard_message!(MediaSetupRequest, id::SETUP_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSetupStatus {
    Fail,
    Wait,
    Ready,
}

/// Answer to [`MediaSetupRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSetupResponse {
    pub status: MediaSetupStatus,
    pub max_unacked: u32,
    pub configs: Vec<u32>,
}
postcard_message!(MediaSetupResponse, id::SETUP_RESPONSE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStartIndication {
    pub session: i32,
    pub config: u32,
}
postcard_message!(MediaStartIndication, id::START_INDICATION);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaStopIndication;
postcard_message!(MediaStopIndication, id::STOP_INDICATION);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAck {
    pub session: i32,
    pub value: u32,
}
postcard_message!(MediaAck, id::MEDIA_ACK);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrophoneRequest {
    pub open: bool,
    pub anc_enabled: bool,
    pub ec_enabled: bool,
    pub max_unacked: i32,
}
postcard_message!(MicrophoneRequest, id::MICROPHONE_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrophoneResponse {
    pub status: MessageStatus,
    pub session: i32,
}
postcard_message!(MicrophoneResponse, id::MICROPHONE_RESPONSE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFocusMode {
    Projected,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoFocusReason {
    Unknown,
    PhoneScreenOff,
    LaunchNative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFocusRequest {
    pub disp_index: i32,
    pub focus_mode: VideoFocusMode,
    pub reason: VideoFocusReason,
}
postcard_message!(VideoFocusRequest, id::VIDEO_FOCUS_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoFocusNotification {
    pub focus_mode: VideoFocusMode,
    pub unsolicited: bool,
}
postcard_message!(VideoFocusNotification, id::VIDEO_FOCUS_NOTIFICATION);

/// Media payload with capture time: `[timestamp_micros u64 BE][data]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaWithTimestamp {
    pub timestamp: u64,
    pub data: Vec<u8>,
}

impl WireMessage for MediaWithTimestamp {
    const ID: u16 = id::MEDIA_WITH_TIMESTAMP;

    fn encode_body(&self) -> Result<Vec<u8>, WireError> {
        let mut body = Vec::with_capacity(8 + self.data.len());
        body.extend_from_slice(&self.timestamp.to_be_bytes());
        body.extend_from_slice(&self.data);
        Ok(body)
    }

    fn decode_body(body: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            timestamp: read_u64(body, 0)?,
            data: body[8..].to_vec(),
        })
    }
}

/// Media payload without timestamp
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaIndication {
    pub data: Vec<u8>,
}

impl WireMessage for MediaIndication {
    const ID: u16 = id::MEDIA_INDICATION;

    fn encode_body(&self) -> Result<Vec<u8>, WireError> {
        Ok(self.data.clone())
    }

    fn decode_body(body: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            data: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_media_with_timestamp_layout() {
        let media = MediaWithTimestamp {
            timestamp: 0x0102_0304_0506_0708,
            data: vec![0xAA],
        };
        let body = media.encode_body().unwrap();
        assert_eq!(body, vec![1, 2, 3, 4, 5, 6, 7, 8, 0xAA]);
        assert_eq!(MediaWithTimestamp::decode_body(&body).unwrap(), media);
    }

    #[test]
    fn test_media_with_timestamp_too_short() {
        assert_eq!(
            MediaWithTimestamp::decode_body(&[0; 4]),
            Err(WireError::TooShort)
        );
    }

    #[test]
    fn test_resolution_dimensions() {
        assert_eq!(VideoResolution::P480.dimensions(), (800, 480));
        assert_eq!(VideoResolution::P1080.dimensions(), (1920, 1080));
    }
}
