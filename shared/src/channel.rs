//! # Channel Identifiers
//!
//! Every message travels on one logical channel. The channel byte is the
//! first byte of each frame and is the multiplexing key of the messenger.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WireError;

/// Logical channels multiplexed over one transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelId {
    /// Session negotiation, focus, keepalive, shutdown
    Control = 0,
    /// Keys, rotary controller and touch events from the head unit
    InputSource = 1,
    /// Driving status, location, night mode
    SensorSource = 2,
    /// H.264 projection stream
    MediaSinkVideo = 3,
    /// Music playback
    MediaSinkMediaAudio = 4,
    /// Navigation prompts
    MediaSinkGuidanceAudio = 5,
    /// System sounds
    MediaSinkSystemAudio = 6,
    /// Microphone capture sent to the phone
    MediaSourceMicrophone = 7,
    /// Bluetooth pairing
    Bluetooth = 8,
    /// Call audio
    MediaSinkTelephonyAudio = 9,
    /// Car access point credentials for wireless projection
    WifiProjection = 10,
}

impl ChannelId {
    /// All channels in wire order
    pub const ALL: [ChannelId; 11] = [
        ChannelId::Control,
        ChannelId::InputSource,
        ChannelId::SensorSource,
        ChannelId::MediaSinkVideo,
        ChannelId::MediaSinkMediaAudio,
        ChannelId::MediaSinkGuidanceAudio,
        ChannelId::MediaSinkSystemAudio,
        ChannelId::MediaSourceMicrophone,
        ChannelId::Bluetooth,
        ChannelId::MediaSinkTelephonyAudio,
        ChannelId::WifiProjection,
    ];

    /// Wire value of the channel
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this channel carries audio towards the head unit
    pub const fn is_audio_sink(self) -> bool {
        matches!(
            self,
            ChannelId::MediaSinkMediaAudio
                | ChannelId::MediaSinkGuidanceAudio
                | ChannelId::MediaSinkSystemAudio
                | ChannelId::MediaSinkTelephonyAudio
        )
    }

    /// Human readable name used in log lines
    pub const fn name(self) -> &'static str {
        match self {
            ChannelId::Control => "CONTROL",
            ChannelId::InputSource => "INPUT_SOURCE",
            ChannelId::SensorSource => "SENSOR_SOURCE",
            ChannelId::MediaSinkVideo => "MEDIA_SINK_VIDEO",
            ChannelId::MediaSinkMediaAudio => "MEDIA_SINK_MEDIA_AUDIO",
            ChannelId::MediaSinkGuidanceAudio => "MEDIA_SINK_GUIDANCE_AUDIO",
            ChannelId::MediaSinkSystemAudio => "MEDIA_SINK_SYSTEM_AUDIO",
            ChannelId::MediaSourceMicrophone => "MEDIA_SOURCE_MICROPHONE",
            ChannelId::Bluetooth => "BLUETOOTH",
            ChannelId::MediaSinkTelephonyAudio => "MEDIA_SINK_TELEPHONY_AUDIO",
            ChannelId::WifiProjection => "WIFI_PROJECTION",
        }
    }
}

impl TryFrom<u8> for ChannelId {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ChannelId::ALL
            .iter()
            .copied()
            .find(|channel| channel.as_u8() == value)
            .ok_or(WireError::UnknownChannel(value))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_id_conversion() {
        for channel in ChannelId::ALL {
            assert_eq!(ChannelId::try_from(channel.as_u8()), Ok(channel));
        }
        assert_eq!(ChannelId::try_from(10), Ok(ChannelId::WifiProjection));
        assert_eq!(ChannelId::try_from(11), Err(WireError::UnknownChannel(11)));
        assert_eq!(ChannelId::try_from(0x42), Err(WireError::UnknownChannel(0x42)));
    }

    #[test]
    fn test_audio_sink_classification() {
        assert!(ChannelId::MediaSinkTelephonyAudio.is_audio_sink());
        assert!(!ChannelId::MediaSinkVideo.is_audio_sink());
        assert!(!ChannelId::MediaSourceMicrophone.is_audio_sink());
    }
}
