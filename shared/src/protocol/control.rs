//! Control channel messages

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::{postcard_message, read_u16, MessageStatus, WireMessage};
use crate::channel::ChannelId;
use crate::error::WireError;
use crate::frame::MessageType;
use crate::{PROTOCOL_MAJOR_VERSION, PROTOCOL_MINOR_VERSION};

use super::bluetooth::BluetoothChannel;
use super::input::InputChannel;
use super::media::{AvChannel, AvInputChannel};
use super::sensor::SensorChannel;
use super::wifi::WifiProjectionChannel;

pub mod id {
    pub const VERSION_REQUEST: u16 = 0x0001;
    pub const VERSION_RESPONSE: u16 = 0x0002;
    pub const HANDSHAKE: u16 = 0x0003;
    pub const AUTH_COMPLETE: u16 = 0x0004;
    pub const SERVICE_DISCOVERY_REQUEST: u16 = 0x0005;
    pub const SERVICE_DISCOVERY_RESPONSE: u16 = 0x0006;
    pub const CHANNEL_OPEN_REQUEST: u16 = 0x0007;
    pub const CHANNEL_OPEN_RESPONSE: u16 = 0x0008;
    pub const PING_REQUEST: u16 = 0x000B;
    pub const PING_RESPONSE: u16 = 0x000C;
    pub const NAV_FOCUS_REQUEST: u16 = 0x000D;
    pub const NAV_FOCUS_NOTIFICATION: u16 = 0x000E;
    pub const BYEBYE_REQUEST: u16 = 0x000F;
    pub const BYEBYE_RESPONSE: u16 = 0x0010;
    pub const VOICE_SESSION_NOTIFICATION: u16 = 0x0011;
    pub const AUDIO_FOCUS_REQUEST: u16 = 0x0012;
    pub const AUDIO_FOCUS_NOTIFICATION: u16 = 0x0013;
    pub const BATTERY_STATUS_NOTIFICATION: u16 = 0x0017;
}

/// Status word of a version response
pub const VERSION_STATUS_MATCH: u16 = 0x0000;
/// Status word sent when no compatible version exists
pub const VERSION_STATUS_MISMATCH: u16 = 0xFFFF;

/// Protocol version announced by the head unit: `[major u16 BE][minor u16 BE]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRequest {
    pub major: u16,
    pub minor: u16,
}

impl Default for VersionRequest {
    fn default() -> Self {
        Self {
            major: PROTOCOL_MAJOR_VERSION,
            minor: PROTOCOL_MINOR_VERSION,
        }
    }
}

impl WireMessage for VersionRequest {
    const ID: u16 = id::VERSION_REQUEST;

    fn encode_body(&self) -> Result<Vec<u8>, WireError> {
        let mut body = Vec::with_capacity(4);
        body.extend_from_slice(&self.major.to_be_bytes());
        body.extend_from_slice(&self.minor.to_be_bytes());
        Ok(body)
    }

    fn decode_body(body: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            major: read_u16(body, 0)?,
            minor: read_u16(body, 2)?,
        })
    }
}

/// Phone's answer to the version request: `[major][minor][status]`, all u16 BE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionResponse {
    pub major: u16,
    pub minor: u16,
    pub status: u16,
}

impl VersionResponse {
    pub fn is_compatible(&self) -> bool {
        self.status != VERSION_STATUS_MISMATCH
    }
}

impl WireMessage for VersionResponse {
    const ID: u16 = id::VERSION_RESPONSE;

    fn encode_body(&self) -> Result<Vec<u8>, WireError> {
        let mut body = Vec::with_capacity(6);
        body.extend_from_slice(&self.major.to_be_bytes());
        body.extend_from_slice(&self.minor.to_be_bytes());
        body.extend_from_slice(&self.status.to_be_bytes());
        Ok(body)
    }

    fn decode_body(body: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            major: read_u16(body, 0)?,
            minor: read_u16(body, 2)?,
            status: read_u16(body, 4)?,
        })
    }
}

/// Opaque cryptor handshake bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Handshake {
    pub data: Vec<u8>,
}

impl WireMessage for Handshake {
    const ID: u16 = id::HANDSHAKE;

    fn encode_body(&self) -> Result<Vec<u8>, WireError> {
        Ok(self.data.clone())
    }

    fn decode_body(body: &[u8]) -> Result<Self, WireError> {
        Ok(Self {
            data: body.to_vec(),
        })
    }
}

/// Sent by the head unit once the cryptor handshake finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthComplete {
    pub status: MessageStatus,
}
postcard_message!(AuthComplete, id::AUTH_COMPLETE);

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceDiscoveryRequest {
    pub device_name: String,
    pub device_brand: String,
}
postcard_message!(ServiceDiscoveryRequest, id::SERVICE_DISCOVERY_REQUEST);

/// Capabilities of one channel advertised during service discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelConfig {
    MediaSink(AvChannel),
    MediaSource(AvInputChannel),
    Input(InputChannel),
    Sensor(SensorChannel),
    Bluetooth(BluetoothChannel),
    WifiProjection(WifiProjectionChannel),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub channel_id: ChannelId,
    pub config: ChannelConfig,
}

/// Head-unit identity and channel list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceDiscoveryResponse {
    pub head_unit_name: String,
    pub car_model: String,
    pub car_year: String,
    pub car_serial: String,
    pub left_hand_drive_vehicle: bool,
    pub headunit_manufacturer: String,
    pub headunit_model: String,
    pub sw_build: String,
    pub sw_version: String,
    pub can_play_native_media_during_vr: bool,
    pub hide_clock: bool,
    pub channels: Vec<ChannelDescriptor>,
}
postcard_message!(ServiceDiscoveryResponse, id::SERVICE_DISCOVERY_RESPONSE);

/// Sent by the phone on a service's own channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOpenRequest {
    pub priority: i32,
    pub channel_id: ChannelId,
}
postcard_message!(ChannelOpenRequest, id::CHANNEL_OPEN_REQUEST, MessageType::Control);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOpenResponse {
    pub status: MessageStatus,
}
postcard_message!(ChannelOpenResponse, id::CHANNEL_OPEN_RESPONSE, MessageType::Control);

/// Keepalive probe, timestamp in microseconds since the epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    pub timestamp: i64,
}
postcard_message!(PingRequest, id::PING_REQUEST);

/// Keepalive answer echoing the request timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    pub timestamp: i64,
}
postcard_message!(PingResponse, id::PING_RESPONSE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavFocusType {
    Native,
    Projected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavFocusRequest {
    pub focus_type: NavFocusType,
}
postcard_message!(NavFocusRequest, id::NAV_FOCUS_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavFocusNotification {
    pub focus_type: NavFocusType,
}
postcard_message!(NavFocusNotification, id::NAV_FOCUS_NOTIFICATION);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownReason {
    Quit,
    UserSelection,
    DeviceSwitch,
    NotSupported,
    NotCurrentlySupported,
    ProbablyCarPowerOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByeByeRequest {
    pub reason: ShutdownReason,
}
postcard_message!(ByeByeRequest, id::BYEBYE_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ByeByeResponse;
postcard_message!(ByeByeResponse, id::BYEBYE_RESPONSE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceSessionStatus {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSessionNotification {
    pub status: VoiceSessionStatus,
}
postcard_message!(VoiceSessionNotification, id::VOICE_SESSION_NOTIFICATION);

/// Focus the phone asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFocusType {
    Gain,
    GainTransient,
    GainNavi,
    Release,
}

/// Focus granted by the head unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFocusState {
    Gain,
    GainTransient,
    Loss,
    LossTransientCanDuck,
    LossTransient,
    GainMediaOnly,
    GainTransientGuidanceOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFocusRequest {
    pub focus_type: AudioFocusType,
}
postcard_message!(AudioFocusRequest, id::AUDIO_FOCUS_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFocusNotification {
    pub focus_state: AudioFocusState,
    pub unsolicited: bool,
}
postcard_message!(AudioFocusNotification, id::AUDIO_FOCUS_NOTIFICATION);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryStatusNotification {
    pub battery_level: u32,
    pub time_remaining_s: Option<u32>,
    pub critical_battery: bool,
}
postcard_message!(BatteryStatusNotification, id::BATTERY_STATUS_NOTIFICATION);
