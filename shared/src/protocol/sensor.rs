//! Sensor source messages

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::{postcard_message, MessageStatus};

pub mod id {
    pub const START_REQUEST: u16 = 0x8001;
    pub const START_RESPONSE: u16 = 0x8002;
    pub const EVENT_INDICATION: u16 = 0x8003;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorType {
    Location,
    Compass,
    CarSpeed,
    Rpm,
    Odometer,
    FuelLevel,
    ParkingBrake,
    Gear,
    NightData,
    Environment,
    Hvac,
    DrivingStatus,
}

/// Discovery descriptor of the sensor channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorChannel {
    pub sensors: Vec<SensorType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStartRequest {
    pub sensor_type: SensorType,
    pub refresh_interval: i64,
}
postcard_message!(SensorStartRequest, id::START_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorStartResponse {
    pub status: MessageStatus,
}
postcard_message!(SensorStartResponse, id::START_RESPONSE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrivingStatus {
    Unrestricted,
    NoVideo,
    NoKeyboardInput,
    NoVoiceInput,
    NoConfig,
    LimitMessageLen,
    Full,
}

/// Fix in fixed-point degrees/meters as the phone expects them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub timestamp: u64,
    pub latitude_e7: i32,
    pub longitude_e7: i32,
    pub accuracy_e3: u32,
    pub altitude_e2: Option<i32>,
    pub speed_e3: Option<i32>,
    pub bearing_e6: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorEvent {
    DrivingStatus(DrivingStatus),
    NightMode { is_night: bool },
    Location(GpsLocation),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEventIndication {
    pub events: Vec<SensorEvent>,
}
postcard_message!(SensorEventIndication, id::EVENT_INDICATION);
