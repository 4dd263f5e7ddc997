//! Wireless projection credential exchange

use alloc::string::String;

use serde::{Deserialize, Serialize};

use super::postcard_message;

pub mod id {
    pub const CREDENTIALS_REQUEST: u16 = 0x8001;
    pub const CREDENTIALS_RESPONSE: u16 = 0x8002;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WifiSecurityMode {
    Open,
    Wep64,
    Wep128,
    WpaPersonal,
    Wpa2Personal,
    WpaWpa2Personal,
    WpaEnterprise,
    Wpa2Enterprise,
    WpaWpa2Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPointType {
    /// Fixed access point built into the car
    Static,
    /// Hotspot brought up on demand
    Dynamic,
}

/// Discovery descriptor of the wifi projection channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiProjectionChannel {
    pub car_wifi_bssid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiCredentialsRequest;
postcard_message!(WifiCredentialsRequest, id::CREDENTIALS_REQUEST);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentialsResponse {
    pub car_wifi_ssid: String,
    pub car_wifi_password: String,
    pub car_wifi_security_mode: WifiSecurityMode,
    pub access_point_type: AccessPointType,
}
postcard_message!(WifiCredentialsResponse, id::CREDENTIALS_RESPONSE);
