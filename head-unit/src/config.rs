//! # Configuration
//!
//! Everything the engine needs to know about the car and the head unit,
//! loaded from JSON. Every field has a default so partial files work:
//!
//! ```json
//! {
//!   "head_unit": { "head_unit_name": "Dashboard" },
//!   "ping": { "interval_ms": 3000 },
//!   "audio": { "telephony_enabled": false }
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use aa_shared::protocol::control::ServiceDiscoveryResponse;
use aa_shared::protocol::media::{AudioConfig, VideoConfig, VideoFps, VideoResolution};
use aa_shared::protocol::wifi::{AccessPointType, WifiSecurityMode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default TCP port phones connect to in wireless mode
pub const DEFAULT_TCP_PORT: u16 = 5000;

/// Identity advertised in the service discovery response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadUnitInfo {
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
}

impl Default for HeadUnitInfo {
    fn default() -> Self {
        Self {
            head_unit_name: "aa-headunit".into(),
            car_model: "Universal".into(),
            car_year: "2024".into(),
            car_serial: "20240101".into(),
            left_hand_drive_vehicle: true,
            headunit_manufacturer: "aa-headunit".into(),
            headunit_model: "Rust Head Unit".into(),
            sw_build: "1".into(),
            sw_version: crate::VERSION.into(),
            can_play_native_media_during_vr: false,
            hide_clock: false,
        }
    }
}

impl HeadUnitInfo {
    /// Discovery response pre-filled with the identity fields, no channels yet
    pub fn discovery_response(&self) -> ServiceDiscoveryResponse {
        ServiceDiscoveryResponse {
            head_unit_name: self.head_unit_name.clone(),
            car_model: self.car_model.clone(),
            car_year: self.car_year.clone(),
            car_serial: self.car_serial.clone(),
            left_hand_drive_vehicle: self.left_hand_drive_vehicle,
            headunit_manufacturer: self.headunit_manufacturer.clone(),
            headunit_model: self.headunit_model.clone(),
            sw_build: self.sw_build.clone(),
            sw_version: self.sw_version.clone(),
            can_play_native_media_during_vr: self.can_play_native_media_during_vr,
            hide_clock: self.hide_clock,
            channels: Vec::new(),
        }
    }
}

/// Keepalive settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingSettings {
    /// Delay between two pings
    pub interval_ms: u64,
    /// Pings allowed without pong before the session times out
    pub max_outstanding: u32,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            max_outstanding: 1,
        }
    }
}

impl PingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Which audio sinks exist and their PCM formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub music_enabled: bool,
    pub guidance_enabled: bool,
    pub telephony_enabled: bool,
    /// Format of the media sink
    pub media_format: AudioConfig,
    /// Format of the guidance, telephony and system sinks
    pub speech_format: AudioConfig,
    /// Format of the microphone source
    pub microphone_format: AudioConfig,
}

impl Default for AudioSettings {
    fn default() -> Self {
        let speech = AudioConfig {
            sample_rate: 16000,
            bit_depth: 16,
            channel_count: 1,
        };
        Self {
            music_enabled: true,
            guidance_enabled: true,
            telephony_enabled: true,
            media_format: AudioConfig {
                sample_rate: 48000,
                bit_depth: 16,
                channel_count: 2,
            },
            speech_format: speech,
            microphone_format: speech,
        }
    }
}

/// Projection video parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub resolution: VideoResolution,
    pub fps: VideoFps,
    pub dpi: u32,
    pub margin_width: u32,
    pub margin_height: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            resolution: VideoResolution::P480,
            fps: VideoFps::Fps60,
            dpi: 140,
            margin_width: 0,
            margin_height: 0,
        }
    }
}

impl VideoSettings {
    pub fn video_config(&self) -> VideoConfig {
        VideoConfig {
            resolution: self.resolution,
            fps: self.fps,
            margin_width: self.margin_width,
            margin_height: self.margin_height,
            dpi: self.dpi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Interval of the night mode / location poll
    pub poll_interval_ms: u64,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
        }
    }
}

impl SensorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Car access point handed to the phone for wireless projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiSettings {
    pub enabled: bool,
    pub ssid: String,
    pub password: String,
    /// Advertised in discovery; may stay empty
    pub bssid: String,
    pub security_mode: WifiSecurityMode,
    pub access_point_type: AccessPointType,
}

impl Default for WifiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ssid: "aa-headunit".into(),
            password: String::new(),
            bssid: String::new(),
            security_mode: WifiSecurityMode::Wpa2Personal,
            access_point_type: AccessPointType::Dynamic,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub head_unit: HeadUnitInfo,
    pub ping: PingSettings,
    pub audio: AudioSettings,
    pub video: VideoSettings,
    pub sensor: SensorSettings,
    pub wifi: WifiSettings,
    /// Port of the wireless accept loop
    pub tcp_port: u16,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            head_unit: HeadUnitInfo::default(),
            ping: PingSettings::default(),
            audio: AudioSettings::default(),
            video: VideoSettings::default(),
            sensor: SensorSettings::default(),
            wifi: WifiSettings::default(),
            tcp_port: DEFAULT_TCP_PORT,
        }
    }
}

impl Configuration {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Configuration =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ping.interval_ms == 0 {
            return Err(Error::Config("ping.interval_ms must be positive".into()));
        }
        if self.ping.max_outstanding == 0 {
            return Err(Error::Config("ping.max_outstanding must be at least 1".into()));
        }
        if self.sensor.poll_interval_ms == 0 {
            return Err(Error::Config("sensor.poll_interval_ms must be positive".into()));
        }
        if self.wifi.enabled && !(1..=32).contains(&self.wifi.ssid.len()) {
            return Err(Error::Config("wifi.ssid must be 1 to 32 bytes".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_default() {
        let config = Configuration::default();
        assert_eq!(config.ping.interval_ms, 5000);
        assert_eq!(config.ping.max_outstanding, 1);
        assert_eq!(config.sensor.poll_interval_ms, 250);
        assert_eq!(config.tcp_port, 5000);
        assert_eq!(config.audio.media_format.sample_rate, 48000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = Configuration::from_json_str(
            r#"{ "head_unit": { "head_unit_name": "Dashboard" }, "ping": { "interval_ms": 3000 } }"#,
        )
        .unwrap();
        assert_eq!(config.head_unit.head_unit_name, "Dashboard");
        assert_eq!(config.head_unit.car_model, "Universal");
        assert_eq!(config.ping.interval_ms, 3000);
        assert_eq!(config.ping.max_outstanding, 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = Configuration::from_json_str(r#"{ "ping": { "interval_ms": 0 } }"#);
        assert!(matches!(result, Err(Error::Config(_))));

        let result = Configuration::from_json_str(r#"{ "wifi": { "ssid": "" } }"#);
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(Configuration::from_json_str(r#"{ "wifi": { "enabled": false, "ssid": "" } }"#).is_ok());

        let result = Configuration::from_json_str("not json");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut config = Configuration::default();
        config.video.resolution = VideoResolution::P720;
        config.audio.telephony_enabled = false;
        config.wifi.security_mode = WifiSecurityMode::WpaWpa2Personal;
        let json = config.to_json_string().unwrap();
        assert_eq!(Configuration::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_discovery_response_identity() {
        let info = HeadUnitInfo::default();
        let response = info.discovery_response();
        assert_eq!(response.head_unit_name, info.head_unit_name);
        assert!(response.channels.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Configuration::load("/nonexistent/aa-headunit.json");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
