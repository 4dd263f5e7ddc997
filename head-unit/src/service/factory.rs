//! Builds the service set of a session from configuration and host devices

use aa_shared::protocol::media::{AudioConfig, VideoConfig};
use aa_shared::ChannelId;
use log::info;

use super::{
    AudioSinkService, BluetoothService, InputSourceService, MicrophoneService, SensorService,
    ServiceRegistry, VideoSinkService, WifiProjectionService,
};
use crate::config::Configuration;
use crate::error::Result;
use crate::projection::{
    AudioInput, AudioOutput, BluetoothDevice, InputDevice, SensorSource, VideoOutput,
};

/// Host hook creating one device per service
pub trait DeviceProvider {
    fn audio_output(&mut self, channel: ChannelId, format: AudioConfig) -> Box<dyn AudioOutput>;
    fn video_output(&mut self, config: VideoConfig) -> Box<dyn VideoOutput>;
    fn audio_input(&mut self, format: AudioConfig) -> Box<dyn AudioInput>;
    fn sensor_source(&mut self) -> Box<dyn SensorSource>;
    fn bluetooth(&mut self) -> Box<dyn BluetoothDevice>;
    fn input_device(&mut self) -> Box<dyn InputDevice>;
}

pub struct ServiceFactory<'a> {
    config: &'a Configuration,
}

impl<'a> ServiceFactory<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    /// Audio sinks first, then video, microphone, sensors, bluetooth, input
    /// and wireless projection
    pub fn create(&self, devices: &mut dyn DeviceProvider) -> Result<ServiceRegistry> {
        let audio = &self.config.audio;
        let mut registry = ServiceRegistry::new();

        let sinks = [
            (ChannelId::MediaSinkMediaAudio, audio.music_enabled, audio.media_format),
            (ChannelId::MediaSinkGuidanceAudio, audio.guidance_enabled, audio.speech_format),
            (ChannelId::MediaSinkTelephonyAudio, audio.telephony_enabled, audio.speech_format),
            (ChannelId::MediaSinkSystemAudio, true, audio.speech_format),
        ];
        for (channel, enabled, format) in sinks {
            if enabled {
                let output = devices.audio_output(channel, format);
                registry.register(Box::new(AudioSinkService::new(channel, format, output)))?;
            }
        }

        let video = self.config.video.video_config();
        registry.register(Box::new(VideoSinkService::new(video, devices.video_output(video))))?;

        let microphone = audio.microphone_format;
        registry.register(Box::new(MicrophoneService::new(
            microphone,
            devices.audio_input(microphone),
        )))?;

        registry.register(Box::new(SensorService::new(
            devices.sensor_source(),
            self.config.sensor.poll_interval(),
        )))?;
        registry.register(Box::new(BluetoothService::new(devices.bluetooth())))?;
        registry.register(Box::new(InputSourceService::new(devices.input_device())))?;
        if self.config.wifi.enabled {
            registry.register(Box::new(WifiProjectionService::new(self.config.wifi.clone())))?;
        }

        info!("[ServiceFactory] created {} services", registry.len());
        Ok(registry)
    }
}
