//! Sensor source channel: driving status, night mode and location

use std::time::Duration;

use aa_shared::protocol::control::{
    ChannelConfig, ChannelDescriptor, ChannelOpenRequest, ServiceDiscoveryResponse,
};
use aa_shared::protocol::sensor::{
    id, DrivingStatus, SensorChannel, SensorEvent, SensorEventIndication, SensorStartRequest,
    SensorStartResponse, SensorType,
};
use aa_shared::protocol::MessageStatus;
use aa_shared::{ChannelId, Message};
use log::{debug, info, warn};
use tokio::task::AbortHandle;

use super::{unexpected, DeviceEvent, Followup, Service, ServiceContext};
use crate::error::Result;
use crate::projection::SensorSource;

const ADVERTISED: [SensorType; 3] = [
    SensorType::DrivingStatus,
    SensorType::Location,
    SensorType::NightData,
];

pub struct SensorService {
    source: Box<dyn SensorSource>,
    poll_interval: Duration,
    /// Night mode last reported, once the phone asked for it
    night: Option<bool>,
    location_requested: bool,
    tick: Option<AbortHandle>,
}

impl SensorService {
    pub fn new(source: Box<dyn SensorSource>, poll_interval: Duration) -> Self {
        Self {
            source,
            poll_interval,
            night: None,
            location_requested: false,
            tick: None,
        }
    }

    fn report(ctx: &mut ServiceContext<'_>, event: SensorEvent) -> Result<()> {
        ctx.send(&SensorEventIndication { events: vec![event] })
    }

    fn poll(&mut self, ctx: &mut ServiceContext<'_>) -> Result<()> {
        if let Some(previous) = self.night {
            let is_night = self.source.is_night();
            if is_night != previous {
                info!("[Sensor] night mode {}", if is_night { "on" } else { "off" });
                self.night = Some(is_night);
                Self::report(ctx, SensorEvent::NightMode { is_night })?;
            }
        }
        if self.location_requested {
            if let Some(fix) = self.source.location() {
                Self::report(ctx, SensorEvent::Location(fix))?;
            }
        }
        Ok(())
    }
}

impl Service for SensorService {
    fn channel_id(&self) -> ChannelId {
        ChannelId::SensorSource
    }

    fn start(&mut self, ctx: &mut ServiceContext<'_>) {
        self.tick = Some(ctx.schedule_tick(self.poll_interval));
    }

    fn stop(&mut self) {
        if let Some(tick) = self.tick.take() {
            tick.abort();
        }
        self.source.stop();
    }

    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        response.channels.push(ChannelDescriptor {
            channel_id: ChannelId::SensorSource,
            config: ChannelConfig::Sensor(SensorChannel {
                sensors: ADVERTISED.to_vec(),
            }),
        });
    }

    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        MessageStatus::Success
    }

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        if message.message_id != id::START_REQUEST {
            unexpected(ChannelId::SensorSource, &message);
            return Ok(());
        }

        let request: SensorStartRequest = message.decode()?;
        if !ADVERTISED.contains(&request.sensor_type) {
            warn!("[Sensor] {:?} not available", request.sensor_type);
            return ctx.send(&SensorStartResponse {
                status: MessageStatus::Fail,
            });
        }

        debug!(
            "[Sensor] start {:?}, refresh {}",
            request.sensor_type, request.refresh_interval
        );
        ctx.send_then(
            &SensorStartResponse {
                status: MessageStatus::Success,
            },
            Followup::SensorData(request.sensor_type),
        )
    }

    fn on_send_complete(&mut self, ctx: &mut ServiceContext<'_>, followup: Followup) -> Result<()> {
        let Followup::SensorData(sensor) = followup else {
            return Ok(());
        };
        match sensor {
            SensorType::DrivingStatus => {
                Self::report(ctx, SensorEvent::DrivingStatus(DrivingStatus::Unrestricted))
            }
            SensorType::NightData => {
                let is_night = self.source.is_night();
                self.night = Some(is_night);
                Self::report(ctx, SensorEvent::NightMode { is_night })
            }
            SensorType::Location => {
                self.location_requested = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_device_event(&mut self, ctx: &mut ServiceContext<'_>, event: DeviceEvent) -> Result<()> {
        if !matches!(event, DeviceEvent::Tick) {
            return Ok(());
        }
        let result = self.poll(ctx);
        self.tick = Some(ctx.schedule_tick(self.poll_interval));
        result
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use aa_shared::protocol::sensor::GpsLocation;
    use aa_shared::EncryptionType;

    use super::*;
    use crate::session::SessionEvent;
    use crate::testing::Harness;

    #[derive(Default)]
    struct Readings {
        night: bool,
        fixes: VecDeque<GpsLocation>,
        stops: u32,
    }

    struct FakeSensors(Arc<Mutex<Readings>>);

    impl SensorSource for FakeSensors {
        fn is_night(&mut self) -> bool {
            self.0.lock().unwrap().night
        }
        fn location(&mut self) -> Option<GpsLocation> {
            self.0.lock().unwrap().fixes.pop_front()
        }
        fn stop(&mut self) {
            self.0.lock().unwrap().stops += 1;
        }
    }

    fn sensors() -> (SensorService, Arc<Mutex<Readings>>) {
        let readings = Arc::new(Mutex::new(Readings::default()));
        (
            SensorService::new(Box::new(FakeSensors(readings.clone())), Duration::from_millis(250)),
            readings,
        )
    }

    fn start_request(sensor_type: SensorType) -> Message {
        Message::encode(
            ChannelId::SensorSource,
            EncryptionType::Encrypted,
            &SensorStartRequest {
                sensor_type,
                refresh_interval: 0,
            },
        )
        .unwrap()
    }

    async fn followup(harness: &mut Harness) -> Followup {
        match harness.next_event().await {
            SessionEvent::SendCompleted { followup, .. } => followup,
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_driving_status_sent_after_start_response() {
        let mut harness = Harness::new();
        let (mut service, _) = sensors();

        let mut ctx = ServiceContext::new(ChannelId::SensorSource, &mut harness.io);
        service
            .on_message(&mut ctx, start_request(SensorType::DrivingStatus))
            .unwrap();
        let next = followup(&mut harness).await;
        let mut ctx = ServiceContext::new(ChannelId::SensorSource, &mut harness.io);
        service.on_send_complete(&mut ctx, next).unwrap();

        let response: SensorStartResponse = harness.sent_as(ChannelId::SensorSource).await;
        assert_eq!(response.status, MessageStatus::Success);
        let data: SensorEventIndication = harness.sent_as(ChannelId::SensorSource).await;
        assert_eq!(
            data.events,
            vec![SensorEvent::DrivingStatus(DrivingStatus::Unrestricted)]
        );
    }

    #[tokio::test]
    async fn test_unadvertised_sensor_fails() {
        let mut harness = Harness::new();
        let (mut service, _) = sensors();
        let mut ctx = ServiceContext::new(ChannelId::SensorSource, &mut harness.io);
        service.on_message(&mut ctx, start_request(SensorType::Rpm)).unwrap();

        let response: SensorStartResponse = harness.sent_as(ChannelId::SensorSource).await;
        assert_eq!(response.status, MessageStatus::Fail);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_reports_night_change_and_location() {
        let mut harness = Harness::new();
        let (mut service, readings) = sensors();

        let mut ctx = ServiceContext::new(ChannelId::SensorSource, &mut harness.io);
        service.start(&mut ctx);
        service.on_message(&mut ctx, start_request(SensorType::NightData)).unwrap();
        let next = followup(&mut harness).await;
        let mut ctx = ServiceContext::new(ChannelId::SensorSource, &mut harness.io);
        service.on_send_complete(&mut ctx, next).unwrap();
        service
            .on_send_complete(&mut ctx, Followup::SensorData(SensorType::Location))
            .unwrap();

        {
            let mut readings = readings.lock().unwrap();
            readings.night = true;
            readings.fixes.push_back(GpsLocation {
                timestamp: 1,
                latitude_e7: 525_200_000,
                longitude_e7: 134_050_000,
                accuracy_e3: 5000,
                altitude_e2: None,
                speed_e3: None,
                bearing_e6: None,
            });
        }

        let SessionEvent::Device { event, .. } = harness.next_event().await else {
            panic!("expected the poll tick");
        };
        let mut ctx = ServiceContext::new(ChannelId::SensorSource, &mut harness.io);
        service.on_device_event(&mut ctx, event).unwrap();

        let _: SensorStartResponse = harness.sent_as(ChannelId::SensorSource).await;
        let initial: SensorEventIndication = harness.sent_as(ChannelId::SensorSource).await;
        assert_eq!(initial.events, vec![SensorEvent::NightMode { is_night: false }]);
        let changed: SensorEventIndication = harness.sent_as(ChannelId::SensorSource).await;
        assert_eq!(changed.events, vec![SensorEvent::NightMode { is_night: true }]);
        let fix: SensorEventIndication = harness.sent_as(ChannelId::SensorSource).await;
        assert!(matches!(fix.events[0], SensorEvent::Location(_)));

        // rescheduled
        assert!(matches!(
            harness.next_event().await,
            SessionEvent::Device {
                event: DeviceEvent::Tick,
                ..
            }
        ));

        service.stop();
        assert_eq!(readings.lock().unwrap().stops, 1);
    }
}
