//! Wireless projection channel
//!
//! Tells the phone which car access point to join. No device behind it: the
//! credentials come straight from configuration.

use aa_shared::protocol::control::{
    ChannelConfig, ChannelDescriptor, ChannelOpenRequest, ServiceDiscoveryResponse,
};
use aa_shared::protocol::wifi::{id, WifiCredentialsResponse, WifiProjectionChannel};
use aa_shared::protocol::MessageStatus;
use aa_shared::{ChannelId, Message};
use log::info;

use super::{unexpected, Service, ServiceContext};
use crate::config::WifiSettings;
use crate::error::Result;

pub struct WifiProjectionService {
    settings: WifiSettings,
}

impl WifiProjectionService {
    pub fn new(settings: WifiSettings) -> Self {
        Self { settings }
    }
}

impl Service for WifiProjectionService {
    fn channel_id(&self) -> ChannelId {
        ChannelId::WifiProjection
    }

    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        response.channels.push(ChannelDescriptor {
            channel_id: ChannelId::WifiProjection,
            config: ChannelConfig::WifiProjection(WifiProjectionChannel {
                car_wifi_bssid: self.settings.bssid.clone(),
            }),
        });
    }

    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        MessageStatus::Success
    }

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        if message.message_id != id::CREDENTIALS_REQUEST {
            unexpected(ChannelId::WifiProjection, &message);
            return Ok(());
        }

        info!("[WifiProjection] credentials requested for {}", self.settings.ssid);
        ctx.send(&WifiCredentialsResponse {
            car_wifi_ssid: self.settings.ssid.clone(),
            car_wifi_password: self.settings.password.clone(),
            car_wifi_security_mode: self.settings.security_mode,
            access_point_type: self.settings.access_point_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use aa_shared::protocol::wifi::{AccessPointType, WifiCredentialsRequest, WifiSecurityMode};
    use aa_shared::EncryptionType;

    use super::*;
    use crate::testing::Harness;

    fn settings() -> WifiSettings {
        WifiSettings {
            ssid: "Dashboard".into(),
            password: "correct horse".into(),
            bssid: "02:00:00:00:00:01".into(),
            ..WifiSettings::default()
        }
    }

    #[test]
    fn test_discovery_advertises_bssid() {
        let mut response = ServiceDiscoveryResponse::default();
        WifiProjectionService::new(settings()).fill_discovery_info(&mut response);

        assert_eq!(response.channels[0].channel_id, ChannelId::WifiProjection);
        let ChannelConfig::WifiProjection(channel) = &response.channels[0].config else {
            panic!("expected a wifi projection descriptor");
        };
        assert_eq!(channel.car_wifi_bssid, "02:00:00:00:00:01");
    }

    #[tokio::test]
    async fn test_credentials_request_answered_from_settings() {
        let mut harness = Harness::new();
        let mut service = WifiProjectionService::new(settings());

        let request = Message::encode(
            ChannelId::WifiProjection,
            EncryptionType::Encrypted,
            &WifiCredentialsRequest,
        )
        .unwrap();
        let mut ctx = ServiceContext::new(ChannelId::WifiProjection, &mut harness.io);
        service.on_message(&mut ctx, request).unwrap();

        let response: WifiCredentialsResponse = harness.sent_as(ChannelId::WifiProjection).await;
        assert_eq!(
            response,
            WifiCredentialsResponse {
                car_wifi_ssid: "Dashboard".into(),
                car_wifi_password: "correct horse".into(),
                car_wifi_security_mode: WifiSecurityMode::Wpa2Personal,
                access_point_type: AccessPointType::Dynamic,
            }
        );
    }

    #[tokio::test]
    async fn test_other_messages_ignored() {
        let mut harness = Harness::new();
        let mut service = WifiProjectionService::new(settings());

        let stray = Message::new(
            ChannelId::WifiProjection,
            EncryptionType::Encrypted,
            aa_shared::MessageType::Specific,
            0x8007,
            vec![],
        );
        let mut ctx = ServiceContext::new(ChannelId::WifiProjection, &mut harness.io);
        service.on_message(&mut ctx, stray).unwrap();
        assert!(harness.mailbox.try_recv().is_err());
    }
}
