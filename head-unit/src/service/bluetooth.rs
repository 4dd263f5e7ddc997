//! Bluetooth pairing channel

use aa_shared::protocol::bluetooth::{
    id, BluetoothChannel, BluetoothPairingMethod, PairingRequest, PairingResponse,
};
use aa_shared::protocol::control::{
    ChannelConfig, ChannelDescriptor, ChannelOpenRequest, ServiceDiscoveryResponse,
};
use aa_shared::protocol::MessageStatus;
use aa_shared::{ChannelId, Message};
use log::info;

use super::{unexpected, Service, ServiceContext};
use crate::error::Result;
use crate::projection::BluetoothDevice;

pub struct BluetoothService {
    device: Box<dyn BluetoothDevice>,
}

impl BluetoothService {
    pub fn new(device: Box<dyn BluetoothDevice>) -> Self {
        Self { device }
    }
}

impl Service for BluetoothService {
    fn channel_id(&self) -> ChannelId {
        ChannelId::Bluetooth
    }

    fn stop(&mut self) {
        self.device.stop();
    }

    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        if !self.device.is_available() {
            info!("[Bluetooth] adapter unavailable, not advertised");
            return;
        }
        response.channels.push(ChannelDescriptor {
            channel_id: ChannelId::Bluetooth,
            config: ChannelConfig::Bluetooth(BluetoothChannel {
                adapter_address: self.device.local_address(),
                supported_pairing_methods: vec![
                    BluetoothPairingMethod::Pin,
                    BluetoothPairingMethod::NumericComparison,
                ],
            }),
        });
    }

    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        MessageStatus::Success
    }

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        if message.message_id != id::PAIRING_REQUEST {
            unexpected(ChannelId::Bluetooth, &message);
            return Ok(());
        }

        let request: PairingRequest = message.decode()?;
        let already_paired = self.device.is_paired(&request.phone_address);
        info!(
            "[Bluetooth] pairing request from {} ({:?}), paired: {}",
            request.phone_address, request.pairing_method, already_paired
        );
        ctx.send(&PairingResponse {
            status: MessageStatus::Success,
            already_paired,
        })
    }
}

#[cfg(test)]
mod tests {
    use aa_shared::EncryptionType;

    use super::*;
    use crate::testing::Harness;

    struct FakeAdapter {
        available: bool,
        paired: Vec<String>,
    }

    impl BluetoothDevice for FakeAdapter {
        fn is_available(&self) -> bool {
            self.available
        }
        fn local_address(&self) -> String {
            "00:11:22:33:44:55".into()
        }
        fn is_paired(&self, address: &str) -> bool {
            self.paired.iter().any(|paired| paired == address)
        }
        fn stop(&mut self) {}
    }

    fn bluetooth(available: bool) -> BluetoothService {
        BluetoothService::new(Box::new(FakeAdapter {
            available,
            paired: vec!["AA:BB:CC:DD:EE:FF".into()],
        }))
    }

    #[test]
    fn test_discovery_only_when_available() {
        let mut response = ServiceDiscoveryResponse::default();
        bluetooth(false).fill_discovery_info(&mut response);
        assert!(response.channels.is_empty());

        bluetooth(true).fill_discovery_info(&mut response);
        let ChannelConfig::Bluetooth(channel) = &response.channels[0].config else {
            panic!("expected a bluetooth descriptor");
        };
        assert_eq!(channel.adapter_address, "00:11:22:33:44:55");
        assert!(channel
            .supported_pairing_methods
            .contains(&BluetoothPairingMethod::Pin));
    }

    #[tokio::test]
    async fn test_pairing_reports_known_phone() {
        let mut harness = Harness::new();
        let mut service = bluetooth(true);

        for (address, expected) in [("AA:BB:CC:DD:EE:FF", true), ("01:02:03:04:05:06", false)] {
            let request = Message::encode(
                ChannelId::Bluetooth,
                EncryptionType::Encrypted,
                &PairingRequest {
                    phone_address: address.into(),
                    pairing_method: BluetoothPairingMethod::Pin,
                },
            )
            .unwrap();
            let mut ctx = ServiceContext::new(ChannelId::Bluetooth, &mut harness.io);
            service.on_message(&mut ctx, request).unwrap();

            let response: PairingResponse = harness.sent_as(ChannelId::Bluetooth).await;
            assert_eq!(response.status, MessageStatus::Success);
            assert_eq!(response.already_paired, expected);
        }
    }
}
