//! Keys, rotary controller and touch screen

use aa_shared::protocol::control::{
    ChannelConfig, ChannelDescriptor, ChannelOpenRequest, ServiceDiscoveryResponse,
};
use aa_shared::protocol::input::{
    id, keycode, BindingRequest, BindingResponse, ButtonEvent, InputChannel, InputEventIndication,
    InputReport, RelativeEvent, TouchConfig, TouchEvent, TouchLocation,
};
use aa_shared::protocol::MessageStatus;
use aa_shared::{ChannelId, Message};
use log::{debug, info, warn};

use super::{unexpected, DeviceEvent, Service, ServiceContext};
use crate::error::Result;
use crate::projection::{InputDevice, InputEvent, WheelDirection};
use crate::session::now_micros;

pub struct InputSourceService {
    device: Box<dyn InputDevice>,
    started: bool,
}

impl InputSourceService {
    pub fn new(device: Box<dyn InputDevice>) -> Self {
        Self {
            device,
            started: false,
        }
    }
}

/// Translate a device event into its wire report
fn to_report(event: InputEvent) -> InputReport {
    match event {
        InputEvent::Button {
            code,
            wheel: Some(direction),
            ..
        } if code == keycode::SCROLL_WHEEL => InputReport::Relative(RelativeEvent {
            scan_code: code,
            delta: match direction {
                WheelDirection::Left => -1,
                WheelDirection::Right => 1,
            },
        }),
        InputEvent::Button { code, pressed, .. } => InputReport::Button(ButtonEvent {
            scan_code: code,
            is_pressed: pressed,
            meta: 0,
            long_press: false,
        }),
        InputEvent::Touch {
            action,
            x,
            y,
            pointer_id,
        } => InputReport::Touch(TouchEvent {
            action,
            action_index: 0,
            pointers: vec![TouchLocation { x, y, pointer_id }],
        }),
    }
}

impl Service for InputSourceService {
    fn channel_id(&self) -> ChannelId {
        ChannelId::InputSource
    }

    fn stop(&mut self) {
        if self.started {
            self.started = false;
            self.device.stop();
        }
    }

    fn fill_discovery_info(&self, response: &mut ServiceDiscoveryResponse) {
        response.channels.push(ChannelDescriptor {
            channel_id: ChannelId::InputSource,
            config: ChannelConfig::Input(InputChannel {
                supported_keycodes: self.device.supported_keycodes(),
                touch_screen: self.device.touchscreen().map(|geometry| TouchConfig {
                    width: geometry.width,
                    height: geometry.height,
                }),
            }),
        });
    }

    fn on_channel_open(&mut self, _request: &ChannelOpenRequest) -> MessageStatus {
        MessageStatus::Success
    }

    fn on_message(&mut self, ctx: &mut ServiceContext<'_>, message: Message) -> Result<()> {
        if message.message_id != id::BINDING_REQUEST {
            unexpected(ChannelId::InputSource, &message);
            return Ok(());
        }

        let request: BindingRequest = message.decode()?;
        let supported = self.device.supported_keycodes();
        let status = match request.scan_codes.iter().find(|&&code| !supported.contains(&code)) {
            Some(code) => {
                warn!("[Input] binding rejected, key code {} not supported", code);
                MessageStatus::UnsolicitedMessage
            }
            None => MessageStatus::Success,
        };

        ctx.send(&BindingResponse { status })?;
        if status.is_success() && !self.started {
            info!("[Input] bound {} key codes", request.scan_codes.len());
            self.started = true;
            self.device.start(ctx.input_sink());
        }
        Ok(())
    }

    fn on_device_event(&mut self, ctx: &mut ServiceContext<'_>, event: DeviceEvent) -> Result<()> {
        let DeviceEvent::Input(event) = event else {
            return Ok(());
        };
        debug!("[Input] {:?}", event);
        ctx.send(&InputEventIndication {
            timestamp: now_micros(),
            report: to_report(event),
        })
    }
}
