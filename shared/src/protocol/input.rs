//! Input source messages

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::{postcard_message, MessageStatus};

pub mod id {
    pub const EVENT_INDICATION: u16 = 0x8001;
    pub const BINDING_REQUEST: u16 = 0x8002;
    pub const BINDING_RESPONSE: u16 = 0x8003;
}

/// Well-known scan codes
pub mod keycode {
    pub const HOME: u32 = 3;
    pub const BACK: u32 = 4;
    pub const CALL: u32 = 5;
    pub const END_CALL: u32 = 6;
    pub const UP: u32 = 19;
    pub const DOWN: u32 = 20;
    pub const LEFT: u32 = 21;
    pub const RIGHT: u32 = 22;
    pub const ENTER: u32 = 23;
    pub const MEDIA_PLAY_PAUSE: u32 = 85;
    pub const MEDIA_NEXT: u32 = 87;
    pub const MEDIA_PREVIOUS: u32 = 88;
    pub const SEARCH: u32 = 84;
    pub const MICROPHONE: u32 = 231;
    pub const SCROLL_WHEEL: u32 = 65536;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchConfig {
    pub width: u32,
    pub height: u32,
}

/// Discovery descriptor of the input channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputChannel {
    pub supported_keycodes: Vec<u32>,
    pub touch_screen: Option<TouchConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRequest {
    pub scan_codes: Vec<u32>,
}
postcard_message!(BindingRequest, id::BINDING_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingResponse {
    pub status: MessageStatus,
}
postcard_message!(BindingResponse, id::BINDING_RESPONSE);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchAction {
    Press,
    Release,
    Drag,
    PointerDown,
    PointerUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchLocation {
    pub x: u32,
    pub y: u32,
    pub pointer_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchEvent {
    pub action: TouchAction,
    pub action_index: u32,
    pub pointers: Vec<TouchLocation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub scan_code: u32,
    pub is_pressed: bool,
    pub meta: u32,
    pub long_press: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeEvent {
    pub scan_code: u32,
    pub delta: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputReport {
    Touch(TouchEvent),
    Button(ButtonEvent),
    Relative(RelativeEvent),
}

/// Input event forwarded to the phone, timestamp in microseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEventIndication {
    pub timestamp: u64,
    pub report: InputReport,
}
postcard_message!(InputEventIndication, id::EVENT_INDICATION);
