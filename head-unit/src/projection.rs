//! # Projection Devices
//!
//! Hardware the services proxy to. The engine only needs these traits; the
//! host implements them over its audio stack, video decoder, input drivers,
//! bluetooth adapter and GPS.
//!
//! Device calls that complete later return a [`Promise`]; the owning service
//! gets the result back on the session actor through `on_device_event`.

use aa_shared::protocol::input::TouchAction;
use aa_shared::protocol::sensor::GpsLocation;

use crate::error::Result;
use crate::promise::Promise;
use crate::service::InputEventSink;

/// PCM playback for one audio sink channel
pub trait AudioOutput: Send {
    fn open(&mut self) -> Result<()>;
    /// Queue one buffer for playback
    fn write(&mut self, timestamp: u64, data: &[u8]);
    fn start(&mut self);
    fn stop(&mut self);
    /// Pause playback, keeping the stream open
    fn suspend(&mut self);
}

/// H.264 decoder and renderer
pub trait VideoOutput: Send {
    fn open(&mut self) -> Result<()>;
    fn init(&mut self) -> Result<()>;
    fn write(&mut self, timestamp: u64, data: &[u8]);
    fn stop(&mut self);
}

/// PCM capture for the microphone channel
pub trait AudioInput: Send {
    fn open(&mut self) -> Result<()>;
    fn is_active(&self) -> bool;
    /// Begin capturing
    fn start(&mut self) -> Promise<()>;
    /// Next captured buffer
    fn read(&mut self) -> Promise<Vec<u8>>;
    fn stop(&mut self);
}

/// Direction of a rotary controller step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    Left,
    Right,
}

/// Raw input reported by the input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Button {
        code: u32,
        pressed: bool,
        wheel: Option<WheelDirection>,
    },
    Touch {
        action: TouchAction,
        x: u32,
        y: u32,
        pointer_id: u32,
    },
}

/// Touch screen size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchscreenGeometry {
    pub width: u32,
    pub height: u32,
}

/// Keys, rotary controller and touch screen
pub trait InputDevice: Send {
    /// Begin reporting events to `sink`
    fn start(&mut self, sink: InputEventSink);
    fn stop(&mut self);
    fn supported_keycodes(&self) -> Vec<u32>;
    fn touchscreen(&self) -> Option<TouchscreenGeometry>;
}

/// Local bluetooth adapter
pub trait BluetoothDevice: Send {
    fn is_available(&self) -> bool;
    fn local_address(&self) -> String;
    fn is_paired(&self, address: &str) -> bool;
    fn stop(&mut self);
}

/// Night mode switch and location source, polled by the sensor service
pub trait SensorSource: Send {
    fn is_night(&mut self) -> bool;
    /// Latest fix, if one arrived since the last poll
    fn location(&mut self) -> Option<GpsLocation>;
    fn stop(&mut self);
}
