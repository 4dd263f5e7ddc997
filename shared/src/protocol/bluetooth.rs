//! Bluetooth pairing messages

use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use super::{postcard_message, MessageStatus};

pub mod id {
    pub const PAIRING_REQUEST: u16 = 0x8001;
    pub const PAIRING_RESPONSE: u16 = 0x8002;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BluetoothPairingMethod {
    Oob,
    NumericComparison,
    Passkey,
    Pin,
}

/// Discovery descriptor of the bluetooth channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BluetoothChannel {
    pub adapter_address: String,
    pub supported_pairing_methods: Vec<BluetoothPairingMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRequest {
    pub phone_address: String,
    pub pairing_method: BluetoothPairingMethod,
}
postcard_message!(PairingRequest, id::PAIRING_REQUEST);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingResponse {
    pub status: MessageStatus,
    pub already_paired: bool,
}
postcard_message!(PairingResponse, id::PAIRING_RESPONSE);
