//! Device addressing and timing parameters.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const VENDOR_ID: u16 = 0x1189; // Acer Communications & Multimedia
pub const PRODUCT_ID: u16 = 0x8890;
pub const ENDPOINT_OUT: u8 = 0x02;

/// Used only when the configuration descriptor lists no interrupt IN endpoint.
pub const FALLBACK_IN_ENDPOINT: u8 = 0x81;
pub const FALLBACK_IN_PACKET_SIZE: u16 = 8;

pub const WRITE_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub out_endpoint: u8,
    pub fallback_in_endpoint: u8,
    pub fallback_in_packet_size: u16,
    pub write_timeout_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            out_endpoint: ENDPOINT_OUT,
            fallback_in_endpoint: FALLBACK_IN_ENDPOINT,
            fallback_in_packet_size: FALLBACK_IN_PACKET_SIZE,
            write_timeout_ms: WRITE_TIMEOUT_MS,
        }
    }
}

impl DeviceConfig {
    pub fn with_ids(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            ..Self::default()
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
