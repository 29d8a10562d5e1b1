use thiserror::Error;

use crate::packet::PACKET_LEN;

pub type Result<T> = std::result::Result<T, MiniKbError>;

#[derive(Debug, Error)]
pub enum MiniKbError {
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("not connected to a device")]
    NotConnected,

    #[error("session is already connected")]
    AlreadyConnected,

    #[error("{0} input reader(s) still hold the device; stop the monitor first")]
    ReaderActive(usize),

    #[error("unknown button id 0x{0:02x}")]
    UnknownButton(u8),

    #[error("packet of {0} bytes exceeds the {max}-byte frame", max = PACKET_LEN)]
    PacketTooLong(usize),

    #[error("input report is empty")]
    EmptyReport,

    #[error("USB transport error: {0}")]
    Transport(#[from] rusb::Error),

    #[error("failed to spawn monitor thread: {0}")]
    MonitorSpawn(#[source] std::io::Error),

    #[error("invalid mapping document: {0}")]
    Document(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
