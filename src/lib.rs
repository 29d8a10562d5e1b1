//! Programming and input monitoring for the 6-key + rotary encoder USB
//! macro pad sold under many names (USB id `1189:8890`).
//!
//! ```no_run
//! use minikb::{parse_action, Button, DeviceConfig, DeviceSession, RusbBackend};
//!
//! let mut session = DeviceSession::new(RusbBackend, DeviceConfig::default());
//! session.connect()?;
//! session.set_key(Button::Key1, parse_action("ctrl-shift-f13")?)?;
//! session.disconnect()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod action;
pub mod button;
pub mod config;
pub mod error;
pub mod led;
pub mod mapping;
pub mod monitor;
pub mod packet;
pub mod probe;
pub mod profile;
pub mod programmer;
pub mod session;
pub mod transport;
pub mod usb_hid;

pub use action::{parse_action, ActionError, KeyAction};
pub use button::Button;
pub use config::DeviceConfig;
pub use error::{MiniKbError, Result};
pub use monitor::{InputMonitor, KeyTracker, MonitorEvent, MonitorOptions, StateScope};
pub use packet::{InputReport, Packet};
pub use programmer::{KeyProgrammer, PacketRecorder};
pub use session::{DeviceSession, InputReader, ReadCycle, SessionState};
pub use transport::{RusbBackend, UsbBackend, UsbHandle};
