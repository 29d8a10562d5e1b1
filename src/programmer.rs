use crate::action::KeyAction;
use crate::button::Button;
use crate::error::Result;
use crate::packet::{self, Packet};

/// Anything that can program one control. Implemented by the live
/// `DeviceSession` and by `PacketRecorder` for dry runs.
pub trait KeyProgrammer {
    fn set_key(&mut self, button: Button, action: KeyAction) -> Result<()>;
}

/// Collects the frames a session would send, without touching USB.
#[derive(Debug, Default, Clone)]
pub struct PacketRecorder {
    pub calls: Vec<(Button, KeyAction)>,
    pub packets: Vec<Packet>,
}

impl PacketRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, packets: impl IntoIterator<Item = Packet>) {
        self.packets.extend(packets);
    }
}

impl KeyProgrammer for PacketRecorder {
    fn set_key(&mut self, button: Button, action: KeyAction) -> Result<()> {
        self.calls.push((button, action));
        self.record(packet::key_sequence(button, action));
        Ok(())
    }
}
