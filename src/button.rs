//! Physical controls of the 6-key + encoder pad.

use std::fmt;

use crate::error::MiniKbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Button {
    Key1 = 0x01,
    Key2 = 0x02,
    Key3 = 0x03,
    Key4 = 0x04,
    Key5 = 0x05,
    Key6 = 0x06,
    KnobCcw = 0x0D,
    KnobPress = 0x0E,
    KnobCw = 0x0F,
}

impl Button {
    /// Keys in grid order (row-major, 2x3).
    pub const KEYS: [Button; 6] = [
        Button::Key1,
        Button::Key2,
        Button::Key3,
        Button::Key4,
        Button::Key5,
        Button::Key6,
    ];

    pub const KNOB: [Button; 3] = [Button::KnobCcw, Button::KnobPress, Button::KnobCw];

    pub const ALL: [Button; 9] = [
        Button::Key1,
        Button::Key2,
        Button::Key3,
        Button::Key4,
        Button::Key5,
        Button::Key6,
        Button::KnobCcw,
        Button::KnobPress,
        Button::KnobCw,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::Key1 => "button1",
            Button::Key2 => "button2",
            Button::Key3 => "button3",
            Button::Key4 => "button4",
            Button::Key5 => "button5",
            Button::Key6 => "button6",
            Button::KnobCcw => "knob_left",
            Button::KnobPress => "knob_press",
            Button::KnobCw => "knob_right",
        }
    }

    /// Accepts `button1`, `Button 1`, `knob-left`, `knob_ccw`, ...
    pub fn from_name(name: &str) -> Option<Self> {
        let name: String = name
            .trim()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .flat_map(char::to_lowercase)
            .collect();
        let button = match name.as_str() {
            "button1" | "button_1" => Button::Key1,
            "button2" | "button_2" => Button::Key2,
            "button3" | "button_3" => Button::Key3,
            "button4" | "button_4" => Button::Key4,
            "button5" | "button_5" => Button::Key5,
            "button6" | "button_6" => Button::Key6,
            "knob_left" | "knob_ccw" => Button::KnobCcw,
            "knob_press" => Button::KnobPress,
            "knob_right" | "knob_cw" => Button::KnobCw,
            _ => return None,
        };
        Some(button)
    }
}

impl TryFrom<u8> for Button {
    type Error = MiniKbError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Button::ALL
            .into_iter()
            .find(|b| b.id() == id)
            .ok_or(MiniKbError::UnknownButton(id))
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
