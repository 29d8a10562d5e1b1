//! Key actions and the `ctrl-shift-c` action-string grammar.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::usb_hid;

pub const DELIMITER: char = '-';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Key action cannot be empty")]
    Empty,
    #[error("Key action cannot start or end with '-': {0}")]
    DanglingDelimiter(String),
    #[error("Key action contains consecutive '-': {0}")]
    ConsecutiveDelimiters(String),
    #[error("Unknown key: {0}")]
    UnknownKey(String),
    #[error("Unknown modifier: {0}")]
    UnknownModifier(String),
}

/// What one physical control sends: a HID usage code plus modifier bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KeyAction {
    pub keycode: u8,
    pub modifiers: u8,
}

impl KeyAction {
    pub const NONE: KeyAction = KeyAction {
        keycode: usb_hid::KEY_NONE,
        modifiers: 0,
    };

    pub fn new(keycode: u8, modifiers: u8) -> Self {
        Self { keycode, modifiers }
    }

    pub fn key(keycode: u8) -> Self {
        Self::new(keycode, 0)
    }

    pub fn is_none(&self) -> bool {
        self.keycode == usb_hid::KEY_NONE
    }
}

/// Parses `mod-mod-key`. The last token is the key; every preceding token
/// must be a modifier. Modifier order does not matter.
///
/// The key is a name from the key table or a raw usage code written `0xNN`,
/// the form `Display` uses for codes without a name.
pub fn parse_action(text: &str) -> Result<KeyAction, ActionError> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return Err(ActionError::Empty);
    }
    if text.starts_with(DELIMITER) || text.ends_with(DELIMITER) {
        return Err(ActionError::DanglingDelimiter(text));
    }
    if text.contains("--") {
        return Err(ActionError::ConsecutiveDelimiters(text));
    }

    let mut parts: Vec<&str> = text.split(DELIMITER).map(str::trim).collect();
    // Non-empty after the checks above.
    let key = parts.pop().unwrap_or_default();

    let keycode = usb_hid::lookup_keycode(key)
        .or_else(|| raw_keycode(key))
        .ok_or_else(|| ActionError::UnknownKey(key.to_string()))?;

    let mut modifiers = 0u8;
    for part in parts {
        modifiers |= usb_hid::lookup_modifier(part)
            .ok_or_else(|| ActionError::UnknownModifier(part.to_string()))?;
    }

    Ok(KeyAction { keycode, modifiers })
}

fn raw_keycode(token: &str) -> Option<u8> {
    let digits = token.strip_prefix("0x")?;
    if digits.is_empty() || digits.len() > 2 {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

impl FromStr for KeyAction {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_action(s)
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in usb_hid::modifier_names(self.modifiers) {
            write!(f, "{name}{DELIMITER}")?;
        }
        match usb_hid::key_name(self.keycode) {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:02x}", self.keycode),
        }
    }
}
