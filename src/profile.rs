//! Flat profile: `{"button1": "F13", "knob_left": "ctrl-z", ...}`.
//!
//! Values may be plain key names (as picked from a key list, e.g.
//! "Page Up") or full action strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::action::{parse_action, KeyAction};
use crate::button::Button;
use crate::error::Result;
use crate::usb_hid;

pub const PROFILE_FILE_NAME: &str = ".minikb_config.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile {
    pub entries: BTreeMap<String, String>,
}

pub fn default_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(PROFILE_FILE_NAME))
}

/// Resolves a profile value: key name first, then action string.
pub fn resolve_value(value: &str) -> Option<KeyAction> {
    usb_hid::lookup_keycode(value)
        .map(KeyAction::key)
        .or_else(|| parse_action(value).ok())
}

impl Profile {
    /// F13..F21 on button1..button6 and the knob.
    pub fn defaults() -> Self {
        let keys = ["f13", "f14", "f15", "f16", "f17", "f18", "f19", "f20", "f21"];
        let entries = Button::ALL
            .iter()
            .zip(keys)
            .map(|(button, key)| (button.name().to_string(), key.to_string()))
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    pub fn set(&mut self, button: Button, value: impl Into<String>) {
        self.entries.retain(|name, _| Button::from_name(name) != Some(button));
        self.entries.insert(button.name().to_string(), value.into());
    }

    /// Resolved assignments in `Button::ALL` order. Unknown button names are
    /// skipped and unresolvable values become "no key".
    pub fn assignments(&self) -> Vec<(Button, KeyAction)> {
        let mut resolved: BTreeMap<Button, KeyAction> = BTreeMap::new();
        for (name, value) in &self.entries {
            let Some(button) = Button::from_name(name) else {
                warn!("profile: unknown button '{}', skipped", name);
                continue;
            };
            let action = resolve_value(value).unwrap_or_else(|| {
                warn!("profile: cannot resolve '{}' for {}, using no key", value, button);
                KeyAction::NONE
            });
            resolved.insert(button, action);
        }
        resolved.into_iter().collect()
    }
}
