//! USB HID keyboard usage codes and modifier bits.
//!
//! See: https://usb.org/sites/default/files/hut1_4.pdf (Section 10)
//!
//! Names are matched case-insensitively with spaces and underscores ignored,
//! so "Page Up", "page_up" and "pageup" are the same key. The first entry for
//! a code is its canonical name.

// Modifier keys (byte 0 of keyboard report)
pub const MOD_LEFT_CTRL: u8 = 0x01;
pub const MOD_LEFT_SHIFT: u8 = 0x02;
pub const MOD_LEFT_ALT: u8 = 0x04;
pub const MOD_LEFT_GUI: u8 = 0x08; // Win / Cmd
pub const MOD_RIGHT_CTRL: u8 = 0x10;
pub const MOD_RIGHT_SHIFT: u8 = 0x20;
pub const MOD_RIGHT_ALT: u8 = 0x40;
pub const MOD_RIGHT_GUI: u8 = 0x80;

pub const KEY_NONE: u8 = 0x00;
pub const KEY_A: u8 = 0x04;
pub const KEY_C: u8 = 0x06;
pub const KEY_F13: u8 = 0x68;

static MODIFIERS: &[(&str, u8)] = &[
    ("ctrl", MOD_LEFT_CTRL),
    ("shift", MOD_LEFT_SHIFT),
    ("alt", MOD_LEFT_ALT),
    ("win", MOD_LEFT_GUI),
    ("rctrl", MOD_RIGHT_CTRL),
    ("rshift", MOD_RIGHT_SHIFT),
    ("ralt", MOD_RIGHT_ALT),
    ("rwin", MOD_RIGHT_GUI),
    // Aliases
    ("control", MOD_LEFT_CTRL),
    ("lctrl", MOD_LEFT_CTRL),
    ("lshift", MOD_LEFT_SHIFT),
    ("lalt", MOD_LEFT_ALT),
    ("opt", MOD_LEFT_ALT),
    ("option", MOD_LEFT_ALT),
    ("cmd", MOD_LEFT_GUI),
    ("command", MOD_LEFT_GUI),
    ("gui", MOD_LEFT_GUI),
    ("meta", MOD_LEFT_GUI),
    ("super", MOD_LEFT_GUI),
    ("lwin", MOD_LEFT_GUI),
    ("ropt", MOD_RIGHT_ALT),
    ("rcmd", MOD_RIGHT_GUI),
];

static KEYS: &[(&str, u8)] = &[
    ("none", KEY_NONE),
    ("a", 0x04),
    ("b", 0x05),
    ("c", 0x06),
    ("d", 0x07),
    ("e", 0x08),
    ("f", 0x09),
    ("g", 0x0A),
    ("h", 0x0B),
    ("i", 0x0C),
    ("j", 0x0D),
    ("k", 0x0E),
    ("l", 0x0F),
    ("m", 0x10),
    ("n", 0x11),
    ("o", 0x12),
    ("p", 0x13),
    ("q", 0x14),
    ("r", 0x15),
    ("s", 0x16),
    ("t", 0x17),
    ("u", 0x18),
    ("v", 0x19),
    ("w", 0x1A),
    ("x", 0x1B),
    ("y", 0x1C),
    ("z", 0x1D),
    ("1", 0x1E),
    ("2", 0x1F),
    ("3", 0x20),
    ("4", 0x21),
    ("5", 0x22),
    ("6", 0x23),
    ("7", 0x24),
    ("8", 0x25),
    ("9", 0x26),
    ("0", 0x27),
    ("enter", 0x28),
    ("escape", 0x29),
    ("backspace", 0x2A),
    ("tab", 0x2B),
    ("space", 0x2C),
    ("minus", 0x2D),
    ("equal", 0x2E),
    ("leftbracket", 0x2F),
    ("rightbracket", 0x30),
    ("backslash", 0x31),
    ("semicolon", 0x33),
    ("quote", 0x34),
    ("grave", 0x35),
    ("comma", 0x36),
    ("dot", 0x37),
    ("slash", 0x38),
    ("capslock", 0x39),
    ("f1", 0x3A),
    ("f2", 0x3B),
    ("f3", 0x3C),
    ("f4", 0x3D),
    ("f5", 0x3E),
    ("f6", 0x3F),
    ("f7", 0x40),
    ("f8", 0x41),
    ("f9", 0x42),
    ("f10", 0x43),
    ("f11", 0x44),
    ("f12", 0x45),
    ("printscreen", 0x46),
    ("scrolllock", 0x47),
    ("pause", 0x48),
    ("insert", 0x49),
    ("home", 0x4A),
    ("pageup", 0x4B),
    ("delete", 0x4C),
    ("end", 0x4D),
    ("pagedown", 0x4E),
    ("right", 0x4F),
    ("left", 0x50),
    ("down", 0x51),
    ("up", 0x52),
    ("numlock", 0x53),
    ("numpadslash", 0x54),
    ("numpadasterisk", 0x55),
    ("numpadminus", 0x56),
    ("numpadplus", 0x57),
    ("numpadenter", 0x58),
    ("numpad1", 0x59),
    ("numpad2", 0x5A),
    ("numpad3", 0x5B),
    ("numpad4", 0x5C),
    ("numpad5", 0x5D),
    ("numpad6", 0x5E),
    ("numpad7", 0x5F),
    ("numpad8", 0x60),
    ("numpad9", 0x61),
    ("numpad0", 0x62),
    ("numpaddot", 0x63),
    ("f13", KEY_F13),
    ("f14", 0x69),
    ("f15", 0x6A),
    ("f16", 0x6B),
    ("f17", 0x6C),
    ("f18", 0x6D),
    ("f19", 0x6E),
    ("f20", 0x6F),
    ("f21", 0x70),
    ("f22", 0x71),
    ("f23", 0x72),
    ("f24", 0x73),
    ("cut", 0x7B),
    ("copy", 0x7C),
    ("paste", 0x7D),
    ("kbmute", 0x7F),
    ("kbvolumeup", 0x80),
    ("kbvolumedown", 0x81),
    // Media codes as understood by the ch57x firmware
    ("play", 0xE8),
    ("stop", 0xE9),
    ("prev", 0xEA),
    ("next", 0xEB),
    ("volumeup", 0xED),
    ("volumedown", 0xEE),
    ("mute", 0xEF),
    // Aliases
    ("return", 0x28),
    ("esc", 0x29),
    ("apostrophe", 0x34),
    ("period", 0x37),
    ("rightarrow", 0x4F),
    ("leftarrow", 0x50),
    ("downarrow", 0x51),
    ("uparrow", 0x52),
    ("numpad/", 0x54),
    ("numpad*", 0x55),
    ("numpad+", 0x57),
    ("numpad.", 0x63),
    ("previous", 0xEA),
    ("playpause", 0xE8),
    ("mediaplay/pause", 0xE8),
    ("mediastop", 0xE9),
    ("mediaprev", 0xEA),
    ("medianext", 0xEB),
    ("mediavolup", 0xED),
    ("mediavoldown", 0xEE),
    ("mediamute", 0xEF),
];

fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn lookup_keycode(name: &str) -> Option<u8> {
    let name = normalize(name);
    KEYS.iter().find(|(n, _)| *n == name).map(|&(_, code)| code)
}

pub fn lookup_modifier(name: &str) -> Option<u8> {
    let name = normalize(name);
    MODIFIERS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, bit)| bit)
}

pub fn key_name(code: u8) -> Option<&'static str> {
    KEYS.iter().find(|&&(_, c)| c == code).map(|&(name, _)| name)
}

pub fn modifier_names(mods: u8) -> Vec<&'static str> {
    // The first eight entries are the canonical single-bit names.
    MODIFIERS[..8]
        .iter()
        .filter(|&&(_, bit)| mods & bit != 0)
        .map(|&(name, _)| name)
        .collect()
}

pub fn modifier_string(mods: u8) -> String {
    modifier_names(mods).join("-")
}

/// Canonical (name, code) pairs, one per distinct code.
pub fn key_names() -> impl Iterator<Item = (&'static str, u8)> {
    KEYS.iter()
        .enumerate()
        .filter(|&(i, &(_, code))| KEYS[..i].iter().all(|&(_, c)| c != code))
        .map(|(_, &entry)| entry)
}

pub fn modifier_table() -> &'static [(&'static str, u8)] {
    MODIFIERS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_and_space_insensitive() {
        assert_eq!(lookup_keycode("F13"), Some(KEY_F13));
        assert_eq!(lookup_keycode("Page Up"), Some(0x4B));
        assert_eq!(lookup_keycode("page_down"), Some(0x4E));
        assert_eq!(lookup_keycode("Numpad /"), Some(0x54));
        assert_eq!(lookup_keycode("hyper"), None);
    }

    #[test]
    fn modifier_aliases_share_bits() {
        assert_eq!(lookup_modifier("CTRL"), Some(MOD_LEFT_CTRL));
        assert_eq!(lookup_modifier("opt"), lookup_modifier("alt"));
        assert_eq!(lookup_modifier("cmd"), Some(MOD_LEFT_GUI));
        assert_eq!(lookup_modifier("rcmd"), Some(MOD_RIGHT_GUI));
        assert_eq!(lookup_modifier("c"), None);
    }

    #[test]
    fn key_name_returns_canonical_entry() {
        assert_eq!(key_name(0x68), Some("f13"));
        assert_eq!(key_name(0x29), Some("escape"));
        assert_eq!(key_name(0xEA), Some("prev"));
        assert_eq!(key_name(0xFF), None);
    }

    #[test]
    fn modifier_names_follow_bit_order() {
        assert_eq!(
            modifier_names(MOD_RIGHT_GUI | MOD_LEFT_SHIFT | MOD_LEFT_CTRL),
            vec!["ctrl", "shift", "rwin"]
        );
        assert_eq!(modifier_string(0), "");
        assert_eq!(modifier_string(MOD_LEFT_CTRL | MOD_LEFT_ALT), "ctrl-alt");
    }

    #[test]
    fn key_names_are_unique_per_code() {
        let names: Vec<_> = key_names().collect();
        assert!(names.contains(&("f13", 0x68)));
        assert!(!names.iter().any(|&(n, _)| n == "previous"));
        let mut codes: Vec<u8> = names.iter().map(|&(_, c)| c).collect();
        let total = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), total);
    }
}
