//! Packet codec for the 1189:8890 programming protocol.
//!
//! Every outbound frame is 65 bytes: report id `0x03` followed by 64 payload
//! bytes, zero padded. Any mutation must be bracketed by a begin frame and a
//! commit frame; the firmware buffers the middle frames until it sees the
//! commit marker.

use std::collections::BTreeSet;
use std::fmt;

use crate::action::KeyAction;
use crate::button::Button;
use crate::error::{MiniKbError, Result};

pub const REPORT_ID: u8 = 0x03;
pub const PACKET_LEN: usize = 65;

// Command bytes (payload[0..2])
pub const CMD_BEGIN: [u8; 2] = [0xA1, 0x01];
pub const CMD_COMMIT: [u8; 2] = [0xAA, 0xAA];
pub const CMD_LED_FINISH: [u8; 2] = [0xAA, 0xA1];
pub const OP_CLEAR_KEY: u8 = 0x10;
pub const OP_SET_KEY: u8 = 0x11;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Packet([u8; PACKET_LEN]);

impl Packet {
    /// Pads `bytes` (report id included) to a full frame. Never truncates.
    pub fn encode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > PACKET_LEN {
            return Err(MiniKbError::PacketTooLong(bytes.len()));
        }
        let mut frame = [0u8; PACKET_LEN];
        frame[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(frame))
    }

    // Protocol templates are compile-time sized well under PACKET_LEN.
    pub(crate) fn template<const N: usize>(bytes: [u8; N]) -> Self {
        let mut frame = [0u8; PACKET_LEN];
        frame[..N].copy_from_slice(&bytes);
        Self(frame)
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    /// Hex of the frame up to its last non-zero byte (at least the report id).
    pub fn short_hex(&self) -> String {
        let end = self.0.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
        hex::encode(&self.0[..end])
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Packet({})", self.short_hex())
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Handshake sent once after the interfaces are claimed.
pub fn init() -> Packet {
    Packet::template([REPORT_ID])
}

pub fn begin() -> Packet {
    Packet::template([REPORT_ID, CMD_BEGIN[0], CMD_BEGIN[1]])
}

pub fn commit() -> Packet {
    Packet::template([REPORT_ID, CMD_COMMIT[0], CMD_COMMIT[1]])
}

pub fn clear_key(button: Button) -> Packet {
    Packet::template([REPORT_ID, button.id(), OP_CLEAR_KEY])
}

pub fn set_key_header(button: Button) -> Packet {
    Packet::template([REPORT_ID, button.id(), OP_SET_KEY, 0x01])
}

pub fn set_key_payload(button: Button, action: KeyAction) -> Packet {
    Packet::template([
        REPORT_ID,
        button.id(),
        OP_SET_KEY,
        0x01,
        0x01,
        action.modifiers,
        action.keycode,
    ])
}

/// Full begin / mutate / commit bracket for one control.
pub fn key_sequence(button: Button, action: KeyAction) -> Vec<Packet> {
    let mut packets = vec![begin()];
    if action.is_none() {
        packets.push(clear_key(button));
    } else {
        packets.push(set_key_header(button));
        packets.push(set_key_payload(button, action));
    }
    packets.push(commit());
    packets
}

/// A per-button frame recovered from its wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFrame {
    Clear { button: u8 },
    SetHeader { button: u8 },
    Assign { button: u8, modifiers: u8, keycode: u8 },
}

impl KeyFrame {
    pub fn parse(packet: &Packet) -> Option<Self> {
        let b = packet.as_bytes();
        if b[0] != REPORT_ID || Button::try_from(b[1]).is_err() {
            return None;
        }
        match (b[2], b[3], b[4]) {
            (OP_CLEAR_KEY, _, _) => Some(KeyFrame::Clear { button: b[1] }),
            (OP_SET_KEY, 0x01, 0x01) => Some(KeyFrame::Assign {
                button: b[1],
                modifiers: b[5],
                keycode: b[6],
            }),
            (OP_SET_KEY, 0x01, _) => Some(KeyFrame::SetHeader { button: b[1] }),
            _ => None,
        }
    }
}

/// Short human label for dry-run output and logs.
pub fn describe(packet: &Packet) -> String {
    let b = packet.as_bytes();
    if let Some(frame) = KeyFrame::parse(packet) {
        return match frame {
            KeyFrame::Clear { button } => format!("clear key 0x{button:02x}"),
            KeyFrame::SetHeader { button } => format!("set key 0x{button:02x} (header)"),
            KeyFrame::Assign {
                button,
                modifiers,
                keycode,
            } => format!("set key 0x{button:02x}: mod=0x{modifiers:02x} key=0x{keycode:02x}"),
        };
    }
    match [b[1], b[2]] {
        CMD_BEGIN => "begin".to_string(),
        CMD_COMMIT => "commit".to_string(),
        CMD_LED_FINISH => "led finish".to_string(),
        [0x00, 0x00] if b.iter().skip(1).all(|&x| x == 0) => "init".to_string(),
        _ => "raw".to_string(),
    }
}

/// One raw report read from an input endpoint.
///
/// Byte 0 is the modifier mask, byte 1 is reserved and bytes 2.. hold the
/// keycodes currently held down. Report length varies with the endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputReport {
    bytes: Vec<u8>,
}

impl InputReport {
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Err(MiniKbError::EmptyReport);
        }
        Ok(Self {
            bytes: raw.to_vec(),
        })
    }

    pub fn modifiers(&self) -> u8 {
        self.bytes[0]
    }

    pub fn pressed_keys(&self) -> BTreeSet<u8> {
        self.bytes
            .iter()
            .skip(2)
            .copied()
            .filter(|&k| k != 0)
            .collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usb_hid::{KEY_F13, MOD_LEFT_CTRL, MOD_LEFT_SHIFT};

    #[test]
    fn encode_pads_to_frame() {
        let packet = Packet::encode(&[REPORT_ID, 0xA1, 0x01]).unwrap();
        assert_eq!(packet.as_bytes().len(), PACKET_LEN);
        assert_eq!(&packet.as_bytes()[..4], &[0x03, 0xA1, 0x01, 0x00]);
        assert!(packet.as_bytes()[3..].iter().all(|&b| b == 0));
        assert_eq!(packet, begin());
    }

    #[test]
    fn encode_rejects_oversized_input() {
        let err = Packet::encode(&[0u8; PACKET_LEN + 1]).unwrap_err();
        assert!(matches!(err, MiniKbError::PacketTooLong(66)));
        assert!(Packet::encode(&[0xFFu8; PACKET_LEN]).is_ok());
    }

    #[test]
    fn clear_sequence_keeps_bracket() {
        let packets = key_sequence(Button::Key3, KeyAction::NONE);
        let hex: Vec<String> = packets.iter().map(Packet::short_hex).collect();
        assert_eq!(hex, ["03a101", "030310", "03aaaa"]);
    }

    #[test]
    fn set_sequence_layout() {
        let action = KeyAction::new(KEY_F13, MOD_LEFT_CTRL | MOD_LEFT_SHIFT);
        let packets = key_sequence(Button::KnobPress, action);
        let hex: Vec<String> = packets.iter().map(Packet::short_hex).collect();
        assert_eq!(hex, ["03a101", "030e1101", "030e1101010368", "03aaaa"]);
    }

    #[test]
    fn key_frame_round_trip() {
        let packets = key_sequence(Button::Key1, KeyAction::key(KEY_F13));
        let assign = packets.iter().find_map(|p| match KeyFrame::parse(p) {
            Some(KeyFrame::Assign {
                button,
                modifiers,
                keycode,
            }) => Some((button, modifiers, keycode)),
            _ => None,
        });
        assert_eq!(assign, Some((1, 0, 0x68)));
        assert_eq!(
            KeyFrame::parse(&packets[1]),
            Some(KeyFrame::SetHeader { button: 1 })
        );
        assert_eq!(KeyFrame::parse(&packets[0]), None);
    }

    #[test]
    fn describe_labels_brackets() {
        assert_eq!(describe(&begin()), "begin");
        assert_eq!(describe(&commit()), "commit");
        assert_eq!(describe(&init()), "init");
        assert_eq!(describe(&clear_key(Button::Key2)), "clear key 0x02");
        assert_eq!(
            describe(&Packet::encode(&[0x03, 0x55]).unwrap()),
            "raw"
        );
    }

    #[test]
    fn input_report_level_set() {
        let report = InputReport::decode(&[MOD_LEFT_CTRL, 0xFF, 0x68, 0, 0x69, 0]).unwrap();
        assert_eq!(report.modifiers(), MOD_LEFT_CTRL);
        // Byte 1 is reserved and never counted.
        assert_eq!(report.pressed_keys(), BTreeSet::from([0x68, 0x69]));
    }

    #[test]
    fn input_report_accepts_short_reports() {
        let report = InputReport::decode(&[0x04]).unwrap();
        assert!(report.pressed_keys().is_empty());
        assert!(matches!(
            InputReport::decode(&[]),
            Err(MiniKbError::EmptyReport)
        ));
    }
}
