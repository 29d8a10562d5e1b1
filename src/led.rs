//! LED mode encoders.
//!
//! The LED protocol of this pad is not documented and the device gives no
//! feedback, so none of these layouts is known to be correct. Each encoder
//! is a named guess; callers try them one at a time (or all in order) and
//! watch the hardware.

use crate::packet::{self, Packet, REPORT_ID};

#[derive(Debug, Clone, Copy)]
pub struct LedEncoder {
    pub name: &'static str,
    pub description: &'static str,
    build: fn(u8) -> Vec<Packet>,
}

impl LedEncoder {
    pub fn packets(&self, mode: u8) -> Vec<Packet> {
        (self.build)(mode)
    }
}

fn led_finish() -> Packet {
    Packet::template([REPORT_ID, packet::CMD_LED_FINISH[0], packet::CMD_LED_FINISH[1]])
}

fn b0_18(mode: u8) -> Vec<Packet> {
    vec![
        packet::begin(),
        Packet::template([REPORT_ID, 0xB0, 0x18, mode]),
        led_finish(),
    ]
}

fn fe_b0_layer(mode: u8) -> Vec<Packet> {
    // Layer 1, LED sub-command 0x08, mode in the low nibble of byte 9.
    vec![
        packet::begin(),
        Packet::template([REPORT_ID, 0xFE, 0xB0, 0x01, 0x08, 0, 0, 0, 0, mode]),
        led_finish(),
    ]
}

fn b0_direct(mode: u8) -> Vec<Packet> {
    vec![
        packet::begin(),
        Packet::template([REPORT_ID, 0xB0, mode]),
        led_finish(),
    ]
}

fn b0_18_commit(mode: u8) -> Vec<Packet> {
    vec![
        packet::begin(),
        Packet::template([REPORT_ID, 0xB0, 0x18, mode]),
        packet::commit(),
    ]
}

/// Ordered list of layouts; the first entry is the default.
pub static LED_ENCODERS: &[LedEncoder] = &[
    LedEncoder {
        name: "b0-18",
        description: "begin, b0 18 <mode>, led finish (aa a1)",
        build: b0_18,
    },
    LedEncoder {
        name: "fe-b0",
        description: "begin, fe b0 01 08 .. <mode>, led finish (884x-style layer frame)",
        build: fe_b0_layer,
    },
    LedEncoder {
        name: "b0-direct",
        description: "begin, b0 <mode>, led finish",
        build: b0_direct,
    },
    LedEncoder {
        name: "b0-18-commit",
        description: "begin, b0 18 <mode>, key commit (aa aa)",
        build: b0_18_commit,
    },
];

pub fn default_encoder() -> &'static LedEncoder {
    &LED_ENCODERS[0]
}

pub fn find_encoder(name: &str) -> Option<&'static LedEncoder> {
    LED_ENCODERS
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
}
