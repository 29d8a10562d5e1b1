//! Connect / disconnect behaviour and the bytes put on the wire.

mod common;

use std::time::Duration;

use common::{interrupt_out, MockBackend};
use minikb::session::InterfaceStep;
use minikb::transport::InterfaceInfo;
use minikb::probe::{self, ProbeResult};
use minikb::{
    parse_action, Button, DeviceConfig, DeviceSession, KeyAction, MiniKbError, SessionState,
};

fn session(backend: &MockBackend) -> DeviceSession<MockBackend> {
    DeviceSession::new(backend.clone(), DeviceConfig::default())
}

#[test]
fn connect_claims_every_interface_and_sends_init() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);

    let report = session.connect().unwrap();

    assert!(session.is_connected());
    assert_eq!(session.claimed_interfaces(), &[0, 1]);
    assert_eq!(session.detached_interfaces(), &[0, 1]);
    let endpoints: Vec<u8> = report.endpoints.iter().map(|e| e.address).collect();
    assert_eq!(endpoints, vec![0x81, 0x82]);
    assert!(!report.used_fallback_endpoint);
    assert!(report.interfaces.iter().all(|o| o.result.is_ok()));
    assert_eq!(backend.write_hex(), vec!["03"]);
    assert!(backend.kernel_active().is_empty());
    assert_eq!(backend.configure_calls(), 1);
}

#[test]
fn disconnect_restores_pre_connect_state() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    let before = session.snapshot();
    let kernel_before = backend.kernel_active();

    session.connect().unwrap();
    let outcomes = session.disconnect().unwrap();

    assert_eq!(session.snapshot(), before);
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(backend.kernel_active(), kernel_before);
    assert!(backend.claimed().is_empty());
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert_eq!(
        outcomes.iter().filter(|o| o.step == InterfaceStep::Release).count(),
        2
    );
}

#[test]
fn disconnect_without_connect_is_a_no_op() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    assert!(session.disconnect().unwrap().is_empty());
    assert!(session.disconnect().unwrap().is_empty());
    assert!(backend.writes().is_empty());
}

#[test]
fn drop_reattaches_kernel_drivers() {
    let backend = MockBackend::keyboard();
    {
        let mut session = session(&backend);
        session.connect().unwrap();
        assert!(backend.kernel_active().is_empty());
    }
    assert_eq!(backend.kernel_active().len(), 2);
    assert!(backend.claimed().is_empty());
}

#[test]
fn claim_failure_is_recorded_not_fatal() {
    let backend = MockBackend::keyboard().with(|s| {
        s.claim_fails.insert(0);
    });
    let mut session = session(&backend);

    let report = session.connect().unwrap();

    assert_eq!(session.claimed_interfaces(), &[1]);
    let failed: Vec<_> = report.interfaces.iter().filter(|o| o.result.is_err()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].interface, 0);
    assert_eq!(failed[0].step, InterfaceStep::Claim);
    assert_eq!(failed[0].result, Err(rusb::Error::Busy));
    // Interface 0 is unclaimed, so its endpoint is not polled.
    let endpoints: Vec<u8> = report.endpoints.iter().map(|e| e.address).collect();
    assert_eq!(endpoints, vec![0x82]);
    assert!(!report.used_fallback_endpoint);

    session.disconnect().unwrap();
    // Detached but unclaimed interfaces still get their driver back.
    assert_eq!(backend.kernel_active().len(), 2);
}

#[test]
fn detach_failure_still_attempts_claim() {
    let backend = MockBackend::keyboard().with(|s| {
        s.detach_fails.insert(1);
    });
    let mut session = session(&backend);

    let report = session.connect().unwrap();

    assert_eq!(session.detached_interfaces(), &[0]);
    assert_eq!(session.claimed_interfaces(), &[0, 1]);
    assert!(report.interfaces.iter().any(|o| {
        o.interface == 1 && o.step == InterfaceStep::DetachKernelDriver && o.result.is_err()
    }));
}

#[test]
fn missing_input_endpoints_fall_back() {
    let backend = MockBackend::keyboard().with(|s| {
        s.interfaces = vec![InterfaceInfo {
            number: 0,
            class_code: 3,
            endpoints: vec![interrupt_out(0x02)],
        }];
    });
    let mut session = session(&backend);

    let report = session.connect().unwrap();

    assert!(report.used_fallback_endpoint);
    assert_eq!(report.endpoints.len(), 1);
    assert_eq!(report.endpoints[0].address, 0x81);
    assert_eq!(report.endpoints[0].max_packet_size, 8);
    assert_eq!(report.endpoints[0].interface, None);
}

#[test]
fn failed_handshake_rolls_back() {
    let backend = MockBackend::keyboard().with(|s| s.fail_writes_after = Some(0));
    let mut session = session(&backend);
    let before = session.snapshot();

    let err = session.connect().unwrap_err();

    assert!(matches!(err, MiniKbError::Transport(rusb::Error::Pipe)));
    assert_eq!(session.snapshot(), before);
    assert_eq!(backend.kernel_active().len(), 2);
    assert!(backend.claimed().is_empty());
}

#[test]
fn absent_device_reports_ids() {
    let backend = MockBackend::absent();
    let mut session = session(&backend);

    let err = session.connect().unwrap_err();

    assert!(matches!(
        err,
        MiniKbError::DeviceNotFound {
            vendor_id: 0x1189,
            product_id: 0x8890
        }
    ));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[test]
fn second_connect_is_rejected() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    session.connect().unwrap();

    assert!(matches!(session.connect(), Err(MiniKbError::AlreadyConnected)));
    assert!(session.is_connected());
    assert_eq!(backend.writes().len(), 1);
}

#[test]
fn operations_require_a_connection() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);

    assert!(matches!(
        session.set_key(Button::Key1, KeyAction::key(0x04)),
        Err(MiniKbError::NotConnected)
    ));
    assert!(matches!(session.set_led_mode(1), Err(MiniKbError::NotConnected)));
    assert!(matches!(session.send_raw(&[0x03]), Err(MiniKbError::NotConnected)));
    assert!(matches!(session.reader(), Err(MiniKbError::NotConnected)));
    assert!(backend.writes().is_empty());
}

#[test]
fn set_key_writes_full_bracket() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    session.connect().unwrap();

    session
        .set_key(Button::Key1, parse_action("ctrl-c").unwrap())
        .unwrap();

    assert_eq!(
        backend.write_hex()[1..],
        ["03a101", "03011101", "03011101010106", "03aaaa"]
    );
    assert!(backend.writes().iter().all(|w| w.len() == 65));
}

#[test]
fn knob_and_clear_use_their_ids() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    session.connect().unwrap();

    session.set_key(Button::KnobCw, KeyAction::key(0xED)).unwrap();
    session.set_key(Button::Key2, KeyAction::NONE).unwrap();

    assert_eq!(
        backend.write_hex()[1..],
        [
            "03a101",
            "030f1101",
            "030f11010100ed",
            "03aaaa",
            "03a101",
            "030210",
            "03aaaa"
        ]
    );
}

#[test]
fn led_mode_uses_default_encoder() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    session.connect().unwrap();

    let sent = session.set_led_mode(5).unwrap();

    assert_eq!(sent.len(), 3);
    assert_eq!(backend.write_hex()[1..], ["03a101", "03b01805", "03aaa1"]);
}

#[test]
fn raw_frames_are_padded_and_bounded() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    session.connect().unwrap();

    session.send_raw(&[0x03, 0xb0, 0x01]).unwrap();
    assert_eq!(backend.write_hex()[1], "03b001");
    assert_eq!(backend.writes()[1].len(), 65);

    assert!(matches!(
        session.send_raw(&[0u8; 66]),
        Err(MiniKbError::PacketTooLong(66))
    ));
    assert_eq!(backend.writes().len(), 2);
}

#[test]
fn read_input_drops_timeouts() {
    let backend = MockBackend::keyboard();
    let session = {
        let mut session = session(&backend);
        session.connect().unwrap();
        session
    };

    assert!(session.read_input(Duration::from_millis(1)).unwrap().is_empty());

    backend.push_read(0x82, &[0, 0, 0x68, 0]);
    let cycle = session.read_input(Duration::from_millis(1)).unwrap();
    assert_eq!(cycle.reports, vec![(0x82, vec![0, 0, 0x68, 0])]);
    assert!(cycle.errors.is_empty());

    backend.push_read_error(0x81, rusb::Error::NoDevice);
    let cycle = session.read_input(Duration::from_millis(1)).unwrap();
    assert!(cycle.reports.is_empty());
    assert_eq!(cycle.errors, vec![(0x81, rusb::Error::NoDevice)]);
}

#[test]
fn endpoint_error_keeps_reports_from_the_same_cycle() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    session.connect().unwrap();

    backend.push_read(0x81, &[0, 0, 0x68, 0, 0, 0, 0, 0]);
    backend.push_read_error(0x82, rusb::Error::Io);
    let cycle = session.read_input(Duration::from_millis(1)).unwrap();

    assert_eq!(cycle.reports, vec![(0x81, vec![0, 0, 0x68, 0, 0, 0, 0, 0])]);
    assert_eq!(cycle.errors, vec![(0x82, rusb::Error::Io)]);

    // An error on the first endpoint does not stop the second from being read.
    backend.push_read_error(0x81, rusb::Error::Io);
    backend.push_read(0x82, &[0, 0, 0x04, 0]);
    let cycle = session.read_input(Duration::from_millis(1)).unwrap();

    assert_eq!(cycle.reports, vec![(0x82, vec![0, 0, 0x04, 0])]);
    assert_eq!(cycle.errors, vec![(0x81, rusb::Error::Io)]);
}

#[test]
fn disconnect_waits_for_readers() {
    let backend = MockBackend::keyboard();
    let mut session = session(&backend);
    session.connect().unwrap();

    let reader = session.reader().unwrap();
    assert_eq!(session.reader_count(), 1);
    assert!(matches!(
        session.disconnect(),
        Err(MiniKbError::ReaderActive(1))
    ));
    assert!(session.is_connected());
    assert_eq!(session.claimed_interfaces(), &[0, 1]);
    assert_eq!(backend.claimed().len(), 2);

    drop(reader);
    assert_eq!(session.reader_count(), 0);
    let outcomes = session.disconnect().unwrap();
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert!(backend.claimed().is_empty());
    assert_eq!(backend.kernel_active().len(), 2);
}

#[test]
fn drop_restores_drivers_even_with_a_reader_alive() {
    let backend = MockBackend::keyboard();
    let reader = {
        let mut session = session(&backend);
        session.connect().unwrap();
        session.reader().unwrap()
    };

    assert!(backend.claimed().is_empty());
    assert_eq!(backend.kernel_active().len(), 2);
    drop(reader);
}

#[test]
fn descriptor_read_leaves_the_device_unconfigured() {
    let backend = MockBackend::keyboard();
    let mut result = ProbeResult::default();

    probe::read_descriptors(&backend, 0x1189, 0x8890, &mut result);

    assert!(result.device_found);
    assert_eq!(result.usb_interfaces.len(), 2);
    assert!(result.usb_error.is_none());
    assert_eq!(backend.configure_calls(), 0);
    assert!(backend.claimed().is_empty());
    assert_eq!(backend.kernel_active().len(), 2);
}
