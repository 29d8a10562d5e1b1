//! Connection lifecycle and the protocol operations of the pad.
//!
//! `connect` is best effort per interface: a kernel driver that cannot be
//! detached or an interface that cannot be claimed is logged and recorded,
//! never fatal. Everything that was changed on the host is undone by
//! `disconnect` (or on drop).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::KeyAction;
use crate::button::Button;
use crate::config::DeviceConfig;
use crate::error::{MiniKbError, Result};
use crate::led::{self, LedEncoder};
use crate::monitor::{InputMonitor, MonitorEvent, MonitorOptions};
use crate::packet::{self, Packet};
use crate::programmer::KeyProgrammer;
use crate::transport::{InterfaceInfo, UsbBackend, UsbHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceStep {
    QueryKernelDriver,
    DetachKernelDriver,
    Claim,
    Release,
    ReattachKernelDriver,
}

impl fmt::Display for InterfaceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterfaceStep::QueryKernelDriver => "query kernel driver",
            InterfaceStep::DetachKernelDriver => "detach kernel driver",
            InterfaceStep::Claim => "claim",
            InterfaceStep::Release => "release",
            InterfaceStep::ReattachKernelDriver => "reattach kernel driver",
        })
    }
}

/// Result of one best-effort step on one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceOutcome {
    pub interface: u8,
    pub step: InterfaceStep,
    pub result: std::result::Result<(), rusb::Error>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEndpoint {
    pub address: u8,
    pub max_packet_size: u16,
    /// `None` for the hardcoded fallback endpoint.
    pub interface: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectReport {
    pub interfaces: Vec<InterfaceOutcome>,
    pub endpoints: Vec<InputEndpoint>,
    pub used_fallback_endpoint: bool,
}

/// Public state of a session, for inspection and comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub connected: bool,
    pub claimed_interfaces: Vec<u8>,
    pub detached_interfaces: Vec<u8>,
    pub input_endpoints: Vec<InputEndpoint>,
}

/// Read-only view on an open session, shared with the input monitor.
pub struct InputReader<H> {
    handle: Arc<H>,
    endpoints: Arc<[InputEndpoint]>,
}

impl<H> Clone for InputReader<H> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            endpoints: Arc::clone(&self.endpoints),
        }
    }
}

/// Everything one polling pass produced. An error on one endpoint does not
/// discard data read from the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadCycle {
    pub reports: Vec<(u8, Vec<u8>)>,
    pub errors: Vec<(u8, rusb::Error)>,
}

impl ReadCycle {
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty() && self.errors.is_empty()
    }
}

impl<H: UsbHandle> InputReader<H> {
    pub fn endpoints(&self) -> &[InputEndpoint] {
        &self.endpoints
    }

    /// One bounded read per endpoint. Timeouts mean "nothing new" and are
    /// dropped; other errors are collected per endpoint and polling moves on.
    pub fn read(&self, timeout: Duration) -> ReadCycle {
        let mut cycle = ReadCycle::default();
        for ep in self.endpoints.iter() {
            let mut buf = vec![0u8; usize::from(ep.max_packet_size.max(1))];
            match self.handle.read_interrupt(ep.address, &mut buf, timeout) {
                Ok(0) => {}
                Ok(len) => {
                    buf.truncate(len);
                    debug!(endpoint = ep.address, "read {}", hex::encode(&buf));
                    cycle.reports.push((ep.address, buf));
                }
                Err(rusb::Error::Timeout) => {}
                Err(e) => {
                    debug!(endpoint = ep.address, "read failed: {}", e);
                    cycle.errors.push((ep.address, e));
                }
            }
        }
        cycle
    }
}

pub struct DeviceSession<B: UsbBackend> {
    backend: B,
    config: DeviceConfig,
    state: SessionState,
    handle: Option<Arc<B::Handle>>,
    claimed: Vec<u8>,
    detached: Vec<u8>,
    endpoints: Vec<InputEndpoint>,
}

impl<B: UsbBackend> DeviceSession<B> {
    pub fn new(backend: B, config: DeviceConfig) -> Self {
        Self {
            backend,
            config,
            state: SessionState::Disconnected,
            handle: None,
            claimed: Vec::new(),
            detached: Vec::new(),
            endpoints: Vec::new(),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected && self.handle.is_some()
    }

    pub fn claimed_interfaces(&self) -> &[u8] {
        &self.claimed
    }

    pub fn detached_interfaces(&self) -> &[u8] {
        &self.detached
    }

    pub fn input_endpoints(&self) -> &[InputEndpoint] {
        &self.endpoints
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            connected: self.is_connected(),
            claimed_interfaces: self.claimed.clone(),
            detached_interfaces: self.detached.clone(),
            input_endpoints: self.endpoints.clone(),
        }
    }

    pub fn connect(&mut self) -> Result<ConnectReport> {
        if self.state != SessionState::Disconnected {
            return Err(MiniKbError::AlreadyConnected);
        }
        self.state = SessionState::Connecting;

        let (vendor_id, product_id) = (self.config.vendor_id, self.config.product_id);
        let handle = match self.backend.open(vendor_id, product_id) {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                self.state = SessionState::Disconnected;
                return Err(MiniKbError::DeviceNotFound {
                    vendor_id,
                    product_id,
                });
            }
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
        };

        let interfaces = match handle.interfaces() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e.into());
            }
        };
        debug!("device has {} interface(s)", interfaces.len());

        let mut outcomes = Vec::new();
        for iface in &interfaces {
            self.take_interface(&handle, iface.number, &mut outcomes);
        }

        let (endpoints, used_fallback) = self.resolve_endpoints(&interfaces);
        self.endpoints = endpoints;
        self.handle = Some(Arc::new(handle));

        if let Err(e) = self.send(&[packet::init()]) {
            warn!("handshake failed, rolling back: {}", e);
            self.teardown();
            return Err(e);
        }

        self.state = SessionState::Connected;
        info!(
            claimed = ?self.claimed,
            detached = ?self.detached,
            "connected to {:04x}:{:04x}",
            vendor_id,
            product_id
        );

        Ok(ConnectReport {
            interfaces: outcomes,
            endpoints: self.endpoints.clone(),
            used_fallback_endpoint: used_fallback,
        })
    }

    fn take_interface(
        &mut self,
        handle: &B::Handle,
        iface: u8,
        outcomes: &mut Vec<InterfaceOutcome>,
    ) {
        match handle.kernel_driver_active(iface) {
            Ok(true) => {
                let result = handle.detach_kernel_driver(iface);
                match result {
                    Ok(()) => {
                        debug!("detached kernel driver from interface {}", iface);
                        self.detached.push(iface);
                    }
                    Err(e) => {
                        warn!("could not detach kernel driver from interface {}: {}", iface, e)
                    }
                }
                outcomes.push(InterfaceOutcome {
                    interface: iface,
                    step: InterfaceStep::DetachKernelDriver,
                    result,
                });
            }
            Ok(false) => {}
            // Not supported on every platform.
            Err(rusb::Error::NotSupported) => {}
            Err(e) => {
                warn!("kernel driver query failed on interface {}: {}", iface, e);
                outcomes.push(InterfaceOutcome {
                    interface: iface,
                    step: InterfaceStep::QueryKernelDriver,
                    result: Err(e),
                });
            }
        }

        let result = handle.claim_interface(iface);
        match result {
            Ok(()) => {
                debug!("claimed interface {}", iface);
                self.claimed.push(iface);
            }
            Err(e) => warn!("could not claim interface {}: {}", iface, e),
        }
        outcomes.push(InterfaceOutcome {
            interface: iface,
            step: InterfaceStep::Claim,
            result,
        });
    }

    /// Interrupt IN endpoints of the claimed interfaces. An unclaimed
    /// interface cannot be read, so its endpoints are left out.
    fn resolve_endpoints(&self, interfaces: &[InterfaceInfo]) -> (Vec<InputEndpoint>, bool) {
        let endpoints: Vec<InputEndpoint> = interfaces
            .iter()
            .filter(|iface| {
                let claimed = self.claimed.contains(&iface.number);
                if !claimed {
                    debug!("skipping endpoints of unclaimed interface {}", iface.number);
                }
                claimed
            })
            .flat_map(|iface| {
                iface
                    .endpoints
                    .iter()
                    .filter(|ep| ep.is_interrupt_in())
                    .map(move |ep| InputEndpoint {
                        address: ep.address,
                        max_packet_size: ep.max_packet_size,
                        interface: Some(iface.number),
                    })
            })
            .collect();

        if endpoints.is_empty() {
            warn!(
                "no interrupt IN endpoint found, using 0x{:02x}",
                self.config.fallback_in_endpoint
            );
            let fallback = InputEndpoint {
                address: self.config.fallback_in_endpoint,
                max_packet_size: self.config.fallback_in_packet_size,
                interface: None,
            };
            return (vec![fallback], true);
        }
        (endpoints, false)
    }

    /// Releases claims, reattaches drivers and clears all state.
    ///
    /// Refused with [`MiniKbError::ReaderActive`] while an [`InputReader`]
    /// (or a monitor holding one) is alive; the session stays connected.
    pub fn disconnect(&mut self) -> Result<Vec<InterfaceOutcome>> {
        if self.state == SessionState::Disconnected && self.handle.is_none() {
            return Ok(Vec::new());
        }
        let readers = self.reader_count();
        if readers > 0 {
            return Err(MiniKbError::ReaderActive(readers));
        }
        self.state = SessionState::Disconnecting;
        let outcomes = self.teardown();
        info!("disconnected");
        Ok(outcomes)
    }

    /// Number of live [`InputReader`]s sharing the handle.
    pub fn reader_count(&self) -> usize {
        self.handle
            .as_ref()
            .map_or(0, |handle| Arc::strong_count(handle) - 1)
    }

    fn teardown(&mut self) -> Vec<InterfaceOutcome> {
        let mut outcomes = Vec::new();
        if let Some(handle) = self.handle.take() {
            for iface in self.claimed.drain(..) {
                let result = handle.release_interface(iface);
                if let Err(e) = result {
                    warn!("could not release interface {}: {}", iface, e);
                }
                outcomes.push(InterfaceOutcome {
                    interface: iface,
                    step: InterfaceStep::Release,
                    result,
                });
            }
            for iface in self.detached.drain(..) {
                let result = handle.attach_kernel_driver(iface);
                if let Err(e) = result {
                    warn!("could not reattach kernel driver to interface {}: {}", iface, e);
                }
                outcomes.push(InterfaceOutcome {
                    interface: iface,
                    step: InterfaceStep::ReattachKernelDriver,
                    result,
                });
            }
        }
        self.claimed.clear();
        self.detached.clear();
        self.endpoints.clear();
        self.state = SessionState::Disconnected;
        outcomes
    }

    fn handle(&self) -> Result<&Arc<B::Handle>> {
        self.handle.as_ref().ok_or(MiniKbError::NotConnected)
    }

    fn send(&self, packets: &[Packet]) -> Result<()> {
        let handle = self.handle()?;
        for packet in packets {
            debug!(
                endpoint = self.config.out_endpoint,
                "send {} [{}]",
                packet.short_hex(),
                packet::describe(packet)
            );
            let written = handle.write_interrupt(
                self.config.out_endpoint,
                packet.as_bytes(),
                self.config.write_timeout(),
            )?;
            if written != packet::PACKET_LEN {
                warn!("short write: {} of {} bytes", written, packet::PACKET_LEN);
            }
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MiniKbError::NotConnected)
        }
    }

    pub fn set_key(&mut self, button: Button, action: KeyAction) -> Result<()> {
        self.ensure_connected()?;
        self.send(&packet::key_sequence(button, action))?;
        info!(
            "{} -> {} (mod=0x{:02x} key=0x{:02x})",
            button,
            action,
            action.modifiers,
            action.keycode
        );
        Ok(())
    }

    /// Experimental: the meaning of `mode` is unknown.
    pub fn set_led_mode(&mut self, mode: u8) -> Result<Vec<Packet>> {
        self.set_led_mode_with(led::default_encoder(), mode)
    }

    pub fn set_led_mode_with(&mut self, encoder: &LedEncoder, mode: u8) -> Result<Vec<Packet>> {
        self.ensure_connected()?;
        let packets = encoder.packets(mode);
        self.send(&packets)?;
        info!(
            encoder = encoder.name,
            "LED mode 0x{:02x} sent: {}",
            mode,
            packets.iter().map(Packet::short_hex).collect::<Vec<_>>().join(" ")
        );
        Ok(packets)
    }

    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<Packet> {
        self.ensure_connected()?;
        let packet = Packet::encode(bytes)?;
        self.send(&[packet])?;
        Ok(packet)
    }

    pub fn reader(&self) -> Result<InputReader<B::Handle>> {
        self.ensure_connected()?;
        Ok(InputReader {
            handle: Arc::clone(self.handle()?),
            endpoints: self.endpoints.clone().into(),
        })
    }

    pub fn read_input(&self, timeout: Duration) -> Result<ReadCycle> {
        Ok(self.reader()?.read(timeout))
    }

    pub fn start_monitor<F>(&self, options: MonitorOptions, on_event: F) -> Result<InputMonitor>
    where
        F: FnMut(MonitorEvent) + Send + 'static,
    {
        InputMonitor::start(self.reader()?, options, on_event)
    }
}

impl<B: UsbBackend> KeyProgrammer for DeviceSession<B> {
    fn set_key(&mut self, button: Button, action: KeyAction) -> Result<()> {
        DeviceSession::set_key(self, button, action)
    }
}

impl<B: UsbBackend> Drop for DeviceSession<B> {
    fn drop(&mut self) {
        // Best-effort: restore any kernel drivers we detached.
        if self.handle.is_some() {
            let readers = self.reader_count();
            if readers > 0 {
                warn!("{} input reader(s) still alive while dropping the session", readers);
            }
            self.state = SessionState::Disconnecting;
            self.teardown();
        }
    }
}
