//! Scripted USB backend for exercising sessions without hardware.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use minikb::transport::{EndpointInfo, InterfaceInfo, UsbBackend, UsbHandle};
use parking_lot::Mutex;
use rusb::{Direction, TransferType};

#[derive(Default)]
pub struct MockState {
    pub present: bool,
    pub interfaces: Vec<InterfaceInfo>,
    pub kernel_active: HashSet<u8>,
    pub claim_fails: HashSet<u8>,
    pub detach_fails: HashSet<u8>,
    /// Fail every write once this many writes have succeeded.
    pub fail_writes_after: Option<usize>,
    pub writes: Vec<Vec<u8>>,
    pub claimed: HashSet<u8>,
    pub reads: VecDeque<(u8, rusb::Result<Vec<u8>>)>,
    /// Times a configuration was selected.
    pub configure_calls: usize,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    pub state: Arc<Mutex<MockState>>,
}

pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

pub fn interrupt_in(address: u8, max_packet_size: u16) -> EndpointInfo {
    EndpointInfo {
        address,
        max_packet_size,
        direction: Direction::In,
        transfer_type: TransferType::Interrupt,
    }
}

pub fn interrupt_out(address: u8) -> EndpointInfo {
    EndpointInfo {
        address,
        max_packet_size: 64,
        direction: Direction::Out,
        transfer_type: TransferType::Interrupt,
    }
}

impl MockBackend {
    /// Two HID interfaces: keyboard (0x81) and consumer/vendor (0x82 + OUT 0x02).
    /// The kernel owns both.
    pub fn keyboard() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock();
            state.present = true;
            state.interfaces = vec![
                InterfaceInfo {
                    number: 0,
                    class_code: 3,
                    endpoints: vec![interrupt_in(0x81, 8)],
                },
                InterfaceInfo {
                    number: 1,
                    class_code: 3,
                    endpoints: vec![interrupt_in(0x82, 64), interrupt_out(0x02)],
                },
            ];
            state.kernel_active = [0, 1].into_iter().collect();
        }
        backend
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn with(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock());
        self
    }

    pub fn push_read(&self, endpoint: u8, data: &[u8]) {
        self.state
            .lock()
            .reads
            .push_back((endpoint, Ok(data.to_vec())));
    }

    pub fn push_read_error(&self, endpoint: u8, error: rusb::Error) {
        self.state.lock().reads.push_back((endpoint, Err(error)));
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Writes with trailing zero padding stripped, hex encoded.
    pub fn write_hex(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| {
                let end = w.iter().rposition(|&b| b != 0).map_or(1, |i| i + 1);
                hex::encode(&w[..end])
            })
            .collect()
    }

    pub fn kernel_active(&self) -> HashSet<u8> {
        self.state.lock().kernel_active.clone()
    }

    pub fn claimed(&self) -> HashSet<u8> {
        self.state.lock().claimed.clone()
    }

    pub fn configure_calls(&self) -> usize {
        self.state.lock().configure_calls
    }
}

impl UsbBackend for MockBackend {
    type Handle = MockHandle;

    fn open(&self, _vendor_id: u16, _product_id: u16) -> rusb::Result<Option<MockHandle>> {
        if !self.state.lock().present {
            return Ok(None);
        }
        Ok(Some(MockHandle {
            state: Arc::clone(&self.state),
        }))
    }
}

impl UsbHandle for MockHandle {
    fn descriptors(&self) -> rusb::Result<Vec<InterfaceInfo>> {
        Ok(self.state.lock().interfaces.clone())
    }

    fn ensure_configured(&self) -> rusb::Result<()> {
        self.state.lock().configure_calls += 1;
        Ok(())
    }

    fn kernel_driver_active(&self, iface: u8) -> rusb::Result<bool> {
        Ok(self.state.lock().kernel_active.contains(&iface))
    }

    fn detach_kernel_driver(&self, iface: u8) -> rusb::Result<()> {
        let mut state = self.state.lock();
        if state.detach_fails.contains(&iface) {
            return Err(rusb::Error::Access);
        }
        state.kernel_active.remove(&iface);
        Ok(())
    }

    fn attach_kernel_driver(&self, iface: u8) -> rusb::Result<()> {
        self.state.lock().kernel_active.insert(iface);
        Ok(())
    }

    fn claim_interface(&self, iface: u8) -> rusb::Result<()> {
        let mut state = self.state.lock();
        if state.claim_fails.contains(&iface) {
            return Err(rusb::Error::Busy);
        }
        state.claimed.insert(iface);
        Ok(())
    }

    fn release_interface(&self, iface: u8) -> rusb::Result<()> {
        self.state.lock().claimed.remove(&iface);
        Ok(())
    }

    fn write_interrupt(
        &self,
        _endpoint: u8,
        data: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        let mut state = self.state.lock();
        if let Some(limit) = state.fail_writes_after {
            if state.writes.len() >= limit {
                return Err(rusb::Error::Pipe);
            }
        }
        state.writes.push(data.to_vec());
        Ok(data.len())
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        let next = {
            let mut state = self.state.lock();
            match state.reads.front() {
                Some((ep, _)) if *ep == endpoint => state.reads.pop_front(),
                _ => None,
            }
        };
        match next {
            Some((_, Ok(data))) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(len)
            }
            Some((_, Err(e))) => Err(e),
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(2)));
                Err(rusb::Error::Timeout)
            }
        }
    }
}
