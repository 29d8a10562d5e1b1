//! USB access behind a small trait seam so the session logic can run against
//! libusb (`rusb`) on real hardware and against scripted devices in tests.

use rusb::{Device, DeviceHandle, Direction, GlobalContext, TransferType};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointInfo {
    pub address: u8,
    pub max_packet_size: u16,
    pub direction: Direction,
    pub transfer_type: TransferType,
}

impl EndpointInfo {
    pub fn is_interrupt_in(&self) -> bool {
        self.direction == Direction::In && self.transfer_type == TransferType::Interrupt
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub number: u8,
    pub class_code: u8,
    pub endpoints: Vec<EndpointInfo>,
}

/// An opened device. All methods take `&self` so one handle can be shared
/// between the control thread and the input monitor.
pub trait UsbHandle: Send + Sync + 'static {
    /// Interface descriptors, read without changing the device.
    fn descriptors(&self) -> rusb::Result<Vec<InterfaceInfo>>;
    /// Selects configuration 1 on an unconfigured device.
    fn ensure_configured(&self) -> rusb::Result<()>;

    /// Interfaces of the active configuration, establishing one if needed.
    fn interfaces(&self) -> rusb::Result<Vec<InterfaceInfo>> {
        self.ensure_configured()?;
        self.descriptors()
    }
    fn kernel_driver_active(&self, iface: u8) -> rusb::Result<bool>;
    fn detach_kernel_driver(&self, iface: u8) -> rusb::Result<()>;
    fn attach_kernel_driver(&self, iface: u8) -> rusb::Result<()>;
    fn claim_interface(&self, iface: u8) -> rusb::Result<()>;
    fn release_interface(&self, iface: u8) -> rusb::Result<()>;
    fn write_interrupt(&self, endpoint: u8, data: &[u8], timeout: Duration)
        -> rusb::Result<usize>;
    fn read_interrupt(&self, endpoint: u8, buf: &mut [u8], timeout: Duration)
        -> rusb::Result<usize>;
}

pub trait UsbBackend {
    type Handle: UsbHandle;

    /// `Ok(None)` when no device with these ids is attached.
    fn open(&self, vendor_id: u16, product_id: u16) -> rusb::Result<Option<Self::Handle>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RusbBackend;

pub struct RusbHandle {
    device: Device<GlobalContext>,
    handle: DeviceHandle<GlobalContext>,
}

impl UsbBackend for RusbBackend {
    type Handle = RusbHandle;

    fn open(&self, vendor_id: u16, product_id: u16) -> rusb::Result<Option<RusbHandle>> {
        for device in rusb::devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(_) => continue,
            };
            if desc.vendor_id() == vendor_id && desc.product_id() == product_id {
                debug!(
                    bus = device.bus_number(),
                    address = device.address(),
                    "opening {:04x}:{:04x}",
                    vendor_id,
                    product_id
                );
                let handle = device.open()?;
                return Ok(Some(RusbHandle { device, handle }));
            }
        }
        Ok(None)
    }
}

impl UsbHandle for RusbHandle {
    fn ensure_configured(&self) -> rusb::Result<()> {
        if self.handle.active_configuration()? == 0 {
            debug!("device unconfigured, selecting configuration 1");
            self.handle.set_active_configuration(1)?;
        }
        Ok(())
    }

    fn descriptors(&self) -> rusb::Result<Vec<InterfaceInfo>> {
        let config = self
            .device
            .active_config_descriptor()
            .or_else(|_| self.device.config_descriptor(0))?;

        let mut interfaces = Vec::new();
        for interface in config.interfaces() {
            let mut info = InterfaceInfo {
                number: interface.number(),
                class_code: 0,
                endpoints: Vec::new(),
            };
            for desc in interface.descriptors() {
                info.class_code = desc.class_code();
                for ep in desc.endpoint_descriptors() {
                    let ep = EndpointInfo {
                        address: ep.address(),
                        max_packet_size: ep.max_packet_size(),
                        direction: ep.direction(),
                        transfer_type: ep.transfer_type(),
                    };
                    if !info.endpoints.contains(&ep) {
                        info.endpoints.push(ep);
                    }
                }
            }
            interfaces.push(info);
        }
        Ok(interfaces)
    }

    fn kernel_driver_active(&self, iface: u8) -> rusb::Result<bool> {
        self.handle.kernel_driver_active(iface)
    }

    fn detach_kernel_driver(&self, iface: u8) -> rusb::Result<()> {
        self.handle.detach_kernel_driver(iface)
    }

    fn attach_kernel_driver(&self, iface: u8) -> rusb::Result<()> {
        self.handle.attach_kernel_driver(iface)
    }

    fn claim_interface(&self, iface: u8) -> rusb::Result<()> {
        self.handle.claim_interface(iface)
    }

    fn release_interface(&self, iface: u8) -> rusb::Result<()> {
        self.handle.release_interface(iface)
    }

    fn write_interrupt(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle.write_interrupt(endpoint, data, timeout)
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle.read_interrupt(endpoint, buf, timeout)
    }
}
