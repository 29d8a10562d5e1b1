//! Device discovery report for the `info` command.
//! Combines the HID view (hidapi) with the raw USB descriptors (libusb).

use hidapi::HidApi;
use rusb::{Direction, TransferType};

use crate::transport::{InterfaceInfo, RusbBackend, UsbBackend, UsbHandle};

#[derive(Debug, Clone)]
pub struct HidInterface {
    pub interface_number: i32,
    pub usage_page: u16,
    pub usage: u16,
    pub path: String,
    pub product: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProbeResult {
    pub device_found: bool,
    pub hid_interfaces: Vec<HidInterface>,
    pub usb_interfaces: Vec<InterfaceInfo>,
    /// Set when the HID layer could not be queried; USB results may still be present.
    pub hid_error: Option<String>,
    pub usb_error: Option<String>,
}

pub fn probe_device(vendor_id: u16, product_id: u16) -> ProbeResult {
    let mut result = ProbeResult::default();

    match HidApi::new() {
        Ok(api) => {
            for info in api.device_list() {
                if info.vendor_id() == vendor_id && info.product_id() == product_id {
                    result.device_found = true;
                    result.hid_interfaces.push(HidInterface {
                        interface_number: info.interface_number(),
                        usage_page: info.usage_page(),
                        usage: info.usage(),
                        path: info.path().to_string_lossy().to_string(),
                        product: info.product_string().map(str::to_string),
                    });
                }
            }
        }
        Err(e) => result.hid_error = Some(e.to_string()),
    }

    read_descriptors(&RusbBackend, vendor_id, product_id, &mut result);
    result
}

/// Fills in the USB half of `result`. The device is opened and its
/// descriptors are read; it is neither configured nor claimed.
pub fn read_descriptors<B: UsbBackend>(
    backend: &B,
    vendor_id: u16,
    product_id: u16,
    result: &mut ProbeResult,
) {
    match backend.open(vendor_id, product_id) {
        Ok(Some(handle)) => {
            result.device_found = true;
            match handle.descriptors() {
                Ok(interfaces) => result.usb_interfaces = interfaces,
                Err(e) => result.usb_error = Some(e.to_string()),
            }
        }
        Ok(None) => {}
        Err(e) => result.usb_error = Some(e.to_string()),
    }
}

pub fn direction_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Out => "OUT",
        Direction::In => "IN",
    }
}

pub fn transfer_label(transfer: TransferType) -> &'static str {
    match transfer {
        TransferType::Control => "Control",
        TransferType::Isochronous => "Isochronous",
        TransferType::Bulk => "Bulk",
        TransferType::Interrupt => "Interrupt",
    }
}
