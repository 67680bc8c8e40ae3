//! Direct USB bulk access to a bus adapter, without a CDC-ACM tty.
//!
//! The adapter exposes one bulk endpoint pair on a vendor interface. Bulk
//! transfers keep packet boundaries, so each read returns at most one frame.

use std::time::Duration;

use rusb::constants::{LIBUSB_ENDPOINT_IN, LIBUSB_ENDPOINT_OUT};
use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Vendor id of the stock bus adapter.
pub const DEFAULT_VID: u16 = 0x0483;

/// Product id of the stock bus adapter.
pub const DEFAULT_PID: u16 = 0x5740;

/// Interface carrying the bulk endpoints.
pub const DEFAULT_INTERFACE: u8 = 1;

const EP1: u8 = 1;
const EP1_OUT: u8 = LIBUSB_ENDPOINT_OUT | EP1;
const EP1_IN: u8 = LIBUSB_ENDPOINT_IN | EP1;

/// libusb treats a zero timeout as "wait forever".
const MIN_USB_TIMEOUT: Duration = Duration::from_millis(1);

/// A claimed bulk interface on a USB bus adapter.
pub struct UsbBulk {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
}

impl UsbBulk {
    /// Open the first device matching `vid:pid` and claim `interface`.
    ///
    /// A kernel driver bound to the interface is detached where the
    /// platform allows it.
    pub fn open(vid: u16, pid: u16, interface: u8) -> Result<Self> {
        let mut handle = rusb::open_device_with_vid_pid(vid, pid)
            .ok_or(TransportError::DeviceNotFound { vid, pid })?;

        if let Err(err) = handle.set_auto_detach_kernel_driver(true) {
            debug!(%err, "kernel driver auto-detach unavailable");
        }
        handle.claim_interface(interface).map_err(usb_error)?;

        info!(vid, pid, interface, "usb adapter claimed");
        Ok(Self { handle, interface })
    }

    /// Open the stock adapter.
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_VID, DEFAULT_PID, DEFAULT_INTERFACE)
    }

    pub fn interface(&self) -> u8 {
        self.interface
    }
}

impl Transport for UsbBulk {
    fn write_bulk(&mut self, buf: &[u8], timeout: Duration) -> Result<usize> {
        let written = self
            .handle
            .write_bulk(EP1_OUT, buf, timeout.max(MIN_USB_TIMEOUT))
            .map_err(usb_error)?;
        trace!(written, len = buf.len(), "usb write");
        Ok(written)
    }

    fn read_bulk(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let read = self
            .handle
            .read_bulk(EP1_IN, buf, timeout.max(MIN_USB_TIMEOUT))
            .map_err(usb_error)?;
        if read == 0 {
            return Err(TransportError::Timeout);
        }
        trace!(read, len = buf.len(), bytes = ?&buf[..read], "usb read");
        Ok(read)
    }

    fn name(&self) -> &'static str {
        "usb-bulk"
    }
}

impl Drop for UsbBulk {
    fn drop(&mut self) {
        if let Err(err) = self.handle.release_interface(self.interface) {
            debug!(%err, interface = self.interface, "usb interface release failed");
        }
    }
}

impl std::fmt::Debug for UsbBulk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsbBulk")
            .field("interface", &self.interface)
            .finish()
    }
}

fn usb_error(err: rusb::Error) -> TransportError {
    match err {
        rusb::Error::Timeout => TransportError::Timeout,
        rusb::Error::NoDevice => TransportError::Shutdown,
        other => TransportError::Usb(other),
    }
}
