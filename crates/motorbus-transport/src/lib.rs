//! Byte transports for motor-controller buses.
//!
//! Provides a unified interface over the ways a host reaches the bus:
//! - Serial ttys (CDC-ACM / USB-serial adapters)
//! - Bridge sockets (Unix domain sockets relaying raw frames)
//! - USB bulk endpoints, behind the `usb` feature
//!
//! This is the lowest layer of motorbus. Everything else builds on top of
//! the [`Transport`] trait provided here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod serial;
#[cfg(unix)]
pub mod uds;
#[cfg(feature = "usb")]
pub mod usb;

pub use error::{Result, TransportError};
pub use traits::{BusStream, Transport};

#[cfg(unix)]
pub use serial::SerialPort;
#[cfg(unix)]
pub use uds::BridgeSocket;
#[cfg(feature = "usb")]
pub use usb::UsbBulk;
