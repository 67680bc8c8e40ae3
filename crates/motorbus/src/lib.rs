//! Drive addressable motor-controller boards over one shared bus.
//!
//! Drive controllers, dual-output drivers, servo drivers, indicator lights
//! and generic slaves all hang off one half-duplex serial line. motorbus
//! frames their commands, addresses them, and sorts out which response
//! belongs to which request.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte transports (serial tty, bridge socket, USB bulk behind `usb`)
//! - [`frame`]: Fixed-size framing, addressing, typed commands and response decoding
//! - [`bus`]: Request/response exchange with the pending-response queue
//! - [`devices`]: Per-family device handles (behind `devices` feature)

/// Re-export transport types.
pub mod transport {
    pub use motorbus_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use motorbus_frame::*;
}

/// Re-export bus types.
pub mod bus {
    pub use motorbus_bus::*;
}

/// Re-export device handles (requires `devices` feature).
#[cfg(feature = "devices")]
pub mod devices {
    pub use motorbus_devices::*;
}
