//! Device handles for each controller family on a motor-controller bus.
//!
//! Each handle borrows the shared [`Bus`](motorbus_bus::Bus) for as long as
//! it lives, so only one command is ever in flight. Arguments are checked
//! before anything is written.
//!
//! ```no_run
//! use motorbus_bus::Bus;
//! use motorbus_devices::DriveController;
//! use motorbus_transport::SerialPort;
//!
//! let port = SerialPort::open("/dev/ttyACM0", SerialPort::DEFAULT_BAUD)?;
//! let mut bus = Bus::new(port);
//! let mut drive = DriveController::at(&mut bus, 1)?;
//! drive.pwm(false, 500)?;
//! println!("{:?}", drive.status()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod drive;
pub mod dual;
pub mod light;
pub mod servo;
pub mod slave;

mod request;

pub use request::query_status;

pub use drive::DriveController;
pub use dual::DualDriver;
pub use light::LightController;
pub use servo::ServoDriver;
pub use slave::SlaveUnit;
