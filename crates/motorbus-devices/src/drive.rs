use std::time::Duration;

use motorbus_bus::{Bus, Result};
use motorbus_frame::{Command, DeviceFamily, ResponseStatus, StatusRecord, UnitAddress};
use motorbus_transport::Transport;

use crate::request;

/// A single-motor drive controller.
///
/// Motion commands return as soon as the frame is written; use
/// [`wait_finish`](Self::wait_finish) to block until the controller reports
/// the command done.
pub struct DriveController<'b, T: Transport> {
    bus: &'b mut Bus<T>,
    unit: UnitAddress,
}

impl<'b, T: Transport> DriveController<'b, T> {
    pub fn new(bus: &'b mut Bus<T>, unit: UnitAddress) -> Result<Self> {
        request::check_family(&unit, DeviceFamily::Drive)?;
        Ok(Self { bus, unit })
    }

    /// The primary channel of the controller at `local`.
    pub fn at(bus: &'b mut Bus<T>, local: u8) -> Result<Self> {
        let unit = UnitAddress::new(DeviceFamily::Drive, local)?;
        Self::new(bus, unit)
    }

    pub fn unit(&self) -> &UnitAddress {
        &self.unit
    }

    /// Reset the controller's encoder and motion state.
    pub fn init(&mut self) -> Result<()> {
        request::command(self.bus, &self.unit, Command::DriveInit)
    }

    pub fn status(&mut self) -> Result<StatusRecord> {
        let response = request::query_status(self.bus, &self.unit)?;
        Ok(response.payload.into_status()?)
    }

    /// Drive at a raw PWM duty. `phase` selects the direction.
    pub fn pwm(&mut self, phase: bool, power: u16) -> Result<()> {
        request::command(self.bus, &self.unit, Command::DrivePwm { phase, power })
    }

    /// Run at `speed` until the encoder reaches `end` or `timeout_ms` passes.
    pub fn speed(&mut self, phase: bool, speed: u16, end: u16, timeout_ms: u16) -> Result<()> {
        let command = Command::DriveSpeed {
            phase,
            speed,
            end,
            timeout_ms,
        };
        request::command(self.bus, &self.unit, command)
    }

    /// Turn to a signed target angle. The magnitude must fit in 16 bits.
    pub fn angle(&mut self, angle: i32, speed: u16, timeout_ms: u16) -> Result<()> {
        let command = Command::DriveAngle {
            angle,
            speed,
            timeout_ms,
        };
        request::command(self.bus, &self.unit, command)
    }

    /// Run at `power` until the limit switch on `port` (0 or 1) closes.
    pub fn limit_switch(&mut self, phase: bool, power: u16, port: u8, timeout_ms: u16) -> Result<()> {
        let command = Command::DriveLimitSwitch {
            phase,
            power,
            port,
            timeout_ms,
        };
        request::command(self.bus, &self.unit, command)
    }

    /// Block until the controller reports the command sent in `mode` finished.
    ///
    /// Returns how it finished: success, device-side timeout, interruption.
    pub fn wait_finish(&mut self, mode: u8, timeout: Duration) -> Result<ResponseStatus> {
        let response = request::wait_finish(self.bus, &self.unit, mode, timeout)?;
        Ok(response.status)
    }
}
