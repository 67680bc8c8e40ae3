use motorbus_bus::{Bus, Result};
use motorbus_frame::{Command, DeviceFamily, StatusRecord, UnitAddress};
use motorbus_transport::Transport;

use crate::request;

/// A servo driver with two hobby-servo ports.
pub struct ServoDriver<'b, T: Transport> {
    bus: &'b mut Bus<T>,
    unit: UnitAddress,
}

impl<'b, T: Transport> ServoDriver<'b, T> {
    pub fn new(bus: &'b mut Bus<T>, unit: UnitAddress) -> Result<Self> {
        request::check_family(&unit, DeviceFamily::Servo)?;
        Ok(Self { bus, unit })
    }

    pub fn at(bus: &'b mut Bus<T>, local: u8) -> Result<Self> {
        let unit = UnitAddress::new(DeviceFamily::Servo, local)?;
        Self::new(bus, unit)
    }

    pub fn unit(&self) -> &UnitAddress {
        &self.unit
    }

    pub fn status(&mut self) -> Result<StatusRecord> {
        let response = request::query_status(self.bus, &self.unit)?;
        Ok(response.payload.into_status()?)
    }

    /// Move the servo on `port` (0 or 1).
    pub fn angle(&mut self, port: u8, angle: u8) -> Result<()> {
        request::command(self.bus, &self.unit, Command::ServoAngle { port, angle })
    }

    /// Move both servos in one frame.
    pub fn angles(&mut self, port0: u8, port1: u8) -> Result<()> {
        request::command(self.bus, &self.unit, Command::ServoAngles { port0, port1 })
    }
}
