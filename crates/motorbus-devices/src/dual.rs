use motorbus_bus::{Bus, Result};
use motorbus_frame::{Command, DeviceFamily, StatusRecord, UnitAddress};
use motorbus_transport::Transport;

use crate::request;

/// A dual-output driver (two independently powered outputs).
pub struct DualDriver<'b, T: Transport> {
    bus: &'b mut Bus<T>,
    unit: UnitAddress,
}

impl<'b, T: Transport> DualDriver<'b, T> {
    pub fn new(bus: &'b mut Bus<T>, unit: UnitAddress) -> Result<Self> {
        request::check_family(&unit, DeviceFamily::Dual)?;
        Ok(Self { bus, unit })
    }

    pub fn at(bus: &'b mut Bus<T>, local: u8) -> Result<Self> {
        let unit = UnitAddress::new(DeviceFamily::Dual, local)?;
        Self::new(bus, unit)
    }

    pub fn unit(&self) -> &UnitAddress {
        &self.unit
    }

    pub fn status(&mut self) -> Result<StatusRecord> {
        let response = request::query_status(self.bus, &self.unit)?;
        Ok(response.payload.into_status()?)
    }

    /// Set both outputs at once.
    pub fn powers(&mut self, port0: u16, port1: u16) -> Result<()> {
        request::command(self.bus, &self.unit, Command::DualPower { port0, port1 })
    }

    /// Set output `port` (0 or 1) alone; the other keeps its power.
    pub fn power(&mut self, port: u8, power: u16) -> Result<()> {
        request::command(self.bus, &self.unit, Command::DualSinglePower { port, power })
    }

    /// Drive output `port` at `power` until its limit switch closes, then hold `after_power`.
    pub fn limit_switch(&mut self, port: u8, power: u16, after_power: u16) -> Result<()> {
        let command = Command::DualLimitSwitch {
            port,
            power,
            after_power,
        };
        request::command(self.bus, &self.unit, command)
    }
}
