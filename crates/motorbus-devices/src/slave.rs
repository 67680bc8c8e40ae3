use motorbus_bus::{Bus, Result};
use motorbus_frame::{Command, DeviceFamily, GenericRecord, UnitAddress};
use motorbus_transport::Transport;

use crate::request;

/// A generic slave unit exchanging raw data bytes.
pub struct SlaveUnit<'b, T: Transport> {
    bus: &'b mut Bus<T>,
    unit: UnitAddress,
}

impl<'b, T: Transport> SlaveUnit<'b, T> {
    pub fn new(bus: &'b mut Bus<T>, unit: UnitAddress) -> Result<Self> {
        request::check_family(&unit, DeviceFamily::Slave)?;
        Ok(Self { bus, unit })
    }

    pub fn at(bus: &'b mut Bus<T>, local: u8) -> Result<Self> {
        let unit = UnitAddress::new(DeviceFamily::Slave, local)?;
        Self::new(bus, unit)
    }

    pub fn unit(&self) -> &UnitAddress {
        &self.unit
    }

    /// Status reply; `mode` carries the slave's type number.
    pub fn status(&mut self) -> Result<GenericRecord> {
        let response = request::query_status(self.bus, &self.unit)?;
        Ok(response.payload.into_generic()?)
    }

    /// Send up to 7 raw bytes.
    pub fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let command = Command::slave_data(data)?;
        request::command(self.bus, &self.unit, command)
    }
}
