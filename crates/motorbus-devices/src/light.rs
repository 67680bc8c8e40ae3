use motorbus_bus::{Bus, Result};
use motorbus_frame::{Color, Command, DeviceFamily, LightRecord, UnitAddress};
use motorbus_transport::Transport;

use crate::request;

/// An indicator-light controller: an LED strip plus a switched power output.
///
/// Only [`status`](Self::status) waits for a reply.
pub struct LightController<'b, T: Transport> {
    bus: &'b mut Bus<T>,
    unit: UnitAddress,
}

impl<'b, T: Transport> LightController<'b, T> {
    pub fn new(bus: &'b mut Bus<T>, unit: UnitAddress) -> Result<Self> {
        request::check_family(&unit, DeviceFamily::Light)?;
        Ok(Self { bus, unit })
    }

    pub fn at(bus: &'b mut Bus<T>, local: u8) -> Result<Self> {
        let unit = UnitAddress::new(DeviceFamily::Light, local)?;
        Self::new(bus, unit)
    }

    pub fn unit(&self) -> &UnitAddress {
        &self.unit
    }

    pub fn status(&mut self) -> Result<LightRecord> {
        let response = request::query_status(self.bus, &self.unit)?;
        Ok(response.payload.into_light()?)
    }

    /// Switch the power output on.
    pub fn start(&mut self) -> Result<()> {
        request::command(self.bus, &self.unit, Command::LightStart)
    }

    /// Cut the power output.
    pub fn stop(&mut self) -> Result<()> {
        request::command(self.bus, &self.unit, Command::LightStop)
    }

    /// Show `color`, blinking at `frequency` Hz (0 for steady, steps of 0.25).
    pub fn color(&mut self, color: Color, frequency: f32) -> Result<()> {
        request::command(self.bus, &self.unit, Command::LightColor { color, frequency })
    }

    /// Show a `#RRGGBB` color scaled by `brightness` (0.0..=1.0).
    pub fn color_code(&mut self, code: &str, brightness: f32, frequency: f32) -> Result<()> {
        let color = Color::parse(code)?.scaled(brightness)?;
        self.color(color, frequency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use motorbus_bus::testing::ScriptedTransport;
    use motorbus_bus::BusError;
    use motorbus_frame::mode::light as mode;
    use motorbus_frame::RxFrame;

    #[test]
    fn color_is_sent_green_first() {
        let mut bus = Bus::new(ScriptedTransport::new());
        LightController::at(&mut bus, 0)
            .unwrap()
            .color(Color::new(255, 10, 20), 0.5)
            .unwrap();
        assert_eq!(
            bus.transport().written()[0],
            vec![0x40, 0, mode::COLOR, 0, 10, 255, 20, 2, 0, 0]
        );
        assert_eq!(bus.transport().read_calls(), 0);
    }

    #[test]
    fn color_code_scales_brightness() {
        let mut bus = Bus::new(ScriptedTransport::new());
        LightController::at(&mut bus, 0)
            .unwrap()
            .color_code("#0000FF", 0.5, 0.25)
            .unwrap();
        assert_eq!(
            bus.transport().written()[0][3..8],
            [0, 0, 0, 128, 1]
        );
    }

    #[test]
    fn bad_color_code_rejected_before_io() {
        let mut bus = Bus::new(ScriptedTransport::new());
        let err = LightController::at(&mut bus, 0)
            .unwrap()
            .color_code("blue", 1.0, 0.0)
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidArgument(_)));
        assert!(bus.transport().written().is_empty());
    }

    #[test]
    fn start_stop_are_fire_and_forget() {
        let mut bus = Bus::new(ScriptedTransport::new());
        let mut light = LightController::at(&mut bus, 1).unwrap();
        light.stop().unwrap();
        light.start().unwrap();
        let written = bus.transport().written();
        assert_eq!(written[0][..3], [0x41, 0, mode::STOP]);
        assert_eq!(written[1][..3], [0x41, 0, mode::START]);
        assert_eq!(bus.transport().read_calls(), 0);
    }

    #[test]
    fn status_decodes_light_record() {
        let mut transport = ScriptedTransport::new();
        transport.push_frame(RxFrame::new([0x40, 0x00, 0x00, 0x01, 0, 255, 0, 4]));
        let mut bus = Bus::new(transport);

        let record = LightController::at(&mut bus, 0).unwrap().status().unwrap();
        assert!(record.voltage);
        assert_eq!(record.color, Color::new(255, 0, 0));
        assert_eq!(record.frequency, 1.0);
    }
}
