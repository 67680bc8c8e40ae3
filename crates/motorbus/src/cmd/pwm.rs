use motorbus_devices::DriveController;
use motorbus_frame::DeviceFamily;

use crate::cmd::PwmArgs;
use crate::exit::{bus_error, CliResult, SUCCESS};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: PwmArgs, format: OutputFormat) -> CliResult<i32> {
    let unit = args.target.unit(DeviceFamily::Drive)?;
    let mut bus = args.bus.open()?;

    DriveController::new(&mut bus, unit)
        .and_then(|mut drive| drive.pwm(args.reverse, args.power))
        .map_err(|err| bus_error("pwm failed", err))?;

    print_sent("pwm", &unit.to_string(), None, format);
    Ok(SUCCESS)
}
