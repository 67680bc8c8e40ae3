use motorbus_devices::LightController;
use motorbus_frame::DeviceFamily;

use crate::cmd::ColorArgs;
use crate::exit::{bus_error, CliResult, SUCCESS};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: ColorArgs, format: OutputFormat) -> CliResult<i32> {
    let unit = args.target.unit(DeviceFamily::Light)?;
    let mut bus = args.bus.open()?;

    LightController::new(&mut bus, unit)
        .and_then(|mut light| light.color_code(&args.color, args.brightness, args.frequency))
        .map_err(|err| bus_error("color failed", err))?;

    print_sent("color", &unit.to_string(), None, format);
    Ok(SUCCESS)
}
