use motorbus_devices::query_status;
use motorbus_frame::DeviceFamily;

use crate::cmd::StatusArgs;
use crate::exit::{bus_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let family = DeviceFamily::from(args.family);
    let unit = args.target.unit(family)?;
    let mut bus = args.bus.open()?;

    let response =
        query_status(&mut bus, &unit).map_err(|err| bus_error("status failed", err))?;

    print_status(&unit, &response, format);
    Ok(SUCCESS)
}
