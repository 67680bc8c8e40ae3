use motorbus_bus::BusConfig;

use crate::cmd::StopArgs;
use crate::exit::{bus_error, CliResult, SUCCESS};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: StopArgs, format: OutputFormat) -> CliResult<i32> {
    let config = BusConfig {
        stop_attempts: args.attempts,
        ..args.bus.config()?
    };
    let mut bus = args.bus.open_with(config)?;

    let attempts = bus
        .stop_all()
        .map_err(|err| bus_error("stop failed", err))?;
    print_sent("stop", "broadcast", Some(attempts), format);
    Ok(SUCCESS)
}
