use std::time::Duration;

use motorbus_bus::{Bus, BusError, ExchangeKey, FinishKey, Result};
use motorbus_frame::{Command, DeviceFamily, FrameError, Response, UnitAddress};
use motorbus_transport::Transport;
use tracing::debug;

/// Reject a unit that belongs to another family before any I/O.
pub(crate) fn check_family(unit: &UnitAddress, family: DeviceFamily) -> Result<()> {
    if unit.family() != family {
        return Err(BusError::InvalidArgument(FrameError::invalid(format!(
            "{unit} is not a {family} device"
        ))));
    }
    Ok(())
}

/// Encode and write a command that expects no reply.
pub(crate) fn command<T: Transport>(
    bus: &mut Bus<T>,
    unit: &UnitAddress,
    command: Command,
) -> Result<()> {
    let frame = command.encode(unit, bus.config().frame.revision)?;
    debug!(%unit, ?command, "command");
    bus.send(&frame)
}

/// Ask `unit` for its status and wait for the reply.
///
/// The returned [`Response`] keeps the frame exactly as it was received.
pub fn query_status<T: Transport>(bus: &mut Bus<T>, unit: &UnitAddress) -> Result<Response> {
    let query = Command::status(unit.family()).ok_or_else(|| {
        BusError::InvalidArgument(FrameError::invalid(format!("{unit} has no status query")))
    })?;
    let revision = bus.config().frame.revision;
    let frame = query.encode(unit, revision)?;
    let key = ExchangeKey::status(unit, revision);
    debug!(%unit, %key, "status query");
    bus.call(&key, &frame)
}

/// Wait for `unit` to report completion of the command sent in `mode`.
pub(crate) fn wait_finish<T: Transport>(
    bus: &mut Bus<T>,
    unit: &UnitAddress,
    mode: u8,
    timeout: Duration,
) -> Result<Response> {
    let key = FinishKey::for_unit(unit, bus.config().frame.revision, mode);
    bus.wait_finish(&key, timeout)
}
