//! Typed command frames.
//!
//! [`Command`] is the single place that knows each mode's payload layout.
//! Hosts encode through it and the simulated bus decodes through it, so the
//! two sides cannot drift apart.

use bytes::Buf;

use crate::address::{ProtocolRevision, UnitAddress};
use crate::codec::{encode, frequency_steps, from_sign_magnitude, to_sign_magnitude, Field, TxFrame};
use crate::codec::{FREQUENCY_STEPS, TX_PAYLOAD_SIZE};
use crate::error::{FrameError, Result};
use crate::family::{DeviceFamily, FAMILY_MASK};
use crate::mode;
use crate::payload::Color;

/// One command, with its arguments, for any family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Reset the encoder and motion state.
    DriveInit,
    DriveStatus,
    DrivePwm {
        phase: bool,
        power: u16,
    },
    DriveSpeed {
        phase: bool,
        speed: u16,
        end: u16,
        timeout_ms: u16,
    },
    /// Turn to a signed angle. The magnitude must fit in 16 bits.
    DriveAngle {
        angle: i32,
        speed: u16,
        timeout_ms: u16,
    },
    DriveLimitSwitch {
        phase: bool,
        power: u16,
        port: u8,
        timeout_ms: u16,
    },
    DualStatus,
    DualPower {
        port0: u16,
        port1: u16,
    },
    DualLimitSwitch {
        port: u8,
        power: u16,
        after_power: u16,
    },
    /// Set one output, leaving the other as it is.
    DualSinglePower {
        port: u8,
        power: u16,
    },
    ServoStatus,
    ServoAngle {
        port: u8,
        angle: u8,
    },
    ServoAngles {
        port0: u8,
        port1: u8,
    },
    LightStatus,
    LightStop,
    LightStart,
    /// Blink `color` at `frequency` Hz, in quarter-hertz steps.
    LightColor {
        color: Color,
        frequency: f32,
    },
    SlaveStatus,
    /// Raw bytes, zero padded to the full payload.
    SlaveData([u8; TX_PAYLOAD_SIZE]),
    /// Halt every device on the bus.
    StopAll,
}

impl Command {
    /// The status query for `family`. Broadcast has none.
    pub fn status(family: DeviceFamily) -> Option<Self> {
        match family {
            DeviceFamily::Drive => Some(Command::DriveStatus),
            DeviceFamily::Dual => Some(Command::DualStatus),
            DeviceFamily::Servo => Some(Command::ServoStatus),
            DeviceFamily::Light => Some(Command::LightStatus),
            DeviceFamily::Slave => Some(Command::SlaveStatus),
            DeviceFamily::Broadcast => None,
        }
    }

    /// Pad up to [`TX_PAYLOAD_SIZE`] bytes into a slave data command.
    pub fn slave_data(data: &[u8]) -> Result<Self> {
        if data.len() > TX_PAYLOAD_SIZE {
            return Err(FrameError::PayloadTooLarge {
                size: data.len(),
                max: TX_PAYLOAD_SIZE,
            });
        }
        let mut bytes = [0u8; TX_PAYLOAD_SIZE];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Command::SlaveData(bytes))
    }

    pub fn family(&self) -> DeviceFamily {
        match self {
            Command::DriveInit
            | Command::DriveStatus
            | Command::DrivePwm { .. }
            | Command::DriveSpeed { .. }
            | Command::DriveAngle { .. }
            | Command::DriveLimitSwitch { .. } => DeviceFamily::Drive,
            Command::DualStatus
            | Command::DualPower { .. }
            | Command::DualLimitSwitch { .. }
            | Command::DualSinglePower { .. } => DeviceFamily::Dual,
            Command::ServoStatus | Command::ServoAngle { .. } | Command::ServoAngles { .. } => {
                DeviceFamily::Servo
            }
            Command::LightStatus
            | Command::LightStop
            | Command::LightStart
            | Command::LightColor { .. } => DeviceFamily::Light,
            Command::SlaveStatus | Command::SlaveData(_) => DeviceFamily::Slave,
            Command::StopAll => DeviceFamily::Broadcast,
        }
    }

    /// The mode byte this command travels under.
    pub fn mode(&self) -> u8 {
        match self {
            Command::DriveInit => mode::drive::INIT,
            Command::DriveStatus => mode::drive::STATUS,
            Command::DrivePwm { .. } => mode::drive::PWM,
            Command::DriveSpeed { .. } => mode::drive::SPEED,
            Command::DriveAngle { .. } => mode::drive::ANGLE,
            Command::DriveLimitSwitch { .. } => mode::drive::LIMIT_SWITCH,
            Command::DualStatus => mode::dual::STATUS,
            Command::DualPower { .. } => mode::dual::POWER,
            Command::DualLimitSwitch { .. } => mode::dual::LIMIT_SWITCH,
            Command::DualSinglePower { .. } => mode::dual::SINGLE_POWER,
            Command::ServoStatus => mode::servo::STATUS,
            Command::ServoAngle { .. } => mode::servo::ANGLE,
            Command::ServoAngles { .. } => mode::servo::ANGLE_BOTH,
            Command::LightStatus => mode::light::STATUS,
            Command::LightStop => mode::light::STOP,
            Command::LightStart => mode::light::START,
            Command::LightColor { .. } => mode::light::COLOR,
            Command::SlaveStatus => mode::slave::STATUS,
            Command::SlaveData(_) => mode::slave::DATA,
            Command::StopAll => 0,
        }
    }

    /// Build the frame addressed to `unit`.
    ///
    /// Fails with [`FrameError::InvalidArgument`] when `unit` is of another
    /// family or an argument does not fit its field.
    pub fn encode(&self, unit: &UnitAddress, revision: ProtocolRevision) -> Result<TxFrame> {
        if unit.family() != self.family() {
            return Err(FrameError::invalid(format!(
                "{} command sent to {unit}",
                self.family()
            )));
        }
        let header = unit.header(revision, self.mode());

        match *self {
            Command::DriveInit
            | Command::DriveStatus
            | Command::DualStatus
            | Command::ServoStatus
            | Command::LightStatus
            | Command::LightStop
            | Command::LightStart
            | Command::SlaveStatus => encode(header, &[]),
            Command::DrivePwm { phase, power } => {
                encode(header, &[Field::Flag(phase), Field::U16(power)])
            }
            Command::DriveSpeed {
                phase,
                speed,
                end,
                timeout_ms,
            } => encode(
                header,
                &[
                    Field::Flag(phase),
                    Field::U16(speed),
                    Field::U16(end),
                    Field::U16(timeout_ms),
                ],
            ),
            Command::DriveAngle {
                angle,
                speed,
                timeout_ms,
            } => {
                let (negative, magnitude) = to_sign_magnitude(angle);
                let magnitude = u16::try_from(magnitude).map_err(|_| {
                    FrameError::invalid(format!(
                        "angle {angle} out of range (max magnitude {})",
                        u16::MAX
                    ))
                })?;
                encode(
                    header,
                    &[
                        Field::Flag(negative),
                        Field::U16(speed),
                        Field::U16(magnitude),
                        Field::U16(timeout_ms),
                    ],
                )
            }
            Command::DriveLimitSwitch {
                phase,
                power,
                port,
                timeout_ms,
            } => encode(
                header,
                &[
                    Field::Flag(phase),
                    Field::U16(power),
                    Field::U8(check_port(port)?),
                    Field::U16(timeout_ms),
                ],
            ),
            Command::DualPower { port0, port1 } => encode(
                header,
                &[Field::Zero(1), Field::U16(port0), Field::U16(port1)],
            ),
            Command::DualLimitSwitch {
                port,
                power,
                after_power,
            } => encode(
                header,
                &[
                    Field::U8(check_port(port)?),
                    Field::U16(power),
                    Field::U16(after_power),
                ],
            ),
            Command::DualSinglePower { port, power } => {
                encode(header, &[Field::U8(check_port(port)?), Field::U16(power)])
            }
            Command::ServoAngle { port, angle } => {
                encode(header, &[Field::U8(check_port(port)?), Field::U8(angle)])
            }
            Command::ServoAngles { port0, port1 } => encode(
                header,
                &[Field::Zero(1), Field::U8(port0), Field::U8(port1)],
            ),
            Command::LightColor { color, frequency } => {
                let steps = frequency_steps(frequency)?;
                // Colors travel green first.
                encode(
                    header,
                    &[
                        Field::Zero(1),
                        Field::U8(color.green),
                        Field::U8(color.red),
                        Field::U8(color.blue),
                        Field::U8(steps),
                    ],
                )
            }
            Command::SlaveData(data) => encode(header, &[Field::Bytes(&data)]),
            Command::StopAll => Ok(TxFrame::stop_all()),
        }
    }

    /// Read the command out of a transmit frame, as a device would.
    ///
    /// Fails with [`FrameError::UnknownFamily`] for a reserved family tag and
    /// [`FrameError::UnknownMode`] for a mode the family does not define.
    pub fn decode(frame: &TxFrame) -> Result<Self> {
        let header = frame.header();
        let family = header
            .family()
            .ok_or(FrameError::UnknownFamily(header.address & FAMILY_MASK))?;
        let mut src = frame.payload();
        let unknown = || FrameError::UnknownMode {
            family,
            mode: header.mode,
        };

        let command = match family {
            DeviceFamily::Drive => match header.mode {
                mode::drive::INIT => Command::DriveInit,
                mode::drive::STATUS => Command::DriveStatus,
                mode::drive::PWM => Command::DrivePwm {
                    phase: get_flag(&mut src),
                    power: src.get_u16(),
                },
                mode::drive::SPEED => Command::DriveSpeed {
                    phase: get_flag(&mut src),
                    speed: src.get_u16(),
                    end: src.get_u16(),
                    timeout_ms: src.get_u16(),
                },
                mode::drive::ANGLE => {
                    let negative = get_flag(&mut src);
                    let speed = src.get_u16();
                    let magnitude = src.get_u16();
                    Command::DriveAngle {
                        angle: from_sign_magnitude(negative, u32::from(magnitude)),
                        speed,
                        timeout_ms: src.get_u16(),
                    }
                }
                mode::drive::LIMIT_SWITCH => Command::DriveLimitSwitch {
                    phase: get_flag(&mut src),
                    power: src.get_u16(),
                    port: src.get_u8(),
                    timeout_ms: src.get_u16(),
                },
                _ => return Err(unknown()),
            },
            DeviceFamily::Dual => match header.mode {
                mode::dual::STATUS => Command::DualStatus,
                mode::dual::POWER => {
                    src.advance(1);
                    Command::DualPower {
                        port0: src.get_u16(),
                        port1: src.get_u16(),
                    }
                }
                mode::dual::LIMIT_SWITCH => Command::DualLimitSwitch {
                    port: src.get_u8(),
                    power: src.get_u16(),
                    after_power: src.get_u16(),
                },
                mode::dual::SINGLE_POWER => Command::DualSinglePower {
                    port: src.get_u8(),
                    power: src.get_u16(),
                },
                _ => return Err(unknown()),
            },
            DeviceFamily::Servo => match header.mode {
                mode::servo::STATUS => Command::ServoStatus,
                mode::servo::ANGLE => Command::ServoAngle {
                    port: src.get_u8(),
                    angle: src.get_u8(),
                },
                mode::servo::ANGLE_BOTH => {
                    src.advance(1);
                    Command::ServoAngles {
                        port0: src.get_u8(),
                        port1: src.get_u8(),
                    }
                }
                _ => return Err(unknown()),
            },
            DeviceFamily::Light => match header.mode {
                mode::light::STATUS => Command::LightStatus,
                mode::light::STOP => Command::LightStop,
                mode::light::START => Command::LightStart,
                mode::light::COLOR => {
                    src.advance(1);
                    let green = src.get_u8();
                    let red = src.get_u8();
                    let blue = src.get_u8();
                    Command::LightColor {
                        color: Color { red, green, blue },
                        frequency: f32::from(src.get_u8()) / FREQUENCY_STEPS,
                    }
                }
                _ => return Err(unknown()),
            },
            DeviceFamily::Slave => match header.mode {
                mode::slave::STATUS => Command::SlaveStatus,
                mode::slave::DATA => {
                    let mut data = [0u8; TX_PAYLOAD_SIZE];
                    src.copy_to_slice(&mut data);
                    Command::SlaveData(data)
                }
                _ => return Err(unknown()),
            },
            DeviceFamily::Broadcast => Command::StopAll,
        };
        Ok(command)
    }
}

fn get_flag(src: &mut &[u8]) -> bool {
    src.get_u8() & 0x01 != 0
}

fn check_port(port: u8) -> Result<u8> {
    if port > 1 {
        return Err(FrameError::invalid(format!(
            "port {port} out of range (0 or 1)"
        )));
    }
    Ok(port)
}
