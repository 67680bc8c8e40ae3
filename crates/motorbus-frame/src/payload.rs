//! Decoded response records.

use std::fmt;
use std::str::FromStr;

use crate::codec::{Header, RxFrame};
use crate::error::{FrameError, Result};

/// Status code carried in byte 2 of a receive frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseStatus {
    /// Reply to a status query.
    Status,
    /// The command completed.
    Success,
    /// The command ran out of time on the device.
    Timeout,
    /// The command was interrupted (e.g. by a broadcast stop).
    Interrupt,
    Other,
    /// A code this library does not know, kept verbatim.
    Unknown(u8),
}

impl ResponseStatus {
    pub const STATUS: u8 = 0;
    pub const SUCCESS: u8 = 1;
    pub const TIMEOUT: u8 = 2;
    pub const INTERRUPT: u8 = 3;
    pub const OTHER: u8 = 4;

    pub fn from_code(code: u8) -> Self {
        match code {
            Self::STATUS => ResponseStatus::Status,
            Self::SUCCESS => ResponseStatus::Success,
            Self::TIMEOUT => ResponseStatus::Timeout,
            Self::INTERRUPT => ResponseStatus::Interrupt,
            Self::OTHER => ResponseStatus::Other,
            other => ResponseStatus::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ResponseStatus::Status => Self::STATUS,
            ResponseStatus::Success => Self::SUCCESS,
            ResponseStatus::Timeout => Self::TIMEOUT,
            ResponseStatus::Interrupt => Self::INTERRUPT,
            ResponseStatus::Other => Self::OTHER,
            ResponseStatus::Unknown(code) => code,
        }
    }

    /// True for every code that reports a finished command.
    pub fn is_finish(self) -> bool {
        !matches!(self, ResponseStatus::Status)
    }

    pub fn name(self) -> &'static str {
        match self {
            ResponseStatus::Status => "status",
            ResponseStatus::Success => "success",
            ResponseStatus::Timeout => "timeout",
            ResponseStatus::Interrupt => "interrupt",
            ResponseStatus::Other => "other",
            ResponseStatus::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStatus::Unknown(code) => write!(f, "unknown({code})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Status reply of a drive, dual or servo controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusRecord {
    /// Firmware version, already divided by the revision's scale.
    pub firmware: f32,
    /// Encoder angle, sign restored from the flag bit.
    pub angle: i32,
    pub limit_switches: [bool; 2],
}

/// An RGB color as sent to an indicator-light controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parse a `#RRGGBB` color code.
    pub fn parse(code: &str) -> Result<Self> {
        let hex = code
            .strip_prefix('#')
            .filter(|hex| hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .ok_or_else(|| FrameError::invalid(format!("invalid color code {code:?}")))?;
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .map_err(|_| FrameError::invalid(format!("invalid color code {code:?}")))
        };
        Ok(Self {
            red: channel(0..2)?,
            green: channel(2..4)?,
            blue: channel(4..6)?,
        })
    }

    /// Scale every channel by `brightness` (0.0..=1.0).
    pub fn scaled(self, brightness: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&brightness) {
            return Err(FrameError::invalid(format!(
                "brightness {brightness} out of range 0.0..=1.0"
            )));
        }
        let scale = |channel: u8| (f32::from(channel) * brightness).round() as u8;
        Ok(Self {
            red: scale(self.red),
            green: scale(self.green),
            blue: scale(self.blue),
        })
    }
}

impl FromStr for Color {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

/// Telemetry of an indicator-light controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRecord {
    /// Whether the switched power output is on.
    pub voltage: bool,
    pub color: Color,
    /// Blink frequency in Hz, in steps of 0.25.
    pub frequency: f32,
}

/// Any other response: completion reports and generic slave replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericRecord {
    /// Completed command mode, or the slave's type number.
    pub mode: u8,
    pub data: [u8; 4],
}

/// Family-specific body of a response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    Status(StatusRecord),
    Light(LightRecord),
    Generic(GenericRecord),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Status(_) => "status",
            Payload::Light(_) => "light",
            Payload::Generic(_) => "generic",
        }
    }

    pub fn into_status(self) -> Result<StatusRecord> {
        match self {
            Payload::Status(record) => Ok(record),
            other => Err(other.unexpected("status")),
        }
    }

    pub fn into_light(self) -> Result<LightRecord> {
        match self {
            Payload::Light(record) => Ok(record),
            other => Err(other.unexpected("light")),
        }
    }

    pub fn into_generic(self) -> Result<GenericRecord> {
        match self {
            Payload::Generic(record) => Ok(record),
            other => Err(other.unexpected("generic")),
        }
    }

    fn unexpected(&self, expected: &'static str) -> FrameError {
        FrameError::UnexpectedPayload {
            expected,
            found: self.kind(),
        }
    }
}

/// A decoded receive frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Response {
    pub header: Header,
    pub status: ResponseStatus,
    pub payload: Payload,
    /// The bytes as received. Decoding is lossy, e.g. a sign bit on a zero angle.
    pub frame: RxFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_roundtrip_including_unknown() {
        for code in 0..=u8::MAX {
            assert_eq!(ResponseStatus::from_code(code).code(), code);
        }
        assert_eq!(ResponseStatus::from_code(9), ResponseStatus::Unknown(9));
        assert!(!ResponseStatus::Status.is_finish());
        assert!(ResponseStatus::Interrupt.is_finish());
    }

    #[test]
    fn color_parse_accepts_hex_code() {
        let color = Color::parse("#0a80Ff").unwrap();
        assert_eq!(color, Color::new(0x0A, 0x80, 0xFF));
        assert_eq!(color.to_string(), "#0A80FF");
        assert_eq!("#000000".parse::<Color>().unwrap(), Color::default());
    }

    #[test]
    fn color_parse_rejects_malformed_codes() {
        for bad in ["0000FF", "#00FF", "#0000FG", "#0000FF0", "", "#ÿÿÿ"] {
            let err = Color::parse(bad).unwrap_err();
            assert!(err.is_invalid_argument(), "{bad:?} accepted");
        }
    }

    #[test]
    fn scaled_color_rounds_each_channel() {
        let color = Color::new(255, 100, 0).scaled(0.5).unwrap();
        assert_eq!(color, Color::new(128, 50, 0));
        assert!(Color::new(1, 1, 1).scaled(1.5).is_err());
        assert!(Color::new(1, 1, 1).scaled(-0.1).is_err());
    }

    #[test]
    fn payload_accessors_reject_other_kinds() {
        let generic = Payload::Generic(GenericRecord {
            mode: 1,
            data: [0; 4],
        });
        assert!(generic.into_generic().is_ok());
        let err = generic.into_status().unwrap_err();
        assert!(matches!(
            err,
            FrameError::UnexpectedPayload {
                expected: "status",
                found: "generic"
            }
        ));
        assert!(!err.is_invalid_argument());
    }
}
