//! Command mode codes (byte 2 of a transmit frame), per family.

/// Drive controller modes.
pub mod drive {
    pub const INIT: u8 = 0;
    pub const STATUS: u8 = 1;
    pub const PWM: u8 = 2;
    pub const SPEED: u8 = 3;
    pub const ANGLE: u8 = 4;
    pub const LIMIT_SWITCH: u8 = 5;
}

/// Dual-output driver modes.
pub mod dual {
    pub const STATUS: u8 = 0;
    pub const POWER: u8 = 1;
    pub const LIMIT_SWITCH: u8 = 2;
    pub const SINGLE_POWER: u8 = 3;
}

/// Servo driver modes.
pub mod servo {
    pub const STATUS: u8 = 0;
    pub const ANGLE: u8 = 1;
    pub const ANGLE_BOTH: u8 = 2;
}

/// Indicator-light controller modes.
pub mod light {
    pub const STATUS: u8 = 0;
    pub const STOP: u8 = 1;
    pub const START: u8 = 2;
    pub const COLOR: u8 = 3;
}

/// Generic slave modes.
pub mod slave {
    pub const STATUS: u8 = 0;
    pub const DATA: u8 = 1;
}

use crate::family::DeviceFamily;

/// Returns a human-readable name for a family's command mode.
pub fn mode_name(family: DeviceFamily, mode: u8) -> &'static str {
    match family {
        DeviceFamily::Drive => match mode {
            drive::INIT => "INIT",
            drive::STATUS => "STATUS",
            drive::PWM => "PWM",
            drive::SPEED => "SPEED",
            drive::ANGLE => "ANGLE",
            drive::LIMIT_SWITCH => "LIMIT_SWITCH",
            _ => "UNKNOWN",
        },
        DeviceFamily::Dual => match mode {
            dual::STATUS => "STATUS",
            dual::POWER => "POWER",
            dual::LIMIT_SWITCH => "LIMIT_SWITCH",
            dual::SINGLE_POWER => "SINGLE_POWER",
            _ => "UNKNOWN",
        },
        DeviceFamily::Servo => match mode {
            servo::STATUS => "STATUS",
            servo::ANGLE => "ANGLE",
            servo::ANGLE_BOTH => "ANGLE_BOTH",
            _ => "UNKNOWN",
        },
        DeviceFamily::Light => match mode {
            light::STATUS => "STATUS",
            light::STOP => "STOP",
            light::START => "START",
            light::COLOR => "COLOR",
            _ => "UNKNOWN",
        },
        DeviceFamily::Slave => match mode {
            slave::STATUS => "STATUS",
            slave::DATA => "DATA",
            _ => "UNKNOWN",
        },
        DeviceFamily::Broadcast => "STOP_ALL",
    }
}
