//! Device-family tags.
//!
//! The high nibble of every address byte names the kind of controller a
//! frame concerns. The low nibble is the controller's local address.

/// Drive controller (single motor: PWM, speed, angle, limit switches).
pub const DRIVE: u8 = 0x00;

/// Dual-output driver (two power outputs, e.g. solenoids).
pub const DUAL: u8 = 0x10;

/// Servo driver (two hobby-servo ports).
pub const SERVO: u8 = 0x20;

/// Brushless CAN driver. Reserved; speaks a different protocol.
pub const BRUSHLESS: u8 = 0x30;

/// Indicator-light controller (LED strip, power relay).
pub const LIGHT: u8 = 0x40;

/// Generic slave unit.
pub const SLAVE: u8 = 0x50;

/// Legacy host marker once used in the sub-id byte. Reserved.
pub const MASTER: u8 = 0x60;

/// Broadcast/emergency: addresses every device at once.
pub const BROADCAST: u8 = 0xF0;

/// Role tag ORed into the sub-id byte for a chained secondary unit.
pub const SUB_UNIT_TAG: u8 = SLAVE;

/// Mask selecting the family tag from an address byte.
pub const FAMILY_MASK: u8 = 0xF0;

/// Mask selecting the local address from an address byte.
pub const LOCAL_MASK: u8 = 0x0F;

/// An addressable device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    Drive,
    Dual,
    Servo,
    Light,
    Slave,
    Broadcast,
}

impl DeviceFamily {
    /// Every family, in tag order.
    pub const ALL: [DeviceFamily; 6] = [
        DeviceFamily::Drive,
        DeviceFamily::Dual,
        DeviceFamily::Servo,
        DeviceFamily::Light,
        DeviceFamily::Slave,
        DeviceFamily::Broadcast,
    ];

    /// The family tag (high nibble) for this family.
    pub const fn tag(self) -> u8 {
        match self {
            DeviceFamily::Drive => DRIVE,
            DeviceFamily::Dual => DUAL,
            DeviceFamily::Servo => SERVO,
            DeviceFamily::Light => LIGHT,
            DeviceFamily::Slave => SLAVE,
            DeviceFamily::Broadcast => BROADCAST,
        }
    }

    /// Look up a family by its tag. Reserved and unassigned tags return `None`.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag & FAMILY_MASK {
            DRIVE => Some(DeviceFamily::Drive),
            DUAL => Some(DeviceFamily::Dual),
            SERVO => Some(DeviceFamily::Servo),
            LIGHT => Some(DeviceFamily::Light),
            SLAVE => Some(DeviceFamily::Slave),
            BROADCAST => Some(DeviceFamily::Broadcast),
            _ => None,
        }
    }

    /// The family named by an address byte's high nibble.
    pub fn from_address(address: u8) -> Option<Self> {
        Self::from_tag(address & FAMILY_MASK)
    }

    /// Human-readable family name.
    pub fn name(self) -> &'static str {
        match self {
            DeviceFamily::Drive => "drive",
            DeviceFamily::Dual => "dual",
            DeviceFamily::Servo => "servo",
            DeviceFamily::Light => "light",
            DeviceFamily::Slave => "slave",
            DeviceFamily::Broadcast => "broadcast",
        }
    }

    /// Command mode that asks a device of this family for its status.
    pub fn status_mode(self) -> Option<u8> {
        match self {
            DeviceFamily::Drive => Some(crate::mode::drive::STATUS),
            DeviceFamily::Dual => Some(crate::mode::dual::STATUS),
            DeviceFamily::Servo => Some(crate::mode::servo::STATUS),
            DeviceFamily::Light => Some(crate::mode::light::STATUS),
            DeviceFamily::Slave => Some(crate::mode::slave::STATUS),
            DeviceFamily::Broadcast => None,
        }
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns a human-readable family name for an address byte.
pub fn family_name(address: u8) -> &'static str {
    match DeviceFamily::from_address(address) {
        Some(family) => family.name(),
        None if address & FAMILY_MASK == BRUSHLESS => "brushless",
        None if address & FAMILY_MASK == MASTER => "master",
        None => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for family in DeviceFamily::ALL {
            assert_eq!(DeviceFamily::from_tag(family.tag()), Some(family));
        }
    }

    #[test]
    fn address_low_nibble_ignored() {
        assert_eq!(DeviceFamily::from_address(0x1F), Some(DeviceFamily::Dual));
        assert_eq!(DeviceFamily::from_address(0x4A), Some(DeviceFamily::Light));
        assert_eq!(DeviceFamily::from_address(0xF0), Some(DeviceFamily::Broadcast));
    }

    #[test]
    fn reserved_tags_are_not_families() {
        assert_eq!(DeviceFamily::from_address(0x31), None);
        assert_eq!(DeviceFamily::from_address(0x60), None);
        assert_eq!(DeviceFamily::from_address(0xA0), None);
        assert_eq!(family_name(0x32), "brushless");
        assert_eq!(family_name(0x60), "master");
        assert_eq!(family_name(0x90), "unknown");
    }

    #[test]
    fn drive_status_mode_differs_from_other_families() {
        assert_eq!(DeviceFamily::Drive.status_mode(), Some(1));
        assert_eq!(DeviceFamily::Light.status_mode(), Some(0));
        assert_eq!(DeviceFamily::Broadcast.status_mode(), None);
    }
}
