use crate::codec::Header;
use crate::error::{FrameError, Result};
use crate::family::{DeviceFamily, LOCAL_MASK, SUB_UNIT_TAG};

/// Protocol revision spoken by the target firmware.
///
/// Revisions disagree on the firmware-version fixed-point scale and on
/// whether a sub-unit id carries the role tag. Pick the one matching the
/// firmware on the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProtocolRevision {
    /// Firmware byte in tenths, bare sub-unit ids.
    V1,
    /// Firmware byte in hundredths, sub-unit ids tagged with [`SUB_UNIT_TAG`].
    #[default]
    V2,
}

impl ProtocolRevision {
    /// Divisor applied to the firmware-version byte.
    pub fn firmware_scale(self) -> f32 {
        match self {
            ProtocolRevision::V1 => 10.0,
            ProtocolRevision::V2 => 100.0,
        }
    }

    /// Whether sub-unit ids are ORed with [`SUB_UNIT_TAG`] on the wire.
    pub fn tags_sub_units(self) -> bool {
        matches!(self, ProtocolRevision::V2)
    }
}

/// Where a command goes: family, local address and optional chained sub-unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitAddress {
    family: DeviceFamily,
    local: u8,
    sub_unit: Option<u8>,
}

impl UnitAddress {
    /// The primary channel of the controller at `local` (0..=15).
    pub fn new(family: DeviceFamily, local: u8) -> Result<Self> {
        if local > LOCAL_MASK {
            return Err(FrameError::invalid(format!(
                "local address {local} out of range (max {LOCAL_MASK})"
            )));
        }
        Ok(Self {
            family,
            local,
            sub_unit: None,
        })
    }

    /// Address a secondary unit (0..=15) chained behind this controller.
    ///
    /// Under [`ProtocolRevision::V1`] sub-unit 0 is indistinguishable from
    /// the primary channel on the wire.
    pub fn with_sub_unit(self, sub_unit: u8) -> Result<Self> {
        if sub_unit > LOCAL_MASK {
            return Err(FrameError::invalid(format!(
                "sub-unit id {sub_unit} out of range (max {LOCAL_MASK})"
            )));
        }
        Ok(Self {
            sub_unit: Some(sub_unit),
            ..self
        })
    }

    /// The reserved all-devices address.
    pub fn broadcast() -> Self {
        Self {
            family: DeviceFamily::Broadcast,
            local: 0,
            sub_unit: None,
        }
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn local(&self) -> u8 {
        self.local
    }

    pub fn sub_unit(&self) -> Option<u8> {
        self.sub_unit
    }

    /// Address byte: family tag in the high nibble, local address in the low.
    pub fn address_byte(&self) -> u8 {
        self.family.tag() | self.local
    }

    /// Sub-id byte: 0 for the primary channel, otherwise the sub-unit id
    /// (tagged when the revision asks for it).
    pub fn sub_id_byte(&self, revision: ProtocolRevision) -> u8 {
        match self.sub_unit {
            None => 0,
            Some(sub) if revision.tags_sub_units() => sub | SUB_UNIT_TAG,
            Some(sub) => sub,
        }
    }

    /// Full header for a command in `mode`.
    pub fn header(&self, revision: ProtocolRevision, mode: u8) -> Header {
        Header::new(self.address_byte(), self.sub_id_byte(revision), mode)
    }
}

impl std::fmt::Display for UnitAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@0x{:02X}", self.family, self.address_byte())?;
        if let Some(sub) = self.sub_unit {
            write!(f, "/{sub}")?;
        }
        Ok(())
    }
}
