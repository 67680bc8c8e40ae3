use std::fmt;

use motorbus_frame::{Header, ProtocolRevision, ResponseStatus, RxFrame, UnitAddress};

/// Decides whether a received frame belongs to the caller currently waiting.
pub trait ResponseMatcher {
    fn matches(&self, frame: &RxFrame) -> bool;
}

impl<M: ResponseMatcher + ?Sized> ResponseMatcher for &M {
    fn matches(&self, frame: &RxFrame) -> bool {
        (**self).matches(frame)
    }
}

/// Identifies the reply to one command: all three header bytes must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeKey {
    pub address: u8,
    pub sub_id: u8,
    /// Expected status code in byte 2 of the reply.
    pub mode: u8,
}

impl ExchangeKey {
    pub const fn new(address: u8, sub_id: u8, mode: u8) -> Self {
        Self {
            address,
            sub_id,
            mode,
        }
    }

    /// Key for a reply from `unit` carrying status code `mode`.
    pub fn for_unit(unit: &UnitAddress, revision: ProtocolRevision, mode: u8) -> Self {
        let header = unit.header(revision, mode);
        Self::new(header.address, header.sub_id, header.mode)
    }

    /// Key for the status reply of `unit`.
    pub fn status(unit: &UnitAddress, revision: ProtocolRevision) -> Self {
        Self::for_unit(unit, revision, ResponseStatus::STATUS)
    }

    pub fn header(&self) -> Header {
        Header::new(self.address, self.sub_id, self.mode)
    }
}

impl ResponseMatcher for ExchangeKey {
    fn matches(&self, frame: &RxFrame) -> bool {
        frame.header() == self.header()
    }
}

impl fmt::Display for ExchangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "addr=0x{:02X} sub=0x{:02X} mode={}",
            self.address, self.sub_id, self.mode
        )
    }
}

/// Identifies the completion report of a long-running command.
///
/// A device reports completion with any status code other than `STATUS`
/// and echoes the finished command's mode in byte 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FinishKey {
    pub address: u8,
    pub sub_id: u8,
    /// Mode of the command whose completion is awaited.
    pub mode: u8,
}

impl FinishKey {
    pub const fn new(address: u8, sub_id: u8, mode: u8) -> Self {
        Self {
            address,
            sub_id,
            mode,
        }
    }

    pub fn for_unit(unit: &UnitAddress, revision: ProtocolRevision, mode: u8) -> Self {
        Self::new(unit.address_byte(), unit.sub_id_byte(revision), mode)
    }
}

impl ResponseMatcher for FinishKey {
    fn matches(&self, frame: &RxFrame) -> bool {
        let header = frame.header();
        header.address == self.address
            && header.sub_id == self.sub_id
            && frame.status().is_finish()
            && frame.payload()[0] == self.mode
    }
}

impl fmt::Display for FinishKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "addr=0x{:02X} sub=0x{:02X} finish of mode {}",
            self.address, self.sub_id, self.mode
        )
    }
}
