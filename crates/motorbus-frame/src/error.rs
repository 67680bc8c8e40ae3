use crate::family::DeviceFamily;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A caller-supplied value is out of range for its field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The payload fields do not fit in the frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The address byte carries a family tag no decoder knows.
    #[error("unknown device family tag 0x{0:02X}")]
    UnknownFamily(u8),

    /// A command frame names a mode its family does not define.
    #[error("unknown {family} command mode {mode}")]
    UnknownMode { family: DeviceFamily, mode: u8 },

    /// A response decoded to a different record kind than the command expects.
    #[error("expected {expected} record, got {found}")]
    UnexpectedPayload {
        expected: &'static str,
        found: &'static str,
    },

    /// A raw buffer has the wrong length for a frame.
    #[error("frame length {len} does not match expected {expected}")]
    BadLength { len: usize, expected: usize },
}

impl FrameError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for errors caused by caller input rather than by received bytes.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
