use std::time::Duration;

use motorbus_frame::FrameError;
use motorbus_transport::TransportError;

/// Errors that can occur in bus exchanges.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The transport accepted fewer bytes than a full command frame.
    #[error("short write ({written} of {expected} bytes)")]
    TransportWrite { written: usize, expected: usize },

    /// Some bytes arrived, but fewer than a full response frame.
    #[error("short read ({read} of {expected} bytes)")]
    ShortRead { read: usize, expected: usize },

    /// No matching response arrived before the deadline.
    #[error("no matching response within {0:?}")]
    Timeout(Duration),

    /// Transport-level failure (I/O error, closed transport).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A claimed frame does not correspond to any known family or layout.
    #[error("protocol mismatch: {0}")]
    Protocol(FrameError),

    /// Caller input rejected before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(FrameError),

    /// The pending-response queue reached its configured bound.
    #[error("pending queue full ({0} frames)")]
    QueueFull(usize),
}

impl From<FrameError> for BusError {
    fn from(err: FrameError) -> Self {
        if err.is_invalid_argument() {
            BusError::InvalidArgument(err)
        } else {
            BusError::Protocol(err)
        }
    }
}

impl BusError {
    /// True when resending the command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BusError::TransportWrite { .. }
                | BusError::ShortRead { .. }
                | BusError::Timeout(_)
                | BusError::Transport(TransportError::Timeout)
        )
    }
}

pub type Result<T> = std::result::Result<T, BusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_errors_split_by_cause() {
        let invalid: BusError = FrameError::InvalidArgument("bad".into()).into();
        assert!(matches!(invalid, BusError::InvalidArgument(_)));

        let mismatch: BusError = FrameError::UnknownFamily(0x30).into();
        assert!(matches!(mismatch, BusError::Protocol(_)));
    }

    #[test]
    fn transient_errors() {
        assert!(BusError::Timeout(Duration::from_millis(1)).is_transient());
        assert!(!BusError::Transport(TransportError::Shutdown).is_transient());
        assert!(!BusError::QueueFull(4).is_transient());
    }
}
