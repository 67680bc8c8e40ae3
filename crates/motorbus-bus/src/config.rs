use std::num::NonZeroUsize;
use std::time::Duration;

use motorbus_frame::FrameConfig;

/// Configuration for a [`Bus`](crate::Bus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Codec settings for the firmware on the bus.
    pub frame: FrameConfig,
    /// Overall deadline for one call, across every re-read.
    pub call_timeout: Duration,
    /// Timeout for writing one command frame.
    pub write_timeout: Duration,
    /// Per-attempt write timeout of the broadcast stop.
    pub stop_write_timeout: Duration,
    /// Stop reading once this many unclaimed frames are queued. `None` is unbounded.
    ///
    /// A zero limit would forbid every read, so the type rules it out.
    pub max_pending: Option<NonZeroUsize>,
    /// Give up the broadcast stop after this many attempts. `None` retries until delivered.
    pub stop_attempts: Option<usize>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            call_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            stop_write_timeout: Duration::from_millis(300),
            max_pending: None,
            stop_attempts: None,
        }
    }
}
