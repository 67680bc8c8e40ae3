//! Request/response exchange over a shared motor-controller bus.
//!
//! Many devices share one half-duplex transport and may answer late, out
//! of order, or unprompted. A [`Bus`] writes one command at a time and
//! waits for the frame its key names; everything else it reads is parked
//! in a [`PendingQueue`] until some later call claims it.

pub mod config;
pub mod error;
pub mod exchange;
pub mod key;
pub mod pending;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::BusConfig;
pub use error::{BusError, Result};
pub use exchange::{Bus, BusStats};
pub use key::{ExchangeKey, FinishKey, ResponseMatcher};
pub use pending::{PendingFrame, PendingQueue};
