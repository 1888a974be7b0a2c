//! Real-time clock abstraction
//!
//! The clock is battery-backed and the only source of wall-clock time.

use crate::time::Timestamp;

/// Battery-backed wall clock
///
/// Implementations are polled, singleton peripherals; no locking is implied.
pub trait Rtc {
    /// Driver-specific failure
    type Error: core::fmt::Debug;

    /// Bring the clock up and confirm it is reachable
    ///
    /// Called once at boot. An error here is fatal to the logger.
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Current wall-clock time
    fn now(&mut self) -> Result<Timestamp, Self::Error>;

    /// Set the clock
    ///
    /// Commits unconditionally; callers validate the value beforehand.
    fn adjust(&mut self, timestamp: Timestamp) -> Result<(), Self::Error>;
}
