//! Deadline-based bounded waits
//!
//! Every timed wait in the logger (sync window, sync line completion, serial
//! sensor response) goes through [`Deadline`] so timeout handling lives in
//! one place.

use embedded_io_async::ReadReady;

use crate::Timer;

/// Polling granularity for readiness checks, in milliseconds
pub const POLL_STEP_MS: u32 = 1;

/// Absolute point on the monotonic time base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    at_ms: u64,
}

impl Deadline {
    /// Deadline `timeout_ms` from now
    pub fn after<M: hal_abstractions::Monotonic + ?Sized>(clock: &M, timeout_ms: u32) -> Self {
        Self {
            at_ms: clock.now_ms().saturating_add(timeout_ms as u64),
        }
    }

    pub fn has_passed<M: hal_abstractions::Monotonic + ?Sized>(&self, clock: &M) -> bool {
        clock.now_ms() >= self.at_ms
    }

    pub fn remaining_ms<M: hal_abstractions::Monotonic + ?Sized>(&self, clock: &M) -> u64 {
        self.at_ms.saturating_sub(clock.now_ms())
    }
}

/// Wait until `port` has input or `deadline` passes
///
/// Returns `true` when input is ready. Input already buffered is reported
/// even when the deadline has passed, so a zero-length window still sees it.
pub async fn wait_readable<T, P>(timer: &mut T, port: &mut P, deadline: Deadline) -> bool
where
    T: Timer,
    P: ReadReady,
{
    loop {
        if port.read_ready().unwrap_or(false) {
            return true;
        }
        if deadline.has_passed(timer) {
            return false;
        }
        let step = deadline.remaining_ms(timer).min(POLL_STEP_MS as u64) as u32;
        timer.delay_ms(step).await;
    }
}
