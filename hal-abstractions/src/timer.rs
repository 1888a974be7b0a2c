//! Monotonic time base

/// Free-running millisecond counter
///
/// Never goes backwards and is unaffected by wall-clock adjustments.
pub trait Monotonic {
    /// Milliseconds since an arbitrary fixed origin (usually boot)
    fn now_ms(&self) -> u64;
}
