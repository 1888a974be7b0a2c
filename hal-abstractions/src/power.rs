//! Power management hooks used by the power-managed scheduling policy

/// Peripheral gating and low-power idling
pub trait PowerControl {
    /// Re-enable the serial console after a sleep sequence
    ///
    /// Must be harmless when the console is already enabled.
    fn enable_serial(&mut self);

    /// Disable the serial console and other clocked peripherals
    fn quiesce(&mut self);

    /// Spend one fixed-duration step in the low-power state
    ///
    /// Resolves to the number of milliseconds actually slept.
    fn idle_step(&mut self) -> impl core::future::Future<Output = u32>;
}
