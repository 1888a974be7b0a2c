//! Non-blocking activity LED pulse

use embedded_hal::digital::OutputPin;

/// LED lit for a fixed time after each successful write
///
/// `pulse` turns the LED on and returns immediately; `tick` turns it off
/// once the pulse duration has elapsed.
pub struct StatusIndicator<L> {
    led: L,
    pulse_ms: u32,
    lit_at: Option<u64>,
}

impl<L: OutputPin> StatusIndicator<L> {
    pub fn new(mut led: L, pulse_ms: u32) -> Self {
        led.set_low().ok();
        Self {
            led,
            pulse_ms,
            lit_at: None,
        }
    }

    pub fn pulse(&mut self, now_ms: u64) {
        self.led.set_high().ok();
        self.lit_at = Some(now_ms);
    }

    pub fn tick(&mut self, now_ms: u64) {
        if let Some(lit_at) = self.lit_at {
            if now_ms.saturating_sub(lit_at) >= self.pulse_ms as u64 {
                self.off();
            }
        }
    }

    pub fn off(&mut self) {
        self.led.set_low().ok();
        self.lit_at = None;
    }

    pub fn is_active(&self) -> bool {
        self.lit_at.is_some()
    }
}
