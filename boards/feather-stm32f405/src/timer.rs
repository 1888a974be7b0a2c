//! Monotonic time base for the logger core, backed by the TIM2 monotonic

#![deny(unsafe_code)]
#![deny(warnings)]

use rtic_monotonics::stm32::prelude::*;

use crate::Mono;

/// Millisecond clock and async delays on [`Mono`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonoTimer;

impl hal_abstractions::Monotonic for MonoTimer {
    fn now_ms(&self) -> u64 {
        Mono::now().duration_since_epoch().to_millis()
    }
}

impl embedded_hal_async::delay::DelayNs for MonoTimer {
    async fn delay_ns(&mut self, ns: u32) {
        // Mono ticks at 1 MHz; round up so a delay is never shortened
        Mono::delay(u64::from(ns).div_ceil(1_000).micros()).await;
    }

    async fn delay_us(&mut self, us: u32) {
        Mono::delay(u64::from(us).micros()).await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        Mono::delay(u64::from(ms).millis()).await;
    }
}
