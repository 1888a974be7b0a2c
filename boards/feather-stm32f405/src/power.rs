//! Peripheral clock gating for the power-managed schedule
//!
//! Between samples the console UART and the sensor SPI bus are stopped at
//! the RCC. The core then idles in fixed steps on the TIM2 monotonic while
//! the RTIC idle task sits in WFI. Register contents survive clock gating,
//! so re-enabling the clocks is enough to resume.

#![deny(unsafe_code)]
#![deny(warnings)]

use defmt::debug;
use embassy_stm32::pac;
use rtic_monotonics::stm32::prelude::*;

use crate::Mono;

/// Length of one low-power idle step
pub const IDLE_STEP_MS: u32 = 1_000;

/// RCC gating for USART3 (console), SPI2 (SD card, RTD) and USART1 (RS-485)
#[derive(Debug, Default)]
pub struct Stm32Power {
    gated: bool,
}

impl Stm32Power {
    pub const fn new() -> Self {
        Self { gated: false }
    }

    fn set_clocks(&mut self, enabled: bool) {
        pac::RCC.apb1enr().modify(|w| {
            w.set_usart3en(enabled);
            w.set_spi2en(enabled);
        });
        pac::RCC.apb2enr().modify(|w| w.set_usart1en(enabled));
        self.gated = !enabled;
    }
}

impl hal_abstractions::PowerControl for Stm32Power {
    /// Also restores the sensor bus, which was gated with the console
    fn enable_serial(&mut self) {
        if self.gated {
            self.set_clocks(true);
            debug!("Peripheral clocks restored");
        }
    }

    fn quiesce(&mut self) {
        debug!("Gating peripheral clocks");
        self.set_clocks(false);
    }

    async fn idle_step(&mut self) -> u32 {
        let start = Mono::now();
        Mono::delay(u64::from(IDLE_STEP_MS).millis()).await;
        (Mono::now() - start).to_millis() as u32
    }
}
