//! Scheduling policies: how the controller spends the time between cycles
//!
//! [`BusyWait`] stays awake, paces cycles against the monotonic timer and
//! keeps the activity LED serviced. The console stays live while it waits:
//! input cuts the rest short so the controller can answer it, then the
//! controller resumes the same rest. [`PowerManaged`] turns the console and
//! clocked peripherals off and sleeps in fixed steps until the interval is
//! covered, then opens a short listening window for the host on wake-up.

use embedded_hal::digital::OutputPin;
use embedded_io_async::ReadReady;
use hal_abstractions::PowerControl;

use crate::config::{BusyWaitConfig, PowerConfig};
use crate::deadline::Deadline;
use crate::indicator::StatusIndicator;
use crate::Timer;

/// Which family a policy belongs to; drives the per-cycle reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Always on, LED pulse, full row echoed
    Continuous,
    /// Sleeps between cycles, timestamp echoed
    LowPower,
}

/// How a call to [`SchedulingPolicy::rest`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rest {
    /// The interval is covered
    Done { waited_ms: u32 },
    /// Console input arrived before the interval was covered
    Input { waited_ms: u32 },
}

impl Rest {
    pub fn waited_ms(&self) -> u32 {
        match *self {
            Self::Done { waited_ms } | Self::Input { waited_ms } => waited_ms,
        }
    }
}

pub trait SchedulingPolicy {
    fn mode(&self) -> Mode;

    /// How long the console listens for a sync line at the start of a cycle
    fn sync_window_ms(&self) -> u32;

    /// Bring the console back up at the start of a cycle
    fn wake(&mut self);

    /// Wait out the rest of the interval
    ///
    /// `cycle_started_ms` is the monotonic time the cycle began. A policy
    /// that keeps the console up returns [`Rest::Input`] as soon as `console`
    /// has input; calling `rest` again with the same arguments finishes the
    /// wait.
    fn rest<T: Timer, L: OutputPin, C: ReadReady>(
        &mut self,
        timer: &mut T,
        indicator: &mut StatusIndicator<L>,
        console: &mut C,
        interval_ms: u32,
        cycle_started_ms: u64,
    ) -> impl core::future::Future<Output = Rest>;
}

/// Time left in the interval, floored at `min_delay_ms`
///
/// A cycle that overran its interval gets the floor, never a negative or
/// zero wait.
pub fn next_wait_ms(interval_ms: u32, elapsed_ms: u64, min_delay_ms: u32) -> u32 {
    let remaining = (interval_ms as u64).saturating_sub(elapsed_ms);
    // remaining <= interval_ms, so it fits
    remaining.max(min_delay_ms as u64) as u32
}

/// Active pacing with the console left on
pub struct BusyWait {
    config: BusyWaitConfig,
    /// Cycle start and deadline of a rest cut short by input
    interrupted: Option<(u64, Deadline)>,
}

impl BusyWait {
    pub const fn new(config: BusyWaitConfig) -> Self {
        Self {
            config,
            interrupted: None,
        }
    }
}

impl SchedulingPolicy for BusyWait {
    fn mode(&self) -> Mode {
        Mode::Continuous
    }

    /// The console is watched for the whole rest, so only input that
    /// arrived during sampling is waiting here
    fn sync_window_ms(&self) -> u32 {
        0
    }

    fn wake(&mut self) {}

    async fn rest<T: Timer, L: OutputPin, C: ReadReady>(
        &mut self,
        timer: &mut T,
        indicator: &mut StatusIndicator<L>,
        console: &mut C,
        interval_ms: u32,
        cycle_started_ms: u64,
    ) -> Rest {
        let entered = timer.now_ms();
        let deadline = match self.interrupted.take() {
            Some((started, deadline)) if started == cycle_started_ms => deadline,
            _ => {
                let elapsed = entered.saturating_sub(cycle_started_ms);
                let wait = next_wait_ms(interval_ms, elapsed, self.config.min_delay_ms);
                Deadline::after(timer, wait)
            }
        };
        let step = self.config.step_ms.max(1) as u64;

        while !deadline.has_passed(timer) {
            indicator.tick(timer.now_ms());
            let slice = deadline.remaining_ms(timer).min(step) as u32;
            timer.delay_ms(slice).await;

            // Checked after the step so a port stuck ready still lets time pass
            if !deadline.has_passed(timer) && console.read_ready().unwrap_or(false) {
                self.interrupted = Some((cycle_started_ms, deadline));
                let waited_ms = timer.now_ms().saturating_sub(entered) as u32;
                return Rest::Input { waited_ms };
            }
        }
        indicator.tick(timer.now_ms());
        Rest::Done {
            waited_ms: timer.now_ms().saturating_sub(entered) as u32,
        }
    }
}

/// Sleep sequence with peripherals gated between cycles
pub struct PowerManaged<P> {
    power: P,
    config: PowerConfig,
}

impl<P: PowerControl> PowerManaged<P> {
    pub fn new(power: P, config: PowerConfig) -> Self {
        Self { power, config }
    }
}

impl<P: PowerControl> SchedulingPolicy for PowerManaged<P> {
    fn mode(&self) -> Mode {
        Mode::LowPower
    }

    fn sync_window_ms(&self) -> u32 {
        self.config.wake_window_ms
    }

    fn wake(&mut self) {
        self.power.enable_serial();
    }

    /// Sleeps the full interval with the console off; processing time is
    /// not deducted
    async fn rest<T: Timer, L: OutputPin, C: ReadReady>(
        &mut self,
        _timer: &mut T,
        indicator: &mut StatusIndicator<L>,
        _console: &mut C,
        interval_ms: u32,
        _cycle_started_ms: u64,
    ) -> Rest {
        indicator.off();
        self.power.quiesce();

        let mut slept: u32 = 0;
        while slept < interval_ms {
            // A zero-length step still counts so the loop always ends
            slept = slept.saturating_add(self.power.idle_step().await.max(1));
        }
        Rest::Done { waited_ms: slept }
    }
}
