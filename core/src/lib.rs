//! Platform-agnostic core logic for the SD data logger
//!
//! This crate contains the sampling/logging control loop and everything it
//! owns. It has NO hardware dependencies: clocks, storage, serial ports,
//! sensors and power hooks arrive as `hal-abstractions`, `embedded-hal` and
//! `embedded-io-async` trait implementations supplied by a board crate.
//!
//! ```text
//!  serial ──▶ sync ──▶ Rtc (optional)
//!  Rtc + SensorReader ──▶ SampleRecord ──▶ CsvLog (mandatory)
//!  cycle done ──▶ StatusIndicator / SchedulingPolicy
//! ```
//!
//! One [`Controller`] runs one cycle after another, forever.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

#[macro_use]
mod fmt;

pub mod buffer;
pub mod config;
pub mod console;
pub mod controller;
pub mod deadline;
pub mod fault;
pub mod indicator;
pub mod record;
pub mod schedule;
pub mod sensor;
pub mod session;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod mock;

pub use config::{
    BusyWaitConfig, CsvHeader, LoggerConfig, PowerConfig, Rs485Config, RtdConfig, SyncConfig,
};
pub use controller::{Controller, CycleReport, LoggerParts};
pub use fault::{BootError, Fault};
pub use hal_abstractions::Timestamp;
pub use indicator::StatusIndicator;
pub use record::{Measurement, SampleRecord};
pub use schedule::{BusyWait, Mode, PowerManaged, Rest, SchedulingPolicy};
pub use sensor::{Max31865, Rs485Probe, SensorReader};
pub use session::{Session, ShortPath};
pub use storage::CsvLog;
pub use sync::{SyncCommand, SyncOutcome, SyncProtocol};

/// Serial console: async byte I/O with a non-blocking readiness check
pub trait SerialPort:
    embedded_io_async::Read + embedded_io_async::Write + embedded_io_async::ReadReady
{
}

impl<T> SerialPort for T where
    T: embedded_io_async::Read + embedded_io_async::Write + embedded_io_async::ReadReady
{
}

/// Time base: monotonic milliseconds plus async delays
pub trait Timer: hal_abstractions::Monotonic + embedded_hal_async::delay::DelayNs {}

impl<T> Timer for T where T: hal_abstractions::Monotonic + embedded_hal_async::delay::DelayNs {}
