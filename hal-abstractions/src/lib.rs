//! Hardware abstraction traits for the data logger firmware
//!
//! This crate defines the narrow interfaces the logger core consumes. BSPs
//! implement these traits; the core never touches a peripheral directly.
//!
//! - **`rtc`**: battery-backed wall clock (`begin`, `now`, `adjust`)
//! - **`storage`**: append-only files on removable media
//! - **`power`**: serial/peripheral gating and low-power idle steps
//! - **`timer`**: monotonic millisecond counter
//! - **`time`**: the `Timestamp` value type shared by all of the above
//!
//! GPIO, SPI, delays and serial I/O use the `embedded-hal`,
//! `embedded-hal-async` and `embedded-io-async` traits directly.

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod power;
pub mod rtc;
pub mod storage;
pub mod time;
pub mod timer;

pub use power::PowerControl;
pub use rtc::Rtc;
pub use storage::{DirEntryTime, FileStore};
pub use time::{RangeError, Timestamp};
pub use timer::Monotonic;
