//! Wall-clock time on the STM32 internal RTC
//!
//! The RTC runs from the 32.768 kHz LSE on the Feather and keeps counting on
//! VBAT while the main supply is off. It is the only source of wall-clock
//! time; the host sets it over the serial console with `SYNC_TIME:`.
//!
//! ## defmt Timestamps
//!
//! Log lines are stamped with RTC time as Unix epoch seconds rendered with
//! the `:iso8601s` display hint, e.g. `2025-09-05T14:30:22Z`. Before the RTC
//! is initialized the stamp is 0.
//!
//! See: <https://defmt.ferrous-systems.com/timestamps>

#![deny(unsafe_code)]
#![deny(warnings)]

mod rtc;

pub use rtc::{initialize_rtc, InternalRtc};

defmt::timestamp!("{=u64:iso8601s}", {
    rtc::read_timestamp().map_or(0, |ts| ts.to_unix_secs())
});
