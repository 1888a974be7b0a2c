//! Internal RTC driver behind the [`hal_abstractions::Rtc`] trait

use core::cell::RefCell;

use critical_section::Mutex;
use defmt::{info, warn, Format};
use embassy_stm32::rtc::{DateTime, DayOfWeek, Rtc, RtcError as HwError};
use hal_abstractions::Timestamp;

/// Global internal RTC instance, shared with the defmt timestamp
static RTC: Mutex<RefCell<Option<Rtc>>> = Mutex::new(RefCell::new(None));

/// Calendar value the RTC is seeded with when it has never been set
const FACTORY_TIME: (u16, u8, u8) = (2000, 1, 1);

/// RTC operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum RtcError {
    /// `initialize_rtc` was never called
    NotInitialized,
    /// The peripheral rejected the access
    HardwareError,
    /// The calendar registers hold a value outside the logger's range
    InvalidDateTime,
}

impl core::fmt::Display for RtcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "RTC not initialized"),
            Self::HardwareError => write!(f, "RTC hardware error"),
            Self::InvalidDateTime => write!(f, "RTC date/time out of range"),
        }
    }
}

impl core::error::Error for RtcError {}

/// Hand the RTC peripheral to the time module
///
/// Must be called once during system initialization before any time operations.
pub fn initialize_rtc(rtc: Rtc) {
    critical_section::with(|cs| {
        RTC.borrow(cs).replace(Some(rtc));
    });
    info!("Internal RTC initialized");
}

fn with_rtc<R>(f: impl FnOnce(&mut Rtc) -> Result<R, RtcError>) -> Result<R, RtcError> {
    critical_section::with(|cs| match RTC.borrow(cs).borrow_mut().as_mut() {
        Some(rtc) => f(rtc),
        None => Err(RtcError::NotInitialized),
    })
}

fn day_of_week(iso: u8) -> DayOfWeek {
    match iso {
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        6 => DayOfWeek::Saturday,
        _ => DayOfWeek::Sunday,
    }
}

fn to_datetime(ts: Timestamp) -> Result<DateTime, RtcError> {
    DateTime::from(
        ts.year(),
        ts.month(),
        ts.day(),
        day_of_week(ts.weekday()),
        ts.hour(),
        ts.minute(),
        ts.second(),
        0, // microsecond
    )
    .map_err(|_| RtcError::InvalidDateTime)
}

fn from_datetime(dt: &DateTime) -> Result<Timestamp, RtcError> {
    Timestamp::new(
        dt.year(),
        dt.month(),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second(),
    )
    .map_err(|_| RtcError::InvalidDateTime)
}

/// Read the current time from the RTC registers
pub(super) fn read_timestamp() -> Result<Timestamp, RtcError> {
    with_rtc(|rtc| {
        let now = rtc.now().map_err(|_| RtcError::HardwareError)?;
        from_datetime(&now)
    })
}

/// Handle to the global internal RTC
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalRtc;

impl hal_abstractions::Rtc for InternalRtc {
    type Error = RtcError;

    /// Confirm the RTC answers, seeding it if its calendar was never set
    fn begin(&mut self) -> Result<(), Self::Error> {
        with_rtc(|rtc| match rtc.now() {
            Ok(_) => Ok(()),
            Err(HwError::NotRunning) => {
                warn!("RTC calendar not running, seeding 2000-01-01");
                let (year, month, day) = FACTORY_TIME;
                let seed = Timestamp::new(year, month, day, 0, 0, 0)
                    .map_err(|_| RtcError::InvalidDateTime)?;
                rtc.set_datetime(to_datetime(seed)?)
                    .map_err(|_| RtcError::HardwareError)
            }
            Err(_) => Err(RtcError::HardwareError),
        })
    }

    fn now(&mut self) -> Result<Timestamp, Self::Error> {
        read_timestamp()
    }

    fn adjust(&mut self, timestamp: Timestamp) -> Result<(), Self::Error> {
        let datetime = to_datetime(timestamp)?;
        with_rtc(|rtc| {
            rtc.set_datetime(datetime)
                .map_err(|_| RtcError::HardwareError)
        })
    }
}
