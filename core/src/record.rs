//! One sample and its CSV rendering

use core::fmt::{self, Write};

use hal_abstractions::Timestamp;
use heapless::Vec;

use crate::buffer::LineBuf;

/// Bytes captured from a serial-bus sensor; anything beyond is discarded
pub const RAW_CAPACITY: usize = 64;

/// Longest device ID the row buffer accounts for
pub const DEVICE_ID_CAPACITY: usize = 32;

/// Room for `ID,` + timestamp + `,` + measurement + CRLF
pub const ROW_CAPACITY: usize = DEVICE_ID_CAPACITY + 1 + 20 + 1 + RAW_CAPACITY + 2;

/// A single CSV row under construction
pub type RowBuf = LineBuf<ROW_CAPACITY>;

/// Value produced by one sensor read
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// Degrees Celsius; `NaN` marks a faulted read
    Temperature(f32),
    /// Response bytes exactly as received
    Raw(Vec<u8, RAW_CAPACITY>),
}

impl Measurement {
    /// Sentinel logged in place of a faulted temperature
    pub const fn sentinel() -> Self {
        Self::Temperature(f32::NAN)
    }

    /// Render the value as it appears in the CSV column
    pub fn write_to<const N: usize>(&self, out: &mut LineBuf<N>) -> fmt::Result {
        match self {
            Self::Temperature(t) if t.is_nan() => out.write_str("NaN"),
            Self::Temperature(t) => write!(out, "{:.2}", t),
            Self::Raw(bytes) => out.push_bytes(bytes),
        }
    }
}

/// Timestamped measurement, one per cycle
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub timestamp: Timestamp,
    pub measurement: Measurement,
}

impl SampleRecord {
    pub fn new(timestamp: Timestamp, measurement: Measurement) -> Self {
        Self {
            timestamp,
            measurement,
        }
    }

    /// Render `[ID,]timestamp,measurement` without a line terminator
    pub fn write_fields(&self, device_id: Option<&str>, out: &mut RowBuf) -> fmt::Result {
        if let Some(id) = device_id {
            write!(out, "{},", id)?;
        }
        write!(out, "{},", self.timestamp)?;
        self.measurement.write_to(out)
    }
}
