//! Sensor front-ends
//!
//! - **`rtd`**: MAX31865 RTD-to-digital converter on SPI
//! - **`rs485`**: request/response probe on a half-duplex serial bus

pub mod rs485;
pub mod rtd;

pub use rs485::Rs485Probe;
pub use rtd::Max31865;

use crate::fault::Fault;
use crate::record::Measurement;

/// A sensor that can be sampled once per cycle
///
/// A read never fails outright: faults come back as a [`Fault`] next to a
/// sentinel measurement so the row is still logged.
pub trait SensorReader {
    fn read(&mut self) -> impl core::future::Future<Output = (Measurement, Fault)>;
}
