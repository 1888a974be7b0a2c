//! Logger configuration structures

use crate::record::DEVICE_ID_CAPACITY;

/// Optional header line written once at the top of each session file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CsvHeader {
    /// No header line
    None,
    /// `date,temp`
    DateTemp,
    /// `ID,date,temp`, paired with a device ID column
    IdDateTemp,
}

impl CsvHeader {
    /// Header text without line terminator
    pub const fn line(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::DateTemp => Some("date,temp"),
            Self::IdDateTemp => Some("ID,date,temp"),
        }
    }
}

/// Top-level logger configuration
#[derive(Debug, Clone, Copy)]
pub struct LoggerConfig {
    /// Sampling interval in milliseconds
    pub interval_ms: u32,
    /// Header written when the session file is created
    pub header: CsvHeader,
    /// Fixed device ID prefixed to every row
    ///
    /// At most [`DEVICE_ID_CAPACITY`] printable ASCII bytes, no commas;
    /// [`Controller::boot`](crate::Controller::boot) refuses anything else.
    pub device_id: Option<&'static str>,
    /// Duration of the activity LED pulse in milliseconds
    pub pulse_ms: u32,
    /// Clock synchronization settings
    pub sync: SyncConfig,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            header: CsvHeader::DateTemp,
            device_id: None,
            pulse_ms: 100,
            sync: SyncConfig::default(),
        }
    }
}

impl LoggerConfig {
    /// Whether the device ID fits the row buffer as a single CSV column
    pub fn device_id_fits(&self) -> bool {
        match self.device_id {
            None => true,
            Some(id) => {
                id.len() <= DEVICE_ID_CAPACITY
                    && id.bytes().all(|b| b.is_ascii_graphic() && b != b',')
            }
        }
    }
}

/// Serial clock synchronization settings
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    /// Time allowed for a started line to complete, in milliseconds
    pub line_timeout_ms: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            line_timeout_ms: 1000,
        }
    }
}

/// Busy-wait pacing settings
#[derive(Debug, Clone, Copy)]
pub struct BusyWaitConfig {
    /// Floor applied when a cycle overran its interval
    pub min_delay_ms: u32,
    /// Granularity of the wait loop that services the indicator
    pub step_ms: u32,
}

impl Default for BusyWaitConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 10,
            step_ms: 10,
        }
    }
}

/// Power-managed scheduling settings
#[derive(Debug, Clone, Copy)]
pub struct PowerConfig {
    /// How long the serial console listens after each wake-up
    pub wake_window_ms: u32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self { wake_window_ms: 50 }
    }
}

/// RTD front-end calibration
#[derive(Debug, Clone, Copy)]
pub struct RtdConfig {
    /// Sensor resistance at 0 °C (100.0 for PT100, 1000.0 for PT1000)
    pub r_nominal: f32,
    /// Reference resistor on the converter board
    pub r_ref: f32,
    /// 3-wire connection instead of 2/4-wire
    pub three_wire: bool,
}

impl Default for RtdConfig {
    fn default() -> Self {
        Self::pt100()
    }
}

impl RtdConfig {
    /// PT100 with a 430 Ω reference resistor
    pub const fn pt100() -> Self {
        Self {
            r_nominal: 100.0,
            r_ref: 430.0,
            three_wire: false,
        }
    }

    /// PT1000 with a 4.3 kΩ reference resistor
    pub const fn pt1000() -> Self {
        Self {
            r_nominal: 1000.0,
            r_ref: 4300.0,
            three_wire: false,
        }
    }
}

/// Half-duplex serial-bus sensor settings
#[derive(Debug, Clone, Copy)]
pub struct Rs485Config {
    /// Request frame sent before each read
    pub address_frame: &'static [u8],
    /// How long to collect response bytes, in milliseconds
    pub response_timeout_ms: u32,
}

impl Default for Rs485Config {
    fn default() -> Self {
        Self {
            address_frame: b"01\r\n",
            response_timeout_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_id(id: &'static str) -> LoggerConfig {
        LoggerConfig {
            device_id: Some(id),
            ..LoggerConfig::default()
        }
    }

    #[test]
    fn test_device_id_limits() {
        assert!(LoggerConfig::default().device_id_fits());
        assert!(with_id("T1").device_id_fits());
        assert!(with_id("0123456789ABCDEF0123456789ABCDEF").device_id_fits());
        assert!(!with_id("0123456789ABCDEF0123456789ABCDEF0").device_id_fits());
        assert!(!with_id("T,1").device_id_fits());
        assert!(!with_id("T 1").device_id_fits());
        assert!(!with_id("T1\r\n").device_id_fits());
    }
}
