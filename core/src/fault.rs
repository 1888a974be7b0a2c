//! Fault and boot error types

use core::fmt;

/// Per-cycle outcome flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Nothing went wrong
    #[default]
    None,
    /// The sensor reported a fault; the row carries the NaN sentinel
    SensorFault,
    /// The session file could not be opened or written
    StorageUnavailable,
    /// A `SYNC_TIME:` body was not six integers
    SyncFormatError,
    /// A `SYNC_TIME:` field was outside its calendar range
    SyncRangeError,
}

impl Fault {
    pub fn is_none(&self) -> bool {
        *self == Self::None
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "no fault"),
            Self::SensorFault => write!(f, "sensor fault"),
            Self::StorageUnavailable => write!(f, "storage unavailable"),
            Self::SyncFormatError => write!(f, "sync command malformed"),
            Self::SyncRangeError => write!(f, "sync field out of range"),
        }
    }
}

/// Unrecoverable start-up conditions; the device halts on any of these
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// The configured device ID cannot be written as a CSV column
    DeviceId,
    /// Clock peripheral unreachable
    Clock,
    /// Storage card or volume unreachable
    Storage,
    /// Session file could not be created
    SessionFile,
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceId => write!(f, "device ID unusable as a CSV column"),
            Self::Clock => write!(f, "clock unreachable"),
            Self::Storage => write!(f, "storage unreachable"),
            Self::SessionFile => write!(f, "session file could not be created"),
        }
    }
}

impl core::error::Error for BootError {}
