//! Per-boot logging session

use core::fmt::Write;

use heapless::String;
use hal_abstractions::Timestamp;

/// Capacity of a session file name, `log_YYYYMMDD_HHMMSS.csv` is 23 bytes
pub const FILE_NAME_CAPACITY: usize = 24;

/// One power-on run of the logger
///
/// The file name is derived once from the boot timestamp and never changes,
/// whatever happens to the clock afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    file_name: String<FILE_NAME_CAPACITY>,
    started: Timestamp,
}

impl Session {
    pub fn from_boot(started: Timestamp) -> Self {
        let mut file_name = String::new();
        // Fixed-width fields always fit
        let _ = write!(
            file_name,
            "log_{:04}{:02}{:02}_{:02}{:02}{:02}.csv",
            started.year(),
            started.month(),
            started.day(),
            started.hour(),
            started.minute(),
            started.second()
        );
        Self { file_name, started }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Boot timestamp the session was named after
    pub fn started(&self) -> Timestamp {
        self.started
    }
}

/// 8.3 location of a session file on a FAT volume without long names
///
/// `log_YYYYMMDD_HHMMSS.csv` lives at `YYYYMMDD/HHMMSS.CSV`, one directory
/// per boot date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortPath {
    dir: String<8>,
    file: String<12>,
}

impl ShortPath {
    /// `None` unless `name` is a session file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_prefix("log_")?.strip_suffix(".csv")?;
        let (date, time) = stem.split_once('_')?;
        let digits = |s: &str, len| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(date, 8) || !digits(time, 6) {
            return None;
        }

        let mut dir = String::new();
        let mut file = String::new();
        dir.push_str(date).ok()?;
        write!(file, "{}.CSV", time).ok()?;
        Some(Self { dir, file })
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn file(&self) -> &str {
        &self.file
    }
}
