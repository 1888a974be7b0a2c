//! Append-only file storage on removable media
//!
//! The logger never keeps a file handle across calls: every `append` opens,
//! writes, flushes and closes, so a power loss between calls cannot leave a
//! dangling write.

use crate::time::Timestamp;

/// Packed FAT directory-entry date/time pair
///
/// ```text
/// date: bits 15-9 year-1980, bits 8-5 month, bits 4-0 day
/// time: bits 15-11 hour,     bits 10-5 minute, bits 4-0 second/2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DirEntryTime {
    pub date: u16,
    pub time: u16,
}

impl From<Timestamp> for DirEntryTime {
    fn from(ts: Timestamp) -> Self {
        let date = ((ts.year() - 1980) << 9) | ((ts.month() as u16) << 5) | ts.day() as u16;
        let time =
            ((ts.hour() as u16) << 11) | ((ts.minute() as u16) << 5) | (ts.second() as u16 / 2);
        Self { date, time }
    }
}

/// Filesystem on removable storage
pub trait FileStore {
    /// Driver-specific failure
    type Error: core::fmt::Debug;

    /// Initialize the card and mount the volume
    fn mount(&mut self) -> Result<(), Self::Error>;

    /// Size of `name` in bytes, `None` when the file does not exist
    fn file_len(&mut self, name: &str) -> Result<Option<u32>, Self::Error>;

    /// Append `data` to `name`, creating the file if needed
    ///
    /// The write lands after any existing content. The file is flushed and
    /// closed before this returns. `stamp` becomes the directory entry's
    /// modification time (see [`DirEntryTime`]).
    fn append(&mut self, name: &str, data: &[u8], stamp: Timestamp) -> Result<(), Self::Error>;
}
