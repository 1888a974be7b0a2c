//! FAT32 storage on an SPI SD card
//!
//! `embedded-sdmmc` only handles 8.3 names, so a session file is stored at
//! its [`ShortPath`]: `log_YYYYMMDD_HHMMSS.csv` becomes `YYYYMMDD/HHMMSS.CSV`.
//!
//! Directory entry times come from the timestamp passed with each append.
//! The driver asks its [`TimeSource`] for the time while it updates the
//! entry, so that value is parked in a shared cell just before the write.

#![deny(unsafe_code)]
#![deny(warnings)]

use core::cell::Cell;

use defmt::{debug, info, Format};
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{
    Mode, RawDirectory, SdCard, SdCardError, TimeSource, VolumeIdx, VolumeManager,
};
use hal_abstractions::{DirEntryTime, FileStore, Timestamp};
use logger_core::ShortPath;
use static_cell::StaticCell;

type SdError = embedded_sdmmc::Error<SdCardError>;

/// Storage operation errors
#[derive(Debug, Format)]
pub enum StorageError {
    /// `mount` has not succeeded yet
    NotMounted,
    /// The file name does not follow the session naming pattern
    BadName,
    /// Card or filesystem failure
    Sd(SdError),
}

impl From<SdError> for StorageError {
    fn from(e: SdError) -> Self {
        Self::Sd(e)
    }
}

/// Directory entry time for the write in progress
static STAMP: StaticCell<Cell<DirEntryTime>> = StaticCell::new();

/// Feeds the parked append timestamp to the FAT driver
#[derive(Clone, Copy)]
pub struct StampSource(&'static Cell<DirEntryTime>);

impl TimeSource for StampSource {
    fn get_timestamp(&self) -> embedded_sdmmc::Timestamp {
        let DirEntryTime { date, time } = self.0.get();
        embedded_sdmmc::Timestamp::from_fat(date, time)
    }
}

/// SD card FAT volume implementing [`FileStore`]
pub struct SdStore<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    volumes: VolumeManager<SdCard<S, D>, StampSource>,
    stamp: &'static Cell<DirEntryTime>,
    root: Option<RawDirectory>,
}

impl<S, D> SdStore<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    /// Wrap the card; may be called only once
    pub fn new(spi: S, delay: D) -> Self {
        let epoch = Timestamp::new(2000, 1, 1, 0, 0, 0)
            .map(DirEntryTime::from)
            .unwrap_or(DirEntryTime { date: 0, time: 0 });
        let stamp: &'static Cell<DirEntryTime> = STAMP.init(Cell::new(epoch));
        let card = SdCard::new(spi, delay);
        Self {
            volumes: VolumeManager::new(card, StampSource(stamp)),
            stamp,
            root: None,
        }
    }

    fn root(&self) -> Result<RawDirectory, StorageError> {
        self.root.ok_or(StorageError::NotMounted)
    }

    /// Open the session directory, creating it if `create` is set
    fn open_dir(&mut self, name: &str, create: bool) -> Result<Option<RawDirectory>, StorageError> {
        let root = self.root()?;
        if create {
            match self.volumes.make_dir_in_dir(root, name) {
                Ok(()) => debug!("Created directory {}", name),
                Err(embedded_sdmmc::Error::DirAlreadyExists) => {}
                Err(e) => return Err(e.into()),
            }
        }
        match self.volumes.open_dir(root, name) {
            Ok(dir) => Ok(Some(dir)),
            Err(embedded_sdmmc::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl<S, D> FileStore for SdStore<S, D>
where
    S: SpiDevice,
    D: DelayNs,
{
    type Error = StorageError;

    fn mount(&mut self) -> Result<(), Self::Error> {
        let volume = self.volumes.open_raw_volume(VolumeIdx(0))?;
        self.root = Some(self.volumes.open_root_dir(volume)?);
        info!("SD card volume 0 mounted");
        Ok(())
    }

    fn file_len(&mut self, name: &str) -> Result<Option<u32>, Self::Error> {
        let path = ShortPath::from_file_name(name).ok_or(StorageError::BadName)?;
        let Some(dir) = self.open_dir(path.dir(), false)? else {
            return Ok(None);
        };

        let len = match self.volumes.find_directory_entry(dir, path.file()) {
            Ok(entry) => Ok(Some(entry.size)),
            Err(embedded_sdmmc::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        };
        self.volumes.close_dir(dir)?;
        len
    }

    fn append(&mut self, name: &str, data: &[u8], stamp: Timestamp) -> Result<(), Self::Error> {
        let path = ShortPath::from_file_name(name).ok_or(StorageError::BadName)?;
        self.stamp.set(DirEntryTime::from(stamp));

        let dir = self
            .open_dir(path.dir(), true)?
            .ok_or(StorageError::Sd(embedded_sdmmc::Error::NotFound))?;

        let written = match self.volumes.open_file_in_dir(
            dir,
            path.file(),
            Mode::ReadWriteCreateOrAppend,
        ) {
            Ok(file) => {
                let write = self.volumes.write(file, data);
                // Closing flushes the data and updates the directory entry
                let close = self.volumes.close_file(file);
                write.and(close).map_err(StorageError::from)
            }
            Err(e) => Err(e.into()),
        };
        self.volumes.close_dir(dir)?;
        written
    }
}
