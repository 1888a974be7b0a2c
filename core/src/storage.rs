//! Append-only CSV log over a [`FileStore`]

use hal_abstractions::FileStore;

use crate::buffer::LineBuf;
use crate::config::CsvHeader;
use crate::console::EOL;
use crate::fault::Fault;
use crate::fmt::Debug2Format;
use crate::record::{RowBuf, SampleRecord};
use crate::session::Session;

/// CSV writer bound to one storage device
///
/// Holds no file handle; each call opens, writes, flushes and closes.
pub struct CsvLog<F> {
    store: F,
    header: CsvHeader,
    device_id: Option<&'static str>,
}

impl<F: FileStore> CsvLog<F> {
    pub fn new(store: F, header: CsvHeader, device_id: Option<&'static str>) -> Self {
        Self {
            store,
            header,
            device_id,
        }
    }

    pub fn mount(&mut self) -> Result<(), F::Error> {
        self.store.mount()
    }

    /// Create the session file and write the header into it if it is empty
    ///
    /// Safe to call more than once: a file that already has content is left
    /// untouched, so the header can never be duplicated.
    pub fn ensure_header(&mut self, session: &Session) -> Result<(), F::Error> {
        let name = session.file_name();
        if self.store.file_len(name)?.unwrap_or(0) > 0 {
            debug!("{} already has content, header skipped", name);
            return Ok(());
        }

        let mut line = LineBuf::<16>::new();
        if let Some(header) = self.header.line() {
            // Header variants are short constants
            let _ = line.push_bytes(header.as_bytes());
            let _ = line.push_bytes(EOL);
        }
        self.store.append(name, line.as_bytes(), session.started())?;
        info!("Session file {} created", name);
        Ok(())
    }

    /// Append one row to the session file
    ///
    /// On failure the row is dropped; nothing is queued for retry.
    pub fn append(&mut self, session: &Session, record: &SampleRecord) -> Result<(), Fault> {
        let mut row = RowBuf::new();
        if record.write_fields(self.device_id, &mut row).is_err() || row.push_bytes(EOL).is_err() {
            warn!("Row does not fit the row buffer, dropped");
            return Err(Fault::StorageUnavailable);
        }

        self.store
            .append(session.file_name(), row.as_bytes(), record.timestamp)
            .map_err(|e| {
                warn!("Append to {} failed: {:?}", session.file_name(), Debug2Format(&e));
                Fault::StorageUnavailable
            })
    }

    pub fn device_id(&self) -> Option<&'static str> {
        self.device_id
    }
}
