//! Append-only CSV log of generated signals.

use crate::error::{PipelineError, Result};
use crate::types::SignalRecord;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

pub const HISTORY_HEADER: &str =
    "time,symbol,trend,signal,latest_price,predicted_price,RSI,SMA_20";

/// Writes one row per generated signal, oldest first.
///
/// The file is created together with its header in a single rename, and each
/// row goes out in one `write_all` on an append-mode handle, so separate
/// processes sharing the file never duplicate the header or split a row.
pub struct HistoryRecorder {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &SignalRecord) -> Result<()> {
        let row = self.encode(record)?;
        let _guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::storage(self.path.display(), "history lock poisoned"))?;

        self.ensure_created()?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.storage_err(e))?;

        // An existing but empty file has no header yet.
        let empty = file.metadata().map_err(|e| self.storage_err(e))?.len() == 0;
        let bytes = if empty {
            let mut bytes = format!("{}\n", HISTORY_HEADER).into_bytes();
            bytes.extend_from_slice(&row);
            bytes
        } else {
            row
        };
        file.write_all(&bytes).map_err(|e| self.storage_err(e))?;

        debug!(
            symbol = %record.symbol,
            path = %self.path.display(),
            wrote_header = empty,
            "Appended signal history row"
        );
        Ok(())
    }

    /// Every record, in the order written. A missing file reads as empty.
    pub fn read_all(&self) -> Result<Vec<SignalRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| self.storage_err(e))?;
        reader
            .deserialize()
            .collect::<std::result::Result<Vec<SignalRecord>, _>>()
            .map_err(|e| self.storage_err(e))
    }

    /// The newest `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Result<Vec<SignalRecord>> {
        let mut records = self.read_all()?;
        let start = records.len().saturating_sub(n);
        Ok(records.split_off(start))
    }

    fn encode(&self, record: &SignalRecord) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.serialize(record).map_err(|e| self.storage_err(e))?;
        writer.into_inner().map_err(|e| self.storage_err(e))
    }

    fn ensure_created(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.storage_err(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.storage_err(e))?;
        writeln!(tmp, "{}", HISTORY_HEADER).map_err(|e| self.storage_err(e))?;

        match tmp.persist_noclobber(&self.path) {
            Ok(_) => {
                debug!(path = %self.path.display(), "Created signal history");
                Ok(())
            }
            // Another writer created it first.
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(self.storage_err(e.error)),
        }
    }

    fn storage_err(&self, err: impl std::fmt::Display) -> PipelineError {
        PipelineError::storage(self.path.display(), err)
    }
}
