//! Capture record backed by a file on local storage.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use motorbench_traits::{BoxError, RecordSink};

use crate::error::{HwError, Result};

/// Writes the capture record to a fixed path.
///
/// `truncate` (re)creates the file, so a new session always replaces the
/// previous record. Each append is written straight to the file, so a
/// failing medium is reported by the append that hit it. `close` syncs.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    file: Option<File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open(&mut self) -> Result<()> {
        self.file = None;
        self.file = Some(File::create(&self.path)?);
        tracing::debug!(path = %self.path.display(), "capture record truncated");
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(HwError::Closed)?;
        file.write_all(bytes)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_data()?;
            tracing::debug!(path = %self.path.display(), "capture record closed");
        }
        Ok(())
    }
}

impl RecordSink for FileSink {
    fn truncate(&mut self) -> std::result::Result<(), BoxError> {
        self.open().map_err(Into::into)
    }

    fn append(&mut self, bytes: &[u8]) -> std::result::Result<(), BoxError> {
        self.write(bytes).map_err(Into::into)
    }

    fn close(&mut self) -> std::result::Result<(), BoxError> {
        self.finish().map_err(Into::into)
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(error = %e, "failed to sync capture record on drop");
        }
    }
}
