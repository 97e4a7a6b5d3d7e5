//! Persistent log of failed files
//!
//! One line per failure, appended. The file is only created once the first
//! failure is recorded, so a clean run leaves nothing behind.

use crate::error::Result;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only error log
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    file: Option<File>,
    written: usize,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of lines recorded by this log
    pub fn written(&self) -> usize {
        self.written
    }

    /// Append one failure line for `source`
    pub fn record(&mut self, source: &Path, reason: &str) -> Result<()> {
        if self.file.is_none() {
            self.file = Some(self.open()?);
        }

        let line = format!("{}: {}", source.display(), reason).replace(['\r', '\n'], " ");
        if let Some(file) = self.file.as_mut() {
            writeln!(file, "{}", line)?;
            self.written += 1;
        }
        Ok(())
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        debug!(path = ?self.path, "Creating error log");
        Ok(OpenOptions::new().create(true).append(true).open(&self.path)?)
    }
}
