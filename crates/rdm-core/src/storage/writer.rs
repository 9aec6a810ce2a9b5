//! Concurrent offset writer for the output file.

use std::fs::File;
use std::sync::Arc;

#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Writer for the output file. Safe to clone and use from multiple workers;
/// each `write_at` is independent (pwrite-style), there is no shared cursor.
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
}

impl StorageWriter {
    pub(crate) fn new(file: File) -> Self {
        StorageWriter { file: Arc::new(file) }
    }

    /// Shared handle to the underlying file (used for fsync ordering by the
    /// control-file manager).
    pub fn file(&self) -> Arc<File> {
        Arc::clone(&self.file)
    }

    /// Write `data` at `offset` without moving any cursor.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    /// Non-Unix fallback: seek + write on a cloned handle.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    /// Flush file data to durable storage.
    pub fn sync(&self) -> std::io::Result<()> {
        self.file.sync_all()
    }
}
