//! Owns the control-file handle and its in-memory image.
//!
//! All mutation happens under one mutex. `save` rewrites the file from offset
//! zero and orders durability: the output file is fsynced before the control
//! file, so recorded progress never overstates durable data.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::control::{ControlFile, ThreadBlock};
use crate::storage::open_rw;

struct Inner {
    file: File,
    cf: ControlFile,
    dirty: bool,
    /// Output file handle, synced before every control-file rewrite.
    output: Option<Arc<File>>,
}

pub struct ControlFileManager {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl ControlFileManager {
    /// Creates a fresh control file for a download of `total` bytes,
    /// truncating anything already at `path`.
    pub fn create(path: &Path, perm: u32, total: i64) -> std::io::Result<ControlFileManager> {
        let file = open_rw(path, perm)?;
        file.set_len(0)?;
        Ok(ControlFileManager {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                file,
                cf: ControlFile::new(total),
                dirty: true,
                output: None,
            }),
        })
    }

    /// Loads an existing control file if it parses and its recorded total
    /// matches `expected_total`; otherwise returns `None` and leaves the file
    /// untouched (the caller decides between fresh and failure).
    pub fn load(path: &Path, perm: u32, expected_total: i64) -> std::io::Result<Option<ControlFileManager>> {
        let mut file = open_rw(path, perm)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let cf = match ControlFile::parse(&data) {
            Some(cf) if cf.total == expected_total => cf,
            Some(cf) => {
                tracing::debug!(
                    path = %path.display(),
                    recorded = cf.total,
                    expected = expected_total,
                    "control file total mismatch, ignoring"
                );
                return Ok(None);
            }
            None => {
                tracing::debug!(path = %path.display(), "control file corrupt, ignoring");
                return Ok(None);
            }
        };

        Ok(Some(ControlFileManager {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner { file, cf, dirty: false, output: None }),
        }))
    }

    /// Attaches the output file handle so `save` can order its fsync before
    /// the control-file write.
    pub fn bind_output(&self, output: Arc<File>) {
        self.inner.lock().unwrap().output = Some(output);
    }

    /// Appends a block record and returns its index.
    pub fn add_block(&self, completed: i64, start: i64, end: i64) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.cf.blocks.push(ThreadBlock { completed, start, end });
        inner.dirty = true;
        inner.cf.blocks.len() - 1
    }

    /// Replaces a block's completed counter.
    pub fn update_completed(&self, index: usize, completed: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.cf.blocks[index].completed = completed;
        inner.dirty = true;
    }

    /// Snapshot of the current block list.
    pub fn blocks(&self) -> Vec<ThreadBlock> {
        self.inner.lock().unwrap().cf.blocks.clone()
    }

    pub fn total(&self) -> i64 {
        self.inner.lock().unwrap().cf.total
    }

    pub fn completed_bytes(&self) -> i64 {
        self.inner.lock().unwrap().cf.completed_bytes()
    }

    /// Persists the current image: fsync the output first (its data must be
    /// durable before the pointer to it), then rewrite and fsync the control
    /// file.
    pub fn save(&self) -> std::io::Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(out) = inner.output.clone() {
            out.sync_all()?;
        }
        let data = inner.cf.encode();
        inner.file.seek(SeekFrom::Start(0))?;
        inner.file.write_all(&data)?;
        inner.file.set_len(data.len() as u64)?;
        inner.file.sync_all()?;
        inner.dirty = false;
        Ok(())
    }

    /// Periodic flush loop: every `interval`, save if anything changed.
    /// Returns when the token fires. Run on its own thread.
    pub fn autosave_loop(&self, interval: Duration, token: &CancelToken) {
        loop {
            if token.sleep(interval) {
                return;
            }
            let dirty = self.inner.lock().unwrap().dirty;
            if dirty {
                if let Err(e) = self.save() {
                    tracing::warn!(path = %self.path.display(), error = %e, "control file autosave failed");
                }
            }
        }
    }

    /// Closes the handle and deletes the file.
    pub fn remove(&self) -> std::io::Result<()> {
        // Hold the lock so no save interleaves with the unlink.
        let _inner = self.inner.lock().unwrap();
        std::fs::remove_file(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
