//! Creating and preallocating the output file.

use std::fs::File;
use std::path::Path;

use super::writer::StorageWriter;
use super::open_rw;

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Builder for the output file of a fresh download. `preallocate` then
/// `build` yields a `StorageWriter` shared by all workers.
pub struct OutputFileBuilder {
    file: File,
}

impl OutputFileBuilder {
    /// Creates (or truncates) the output file at `path` with mode `perm`.
    pub fn create(path: &Path, perm: u32) -> std::io::Result<OutputFileBuilder> {
        let file = open_rw(path, perm)?;
        file.set_len(0)?;
        Ok(OutputFileBuilder { file })
    }

    /// Opens an existing output file for resume; its contents are kept.
    pub fn open_existing(path: &Path, perm: u32) -> std::io::Result<OutputFileBuilder> {
        let file = open_rw(path, perm)?;
        Ok(OutputFileBuilder { file })
    }

    /// Sizes the file to `size` bytes. On Unix tries `posix_fallocate` for
    /// real block allocation, falling back to `set_len` when the filesystem
    /// refuses.
    pub fn preallocate(&mut self, size: u64) -> std::io::Result<()> {
        #[cfg(unix)]
        if size > 0 {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, "posix_fallocate failed, falling back to set_len");
        }
        self.file.set_len(size)
    }

    pub fn build(self) -> StorageWriter {
        StorageWriter::new(self.file)
    }
}
