//! Output-file I/O: open/preallocate, pwrite-style positional writes, and the
//! per-block buffered sink that feeds them.

mod block_writer;
mod builder;
mod writer;

pub use block_writer::{BlockWriter, OutputFile};
pub use builder::OutputFileBuilder;
pub use writer::StorageWriter;

use std::fs::File;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

/// Sidecar control-file path: `<output>.<suffix>` (e.g. `file.iso.down`).
pub fn control_path(output: &Path, suffix: &str) -> PathBuf {
    let mut o = output.as_os_str().to_owned();
    o.push(".");
    o.push(suffix);
    PathBuf::from(o)
}

/// Opens `path` read+write, creating it with `perm` when missing.
/// Never truncates.
pub fn open_rw(path: &Path, perm: u32) -> std::io::Result<File> {
    let mut opts = File::options();
    opts.read(true).write(true).create(true);
    #[cfg(unix)]
    opts.mode(perm);
    #[cfg(not(unix))]
    let _ = perm;
    opts.open(path)
}
