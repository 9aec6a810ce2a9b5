//! Per-block positional sink.
//!
//! Each worker streams its HTTP body through a `BlockWriter`: bytes are
//! rate-gated, buffered up to the disk-cache size, written at absolute
//! offsets, and accounted in both the job's aggregate counter and the
//! control file's per-block counter.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::control::ControlFileManager;
use crate::error::DownError;
use crate::limiter::RateGate;
use crate::storage::StorageWriter;

/// Shared write-side state of one download job.
pub struct OutputFile {
    writer: StorageWriter,
    control: Arc<ControlFileManager>,
    completed: Arc<AtomicI64>,
    gate: Option<RateGate>,
    disk_cache: usize,
    token: CancelToken,
}

impl OutputFile {
    pub fn new(
        writer: StorageWriter,
        control: Arc<ControlFileManager>,
        completed: Arc<AtomicI64>,
        gate: Option<RateGate>,
        disk_cache: usize,
        token: CancelToken,
    ) -> OutputFile {
        OutputFile { writer, control, completed, gate, disk_cache, token }
    }

    pub fn writer(&self) -> &StorageWriter {
        &self.writer
    }

    /// Sink for block `block`, writing from absolute `offset` with the
    /// block's counter already at `completed`. `expected` is the number of
    /// bytes the transfer should deliver (`None` when the total is unknown).
    pub fn block_writer(
        &self,
        block: usize,
        offset: i64,
        completed: i64,
        expected: Option<i64>,
    ) -> BlockWriter<'_> {
        let cap = match expected {
            Some(n) if n >= 0 => self.disk_cache.min(n as usize),
            _ => self.disk_cache,
        };
        BlockWriter {
            out: self,
            block,
            offset,
            completed,
            expected,
            received: 0,
            buf: Vec::with_capacity(cap),
            cap,
            error: None,
        }
    }
}

pub struct BlockWriter<'a> {
    out: &'a OutputFile,
    block: usize,
    /// Next absolute write offset; advances with each flushed chunk.
    offset: i64,
    /// Block completed counter mirrored into the control file.
    completed: i64,
    expected: Option<i64>,
    received: i64,
    buf: Vec<u8>,
    cap: usize,
    error: Option<DownError>,
}

impl BlockWriter<'_> {
    /// Accepts a chunk from the transfer. Returns false to abort the
    /// transfer; the actual error is then available from `take_error`.
    /// On cancellation the current buffer is abandoned: everything already
    /// flushed is recorded in the block counter, nothing more.
    pub fn push(&mut self, data: &[u8]) -> bool {
        if self.error.is_some() {
            return false;
        }
        if let Err(e) = self.out.token.check() {
            self.error = Some(e);
            return false;
        }
        if let Some(gate) = &self.out.gate {
            if let Err(e) = gate.admit(data.len(), &self.out.token) {
                self.error = Some(e);
                return false;
            }
        }

        self.out.completed.fetch_add(data.len() as i64, Ordering::Relaxed);
        self.received += data.len() as i64;

        if self.cap == 0 {
            return match self.write_chunk(data) {
                Ok(()) => true,
                Err(e) => {
                    self.error = Some(e);
                    false
                }
            };
        }

        let mut rest = data;
        while !rest.is_empty() {
            let room = self.cap - self.buf.len();
            let take = room.min(rest.len());
            self.buf.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.buf.len() >= self.cap {
                if let Err(e) = self.flush_buf() {
                    self.error = Some(e);
                    return false;
                }
            }
        }
        true
    }

    /// Flushes the remaining buffer. Must be called after a successful
    /// transfer; verifies the expected byte count when one was given.
    pub fn finish(&mut self) -> Result<(), DownError> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.flush_buf()?;
        if let Some(expected) = self.expected {
            if self.received != expected {
                return Err(DownError::PartialTransfer {
                    expected,
                    received: self.received,
                });
            }
        }
        Ok(())
    }

    pub fn take_error(&mut self) -> Option<DownError> {
        self.error.take()
    }

    pub fn received(&self) -> i64 {
        self.received
    }

    fn flush_buf(&mut self) -> Result<(), DownError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let buf = std::mem::take(&mut self.buf);
        let r = self.write_chunk(&buf);
        self.buf = buf;
        self.buf.clear();
        r
    }

    fn write_chunk(&mut self, data: &[u8]) -> Result<(), DownError> {
        self.out.writer.write_at(self.offset as u64, data)?;
        self.offset += data.len() as i64;
        self.completed += data.len() as i64;
        self.out.control.update_completed(self.block, self.completed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlFileManager;
    use crate::storage::OutputFileBuilder;

    fn fixture(dir: &std::path::Path, total: i64, disk_cache: usize) -> (OutputFile, Arc<ControlFileManager>, std::path::PathBuf) {
        let out_path = dir.join("out.bin");
        let ctl_path = dir.join("out.bin.down");
        let mut b = OutputFileBuilder::create(&out_path, 0o600).unwrap();
        b.preallocate(total as u64).unwrap();
        let writer = b.build();
        let control = Arc::new(ControlFileManager::create(&ctl_path, 0o600, total).unwrap());
        let out = OutputFile::new(
            writer,
            Arc::clone(&control),
            Arc::new(AtomicI64::new(0)),
            None,
            disk_cache,
            CancelToken::new(),
        );
        (out, control, out_path)
    }

    #[test]
    fn buffered_writes_land_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let (out, control, path) = fixture(dir.path(), 16, 4);
        let idx = control.add_block(0, 4, 11);

        let mut bw = out.block_writer(idx, 4, 0, Some(8));
        assert!(bw.push(b"abc"));
        // Less than the 4-byte cache: nothing flushed yet.
        assert_eq!(control.blocks()[idx].completed, 0);
        assert!(bw.push(b"defgh"));
        bw.finish().unwrap();

        assert_eq!(control.blocks()[idx].completed, 8);
        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[4..12], b"abcdefgh");
    }

    #[test]
    fn resume_offsets_and_counter_base() {
        let dir = tempfile::tempdir().unwrap();
        let (out, control, path) = fixture(dir.path(), 10, 64);
        let idx = control.add_block(3, 0, 9);

        // Block had 3 bytes done; the worker fetches the remaining 7.
        let mut bw = out.block_writer(idx, 3, 3, Some(7));
        assert!(bw.push(&b"restofit"[..7]));
        bw.finish().unwrap();
        assert_eq!(control.blocks()[idx].completed, 10);
        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[3..10], b"restofi");
    }

    #[test]
    fn partial_transfer_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (out, control, _path) = fixture(dir.path(), 10, 64);
        let idx = control.add_block(0, 0, 9);
        let mut bw = out.block_writer(idx, 0, 0, Some(10));
        assert!(bw.push(b"short"));
        match bw.finish() {
            Err(DownError::PartialTransfer { expected: 10, received: 5 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn cancel_abandons_buffer_but_keeps_flushed_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("out.bin");
        let ctl_path = dir.path().join("out.bin.down");
        let mut b = OutputFileBuilder::create(&out_path, 0o600).unwrap();
        b.preallocate(12).unwrap();
        let control = Arc::new(ControlFileManager::create(&ctl_path, 0o600, 12).unwrap());
        let token = CancelToken::new();
        let out = OutputFile::new(
            b.build(),
            Arc::clone(&control),
            Arc::new(AtomicI64::new(0)),
            None,
            4,
            token.clone(),
        );
        let idx = control.add_block(0, 0, 11);

        let mut bw = out.block_writer(idx, 0, 0, Some(12));
        assert!(bw.push(b"abcd"));
        assert_eq!(control.blocks()[idx].completed, 4);
        assert!(bw.push(b"ef"));
        token.cancel();
        assert!(!bw.push(b"gh"));
        // The two buffered bytes were abandoned; the counter still reads 4.
        assert_eq!(control.blocks()[idx].completed, 4);
        assert!(bw.take_error().unwrap().is_cancel());
    }

    #[test]
    fn zero_cache_writes_straight_through() {
        let dir = tempfile::tempdir().unwrap();
        let (out, control, path) = fixture(dir.path(), 6, 0);
        let idx = control.add_block(0, 0, 5);
        let mut bw = out.block_writer(idx, 0, 0, Some(6));
        assert!(bw.push(b"ab"));
        assert_eq!(control.blocks()[idx].completed, 2);
        assert!(bw.push(b"cdef"));
        bw.finish().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"abcdef");
    }
}
