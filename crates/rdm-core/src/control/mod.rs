//! On-disk control file: binary record of per-block download progress.
//!
//! Layout: 4-byte magic `down`, version u16 BE, total length i64 BE, then one
//! 24-byte record per block (completed | start | end, each i64 BE, `end`
//! inclusive). A 14-byte header with zero blocks is valid.

mod manager;

pub use manager::ControlFileManager;

/// Magic prefix: `down` (0x64 0x6F 0x77 0x6E).
pub const MAGIC: &[u8; 4] = b"down";
/// Size of the fixed header (magic + version + total).
pub const HEADER_LEN: usize = 14;
/// Size of one block record.
pub const BLOCK_LEN: usize = 24;
/// Current format version.
pub const VERSION: u16 = 0;

/// Progress record for one download block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadBlock {
    /// Bytes of this block already written to the output file.
    pub completed: i64,
    pub start: i64,
    /// Inclusive end offset.
    pub end: i64,
}

impl ThreadBlock {
    /// Total size of the block's range.
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.len()
    }
}

/// In-memory image of the control file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFile {
    pub version: u16,
    /// Total length of the remote resource.
    pub total: i64,
    pub blocks: Vec<ThreadBlock>,
}

impl ControlFile {
    pub fn new(total: i64) -> Self {
        ControlFile {
            version: VERSION,
            total,
            blocks: Vec::new(),
        }
    }

    /// Sum of per-block completed counters.
    pub fn completed_bytes(&self) -> i64 {
        self.blocks.iter().map(|b| b.completed).sum()
    }

    /// Serializes to the on-disk layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.blocks.len() * BLOCK_LEN);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&self.version.to_be_bytes());
        buf.extend_from_slice(&self.total.to_be_bytes());
        for b in &self.blocks {
            buf.extend_from_slice(&b.completed.to_be_bytes());
            buf.extend_from_slice(&b.start.to_be_bytes());
            buf.extend_from_slice(&b.end.to_be_bytes());
        }
        buf
    }

    /// Parses the on-disk layout. Returns `None` when the data is shorter
    /// than the header, the magic does not match, or the remainder is not a
    /// whole number of block records.
    pub fn parse(data: &[u8]) -> Option<ControlFile> {
        if data.len() < HEADER_LEN
            || &data[..4] != MAGIC
            || (data.len() - HEADER_LEN) % BLOCK_LEN != 0
        {
            return None;
        }

        let version = u16::from_be_bytes([data[4], data[5]]);
        let total = read_i64(&data[6..14]);

        let count = (data.len() - HEADER_LEN) / BLOCK_LEN;
        let mut blocks = Vec::with_capacity(count);
        for i in 0..count {
            let at = HEADER_LEN + i * BLOCK_LEN;
            blocks.push(ThreadBlock {
                completed: read_i64(&data[at..at + 8]),
                start: read_i64(&data[at + 8..at + 16]),
                end: read_i64(&data[at + 16..at + 24]),
            });
        }

        Some(ControlFile { version, total, blocks })
    }
}

fn read_i64(b: &[u8]) -> i64 {
    i64::from_be_bytes(b.try_into().expect("8-byte slice"))
}
