//! Block range math: splits a byte span into fixed-size download blocks.

/// A single download block: inclusive byte range `[start, end]` of the
/// remote resource, handled by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: i64,
    /// Inclusive end offset.
    pub end: i64,
}

impl BlockRange {
    /// Length of this block in bytes.
    pub fn len(&self) -> i64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// Splits `[start, total)` into contiguous inclusive ranges of at most
/// `block_size` bytes each, ordered by `start`.
///
/// Returns an empty vec when `total <= start` or `block_size == 0`.
pub fn plan_blocks(start: i64, total: i64, block_size: i64) -> Vec<BlockRange> {
    if total <= start || block_size <= 0 {
        return Vec::new();
    }

    let span = total - start;
    let count = (span + block_size - 1) / block_size;

    let mut out = Vec::with_capacity(count as usize);
    for i in 0..count {
        let lo = start + i * block_size;
        let hi = (start + (i + 1) * block_size - 1).min(total - 1);
        out.push(BlockRange { start: lo, end: hi });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(v: &[BlockRange]) -> Vec<(i64, i64)> {
        v.iter().map(|b| (b.start, b.end)).collect()
    }

    #[test]
    fn empty_inputs() {
        assert!(plan_blocks(0, 0, 1024).is_empty());
        assert!(plan_blocks(0, 2048, 0).is_empty());
        assert!(plan_blocks(100, 100, 16).is_empty());
        assert!(plan_blocks(200, 100, 16).is_empty());
    }

    #[test]
    fn exact_multiple() {
        assert_eq!(pairs(&plan_blocks(0, 2048, 1024)), vec![(0, 1023), (1024, 2047)]);
    }

    #[test]
    fn trailing_remainder() {
        assert_eq!(
            pairs(&plan_blocks(0, 2049, 1024)),
            vec![(0, 1023), (1024, 2047), (2048, 2048)]
        );
    }

    #[test]
    fn nonzero_start() {
        assert_eq!(
            pairs(&plan_blocks(1000, 2048, 1024)),
            vec![(1000, 2023), (2024, 2047)]
        );
    }

    #[test]
    fn covers_span_contiguously() {
        for &(start, total, size) in &[(0i64, 1i64, 1i64), (0, 100, 7), (13, 999, 64), (5, 6, 100)] {
            let blocks = plan_blocks(start, total, size);
            assert_eq!(blocks[0].start, start);
            assert_eq!(blocks.last().unwrap().end, total - 1);
            for w in blocks.windows(2) {
                assert_eq!(w[0].end + 1, w[1].start);
            }
            for b in &blocks {
                assert!(b.len() <= size);
                assert!(b.len() >= 1);
            }
            let covered: i64 = blocks.iter().map(|b| b.len()).sum();
            assert_eq!(covered, total - start);
        }
    }
}
