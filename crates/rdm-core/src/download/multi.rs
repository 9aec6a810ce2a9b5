//! Block dispatch: ranged workers for fresh and resumed downloads.

use std::sync::Arc;
use std::thread;

use crate::blocks::plan_blocks;
use crate::error::DownError;

use super::DownloadJob;

/// Fresh multi-threaded download: split `[0, total)` and dispatch one worker
/// per block, bounded by the pool.
pub(super) fn dispatch_fresh(job: &Arc<DownloadJob>) {
    for range in plan_blocks(0, job.total, job.config.thread_size) {
        job.pool.acquire();
        if job.token.is_cancelled() {
            job.pool.release();
            return;
        }
        let index = job.control.add_block(0, range.start, range.end);
        spawn_block(job, index, range.start, range.end, 0);
    }
}

/// Resume: replay unfinished blocks, then extend with any uncovered tail
/// (the recorded plan may stop short of the probed total).
pub(super) fn dispatch_resume(job: &Arc<DownloadJob>) {
    let blocks = job.control.blocks();
    for (index, block) in blocks.iter().enumerate() {
        if block.is_done() {
            continue;
        }
        job.pool.acquire();
        if job.token.is_cancelled() {
            job.pool.release();
            return;
        }
        spawn_block(job, index, block.start, block.end, block.completed);
    }

    let tail_start = blocks.last().map(|b| b.end + 1).unwrap_or(0);
    for range in plan_blocks(tail_start, job.total, job.config.thread_size) {
        job.pool.acquire();
        if job.token.is_cancelled() {
            job.pool.release();
            return;
        }
        let index = job.control.add_block(0, range.start, range.end);
        spawn_block(job, index, range.start, range.end, 0);
    }
}

fn spawn_block(job: &Arc<DownloadJob>, index: usize, start: i64, end: i64, completed: i64) {
    let job = Arc::clone(job);
    thread::spawn(move || {
        if let Err(err) = fetch_block(&job, index, start, end, completed) {
            if !err.is_cancel() {
                job.pool.report_error(err);
            }
        }
        job.pool.release();
    });
}

/// Fetches the unfinished suffix `[start+completed, end]` of one block and
/// writes it at its exact offset.
fn fetch_block(
    job: &DownloadJob,
    index: usize,
    start: i64,
    end: i64,
    completed: i64,
) -> Result<(), DownError> {
    let from = start + completed;
    let expected = end - from + 1;
    if expected <= 0 {
        return Ok(());
    }
    let mut bw = job.output.block_writer(index, from, completed, Some(expected));
    match job.client.do_range(from, end, &mut |data| bw.push(data)) {
        Ok(_) => bw.finish(),
        Err(e) => Err(bw.take_error().unwrap_or(e)),
    }
}
