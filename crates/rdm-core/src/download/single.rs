//! Single-connection fresh download: one plain GET streaming the whole file.

use std::sync::Arc;
use std::thread;

use super::DownloadJob;

pub(super) fn dispatch_fresh(job: &Arc<DownloadJob>) {
    job.pool.acquire();
    if job.token.is_cancelled() {
        job.pool.release();
        return;
    }
    let index = job.control.add_block(0, 0, job.total - 1);
    let job = Arc::clone(job);
    thread::spawn(move || {
        if let Err(err) = stream_whole(&job, index) {
            if !err.is_cancel() {
                job.pool.report_error(err);
            }
        }
        job.pool.release();
    });
}

fn stream_whole(job: &DownloadJob, index: usize) -> Result<(), crate::error::DownError> {
    // Unknown totals (no usable Content-Length) stream without a size check.
    let expected = if job.total > 0 { Some(job.total) } else { None };
    let mut bw = job.output.block_writer(index, 0, 0, expected);
    match job.client.do_default(&mut |data| bw.push(data)) {
        Ok(_) => bw.finish(),
        Err(e) => Err(bw.take_error().unwrap_or(e)),
    }
}
