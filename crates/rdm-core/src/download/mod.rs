//! Download orchestration for a single request.
//!
//! `DownloadJob::new` probes the resource, resolves paths, and decides
//! between fresh and resume; `run` dispatches the chosen strategy, collects
//! worker results through the pool's fan-in channel, and finalizes (control
//! file removed) or aborts (control file saved for the next run).

mod multi;
mod single;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::control::ControlFileManager;
use crate::error::DownError;
use crate::http::HttpClient;
use crate::limiter::RateGate;
use crate::naming;
use crate::pool::WorkerPool;
use crate::probe;
use crate::request::DownloadRequest;
use crate::storage::{control_path, OutputFile, OutputFileBuilder};

pub struct DownloadJob {
    config: Arc<EngineConfig>,
    client: HttpClient,
    token: CancelToken,
    pool: Arc<WorkerPool>,
    control: Arc<ControlFileManager>,
    output: OutputFile,
    completed: Arc<AtomicI64>,
    total: i64,
    multithread: bool,
    resuming: bool,
    output_path: PathBuf,
}

impl DownloadJob {
    /// Probes the resource and prepares all files. Blocking: performs the
    /// probe request and the fresh/resume decision before returning.
    pub(crate) fn new(
        request: &DownloadRequest,
        config: Arc<EngineConfig>,
        parent: &CancelToken,
    ) -> Result<Arc<DownloadJob>, DownError> {
        let token = parent.child_with_timeout(config.total_timeout);
        let client = HttpClient::new(request, &config, token.clone());

        let info = probe::probe(&client)?;
        tracing::debug!(
            url = %request.url,
            total = info.total,
            multithread = info.multithread,
            filename = %info.filename,
            "probe complete"
        );

        if config.create_dir && !request.output_dir.exists() {
            std::fs::create_dir_all(&request.output_dir)?;
        }

        let name = request.output_name.clone().unwrap_or(info.filename);
        let mut output_path = absolute(&request.output_dir.join(name))?;
        let mut ctl_path = control_path(&output_path, &config.temp_file_suffix);

        // Resume only when the server can serve ranges and a usable control
        // file (parses, totals match) sits next to the existing output.
        let mut control = None;
        if output_path.exists()
            && info.multithread
            && config.resume_enabled
            && ctl_path.exists()
        {
            control = ControlFileManager::load(&ctl_path, request.perm, info.total)?;
        }
        let resuming = control.is_some();

        if !resuming && output_path.exists() {
            if config.allow_overwrite {
                std::fs::remove_file(&output_path)?;
                if ctl_path.exists() {
                    let _ = std::fs::remove_file(&ctl_path);
                }
            } else if config.auto_rename {
                output_path = naming::unique_path(&output_path);
                ctl_path = control_path(&output_path, &config.temp_file_suffix);
            } else {
                return Err(DownError::AlreadyExists(output_path));
            }
        }

        let writer = if resuming {
            OutputFileBuilder::open_existing(&output_path, request.perm)?.build()
        } else {
            let mut builder = OutputFileBuilder::create(&output_path, request.perm)?;
            if info.total > 0 {
                builder.preallocate(info.total as u64)?;
            }
            builder.build()
        };

        let control = Arc::new(match control {
            Some(mgr) => mgr,
            None => ControlFileManager::create(&ctl_path, request.perm, info.total)?,
        });
        control.bind_output(writer.file());

        let completed = Arc::new(AtomicI64::new(if resuming {
            control.completed_bytes()
        } else {
            0
        }));

        let gate = if config.speed_limit > 0 {
            Some(RateGate::new(config.speed_limit))
        } else {
            None
        };
        let output = OutputFile::new(
            writer,
            Arc::clone(&control),
            Arc::clone(&completed),
            gate,
            config.disk_cache,
            token.clone(),
        );

        let pool = Arc::new(WorkerPool::new(config.thread_count));

        Ok(Arc::new(DownloadJob {
            config,
            client,
            token,
            pool,
            control,
            output,
            completed,
            total: info.total,
            multithread: info.multithread,
            resuming,
            output_path,
        }))
    }

    /// Runs the job to completion on the calling thread.
    pub(crate) fn run(self: Arc<Self>) -> Result<(), DownError> {
        let autosave = {
            let job = Arc::clone(&self);
            thread::spawn(move || {
                job.control.autosave_loop(job.config.autosave_interval, &job.token)
            })
        };
        let dispatcher = {
            let job = Arc::clone(&self);
            thread::spawn(move || job.dispatch())
        };

        // Fan-in: keep the first error, let the remaining workers drain
        // (they observe the cancelled job token).
        let mut first: Option<DownError> = None;
        loop {
            match self.pool.next_event() {
                Some(err) => {
                    if first.is_none() {
                        tracing::debug!(url = self.client.url(), error = %err, "worker failed");
                        self.token.cancel();
                        first = Some(err);
                    }
                }
                None => break,
            }
        }
        let _ = dispatcher.join();

        if first.is_none() {
            first = self.token.reason();
        }

        // Stops the autosave loop; on success the control file is about to
        // be removed anyway.
        self.token.cancel();
        let _ = autosave.join();

        match first {
            None => {
                self.output.writer().sync()?;
                if let Err(e) = self.control.remove() {
                    tracing::warn!(error = %e, "control file removal failed");
                }
                tracing::info!(path = %self.output_path.display(), "download complete");
                Ok(())
            }
            Some(err) => {
                self.retain_or_discard_control();
                Err(err)
            }
        }
    }

    /// Keep the control file only when it records progress a next run could
    /// use; otherwise delete it.
    fn retain_or_discard_control(&self) {
        if self.control.completed_bytes() > 0 {
            if let Err(e) = self.control.save() {
                tracing::warn!(error = %e, "final control file save failed");
            }
        } else if let Err(e) = self.control.remove() {
            tracing::debug!(error = %e, "empty control file removal failed");
        }
    }

    /// Cleanup for jobs that never ran (batch sibling failed to start).
    pub(crate) fn discard(&self) {
        self.retain_or_discard_control();
    }

    fn dispatch(self: Arc<Self>) {
        let use_multi = self.multithread && self.config.thread_count > 1;
        match (use_multi, self.resuming) {
            (false, false) => single::dispatch_fresh(&self),
            // Resume replays blocks through the capacity-1 pool, which
            // serializes them.
            (false, true) => multi::dispatch_resume(&self),
            (true, false) => multi::dispatch_fresh(&self),
            (true, true) => multi::dispatch_resume(&self),
        }
        self.pool.wait_all_async();
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn total_size(&self) -> i64 {
        self.total
    }

    pub fn completed(&self) -> i64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn connections(&self) -> usize {
        self.pool.count()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// Absolute form of `path` without requiring it to exist.
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
