//! Batch: one or more downloads run as a unit.
//!
//! Jobs share a cancellation token, the observer chain, and one progress
//! reporter; counters are aggregated across jobs. `wait` joins jobs in
//! submission order and retains the first error while the rest finish.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::download::DownloadJob;
use crate::error::DownError;
use crate::observer::{
    make_observers, notify_finish, BatchMeta, JobObserver, Observer, Snapshot,
};
use crate::progress;
use crate::request::DownloadRequest;

pub struct Batch {
    jobs: Vec<Arc<DownloadJob>>,
    token: CancelToken,
    meta: Arc<BatchMeta>,
    job_handles: Vec<JoinHandle<Result<(), DownError>>>,
    reporter: Option<JoinHandle<Vec<Box<dyn JobObserver>>>>,
    reporter_token: CancelToken,
}

impl Batch {
    /// Initializes every job (probe + file setup), runs observer `init`, and
    /// spawns the job and reporter threads. Fails as a whole when any job or
    /// observer fails to initialize.
    pub(crate) fn start(
        config: &EngineConfig,
        observers: &[Arc<dyn Observer>],
        requests: &[DownloadRequest],
        token: CancelToken,
    ) -> Result<Batch, DownError> {
        let config = Arc::new(config.clone().normalized());

        let mut jobs: Vec<Arc<DownloadJob>> = Vec::with_capacity(requests.len());
        for request in requests {
            match DownloadJob::new(request, Arc::clone(&config), &token) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    for job in &jobs {
                        job.discard();
                    }
                    return Err(e);
                }
            }
        }

        let meta = Arc::new(BatchMeta {
            requests: requests.to_vec(),
            outputs: jobs.iter().map(|j| j.output_path().to_path_buf()).collect(),
            config: (*config).clone(),
        });
        let total_size: i64 = jobs.iter().map(|j| j.total_size()).sum();

        let init_snapshot = Snapshot {
            total_size,
            completed: jobs.iter().map(|j| j.completed()).sum(),
            speed: 0,
            connections: 0,
            meta: Arc::clone(&meta),
        };
        let mut job_observers = match make_observers(observers, &init_snapshot) {
            Ok(obs) => obs,
            Err(e) => {
                for job in &jobs {
                    job.discard();
                }
                return Err(e);
            }
        };

        let job_handles = jobs
            .iter()
            .map(|job| {
                let job = Arc::clone(job);
                std::thread::spawn(move || job.run())
            })
            .collect();

        let reporter_token = token.child();
        let reporter = {
            let jobs = jobs.clone();
            let meta = Arc::clone(&meta);
            let rt = reporter_token.clone();
            let interval = config.progress_interval;
            std::thread::spawn(move || {
                let sample = || {
                    let completed: i64 = jobs.iter().map(|j| j.completed()).sum();
                    let connections: usize = jobs.iter().map(|j| j.connections()).sum();
                    (completed, connections)
                };
                progress::run_reporter(
                    &mut job_observers,
                    &sample,
                    total_size,
                    &meta,
                    interval,
                    &rt,
                );
                job_observers
            })
        };

        Ok(Batch {
            jobs,
            token,
            meta,
            job_handles,
            reporter: Some(reporter),
            reporter_token,
        })
    }

    /// Joins every job in submission order, stops the reporter, dispatches
    /// the terminal observer event, and returns the output paths (or the
    /// first error).
    pub fn wait(mut self) -> Result<Vec<PathBuf>, DownError> {
        let mut first: Option<DownError> = None;
        for handle in self.job_handles.drain(..) {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first.is_none() {
                        first = Some(e);
                    }
                }
                Err(_) => {
                    if first.is_none() {
                        first = Some(DownError::Cancelled);
                    }
                }
            }
        }

        self.reporter_token.cancel();
        let mut observers = match self.reporter.take() {
            Some(h) => h.join().unwrap_or_default(),
            None => Vec::new(),
        };

        let final_snapshot = Snapshot {
            total_size: self.total_size(),
            completed: self.completed(),
            speed: 0,
            connections: 0,
            meta: Arc::clone(&self.meta),
        };
        notify_finish(&mut observers, first.as_ref(), &final_snapshot);

        match first {
            None => Ok(self.meta.outputs.clone()),
            Some(e) => Err(e),
        }
    }

    /// Cancels every job in the batch.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn total_size(&self) -> i64 {
        self.jobs.iter().map(|j| j.total_size()).sum()
    }

    pub fn completed(&self) -> i64 {
        self.jobs.iter().map(|j| j.completed()).sum()
    }

    pub fn connections(&self) -> usize {
        self.jobs.iter().map(|j| j.connections()).sum()
    }

    pub fn outputs(&self) -> &[PathBuf] {
        &self.meta.outputs
    }
}
