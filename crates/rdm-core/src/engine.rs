//! Engine: configuration plus observer registrations, and the process-wide
//! default instance behind the convenience entry points.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crate::batch::Batch;
use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::DownError;
use crate::observer::Observer;
use crate::request::DownloadRequest;

/// A configured download engine. `run`/`start` snapshot the configuration,
/// so reconfiguring an engine never affects jobs already in flight.
#[derive(Default)]
pub struct Engine {
    config: EngineConfig,
    observers: Vec<Arc<dyn Observer>>,
}

impl Engine {
    pub fn new() -> Engine {
        Engine::default()
    }

    pub fn with_config(config: EngineConfig) -> Engine {
        Engine { config, observers: Vec::new() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn add_observer(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Blocking download of one request; returns the output path.
    pub fn run(&self, request: DownloadRequest) -> Result<PathBuf, DownError> {
        self.run_with_token(request, CancelToken::new())
    }

    pub fn run_with_token(
        &self,
        request: DownloadRequest,
        token: CancelToken,
    ) -> Result<PathBuf, DownError> {
        let outputs = self.start_batch_with_token(&[request], token)?.wait()?;
        Ok(outputs.into_iter().next().expect("one job yields one path"))
    }

    /// Blocking batch download; all requests run as one unit.
    pub fn run_batch(&self, requests: &[DownloadRequest]) -> Result<Vec<PathBuf>, DownError> {
        self.start_batch_with_token(requests, CancelToken::new())?.wait()
    }

    /// Non-blocking start of one request.
    pub fn start(&self, request: DownloadRequest) -> Result<Batch, DownError> {
        self.start_batch_with_token(&[request], CancelToken::new())
    }

    /// Non-blocking start of a batch under a caller-supplied token.
    pub fn start_batch_with_token(
        &self,
        requests: &[DownloadRequest],
        token: CancelToken,
    ) -> Result<Batch, DownError> {
        Batch::start(&self.config, &self.observers, requests, token)
    }
}

static DEFAULT: OnceLock<Mutex<Engine>> = OnceLock::new();

/// The lazily-constructed process-wide engine used by the free functions.
pub fn default_engine() -> &'static Mutex<Engine> {
    DEFAULT.get_or_init(|| Mutex::new(Engine::new()))
}

/// Runs `f` against the default engine (configuration, observers).
pub fn with_default<R>(f: impl FnOnce(&mut Engine) -> R) -> R {
    let mut engine = default_engine().lock().unwrap();
    f(&mut engine)
}

/// Downloads `url` into `output_dir` via the default engine; a `None` name
/// derives the filename from the response.
pub fn run(
    url: &str,
    output_dir: impl AsRef<Path>,
    output_name: Option<&str>,
) -> Result<PathBuf, DownError> {
    let mut request = DownloadRequest::new(url).output_dir(output_dir.as_ref());
    if let Some(name) = output_name {
        request = request.output_name(name);
    }
    // Snapshot under the lock, run outside it.
    let (config, observers) = {
        let engine = default_engine().lock().unwrap();
        (engine.config.clone(), engine.observers.clone())
    };
    let engine = Engine { config, observers };
    engine.run(request)
}

pub fn set_thread_count(n: usize) {
    with_default(|e| e.config_mut().thread_count = n);
}

pub fn set_thread_size(n: i64) {
    with_default(|e| e.config_mut().thread_size = n);
}

pub fn set_speed_limit(bytes_per_sec: i64) {
    with_default(|e| e.config_mut().speed_limit = bytes_per_sec);
}

pub fn set_allow_overwrite(allow: bool) {
    with_default(|e| e.config_mut().allow_overwrite = allow);
}

pub fn set_resume_enabled(resume: bool) {
    with_default(|e| e.config_mut().resume_enabled = resume);
}

pub fn set_retry_count(n: u32) {
    with_default(|e| e.config_mut().retry_count = n);
}

pub fn set_total_timeout(timeout: Duration) {
    with_default(|e| e.config_mut().total_timeout = timeout);
}

pub fn add_observer(observer: Arc<dyn Observer>) {
    with_default(|e| e.add_observer(observer));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_snapshot_isolated_from_later_mutation() {
        let mut engine = Engine::new();
        engine.config_mut().thread_count = 4;
        let snapshot = engine.config().clone();
        engine.config_mut().thread_count = 9;
        assert_eq!(snapshot.thread_count, 4);
        assert_eq!(engine.config().thread_count, 9);
    }

    #[test]
    fn default_engine_setters() {
        set_thread_count(7);
        set_speed_limit(1234);
        with_default(|e| {
            assert_eq!(e.config().thread_count, 7);
            assert_eq!(e.config().speed_limit, 1234);
        });
    }
}
