//! Engine configuration.
//!
//! `EngineConfig` is the immutable per-job snapshot; `FileConfig` is the
//! small on-disk TOML subset loaded from `~/.config/rdm/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one download engine. Cloned into every started job so
/// mid-flight mutation never affects running downloads.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrent workers per job; 1 disables multi-threading.
    pub thread_count: usize,
    /// Bytes per block in a multi-threaded download.
    pub thread_size: i64,
    /// Write-buffer bytes per worker.
    pub disk_cache: usize,
    /// Download cap in bytes/second; 0 means unlimited.
    pub speed_limit: i64,
    /// Progress observer tick.
    pub progress_interval: Duration,
    /// Control-file flush cadence.
    pub autosave_interval: Duration,
    /// Time allowed until response headers arrive.
    pub connect_timeout: Duration,
    /// Whole-job deadline; zero means none.
    pub total_timeout: Duration,
    /// Total request attempts (>= 1).
    pub retry_count: u32,
    /// Sleep between attempts.
    pub retry_backoff: Duration,
    /// Explicit proxy URL; `None` defers to the environment.
    pub proxy: Option<String>,
    /// Control-file suffix appended to the output path.
    pub temp_file_suffix: String,
    /// Create missing output directories.
    pub create_dir: bool,
    /// Replace an existing output file instead of failing.
    pub allow_overwrite: bool,
    /// Adopt a matching control file and continue where it stopped.
    pub resume_enabled: bool,
    /// When the output exists and cannot be overwritten or resumed, pick a
    /// `name (N).ext` variant instead of failing.
    pub auto_rename: bool,
    /// Accept any TLS certificate. Off by default; the historical engine
    /// behavior was the equivalent of always-on.
    pub insecure_skip_verify: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            thread_count: 1,
            thread_size: 1 << 20,
            disk_cache: 1 << 20,
            speed_limit: 0,
            progress_interval: Duration::from_millis(500),
            autosave_interval: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(60),
            total_timeout: Duration::ZERO,
            retry_count: 5,
            retry_backoff: Duration::ZERO,
            proxy: None,
            temp_file_suffix: "down".to_string(),
            create_dir: true,
            allow_overwrite: false,
            resume_enabled: true,
            auto_rename: false,
            insecure_skip_verify: false,
        }
    }
}

impl EngineConfig {
    /// Clamp nonsensical values instead of failing; callers set fields freely.
    pub fn normalized(mut self) -> Self {
        self.thread_count = self.thread_count.max(1);
        self.thread_size = self.thread_size.max(1);
        self.retry_count = self.retry_count.max(1);
        if self.temp_file_suffix.is_empty() {
            self.temp_file_suffix = "down".to_string();
        }
        self
    }
}

/// Subset of tunables persisted as TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub thread_count: usize,
    pub thread_size: i64,
    pub speed_limit: i64,
    pub retry_count: u32,
    pub connect_timeout_secs: u64,
    pub resume: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        let e = EngineConfig::default();
        FileConfig {
            thread_count: e.thread_count,
            thread_size: e.thread_size,
            speed_limit: e.speed_limit,
            retry_count: e.retry_count,
            connect_timeout_secs: e.connect_timeout.as_secs(),
            resume: e.resume_enabled,
        }
    }
}

impl FileConfig {
    pub fn apply(&self, cfg: &mut EngineConfig) {
        cfg.thread_count = self.thread_count;
        cfg.thread_size = self.thread_size;
        cfg.speed_limit = self.speed_limit;
        cfg.retry_count = self.retry_count;
        cfg.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        cfg.resume_enabled = self.resume;
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, writing a default file on first run.
pub fn load_or_init() -> Result<FileConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FileConfig::default();
        let text = toml::to_string_pretty(&default_cfg)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, text)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FileConfig = toml::from_str(&data)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(cfg)
}
