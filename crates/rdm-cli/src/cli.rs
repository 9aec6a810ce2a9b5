//! `rdm` command line: argument parsing and the plain progress line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rdm_core::config;
use rdm_core::error::DownError;
use rdm_core::observer::{JobObserver, Observer, ObserverError, Snapshot};
use rdm_core::util::format_size;
use rdm_core::{DownloadRequest, Engine, EngineConfig};

/// Top-level CLI for the rdm downloader.
#[derive(Debug, Parser)]
#[command(name = "rdm")]
#[command(about = "rdm: resumable multi-threaded downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download one or more URLs.
    Get {
        /// Direct HTTP/HTTPS URLs to download.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Output directory (default: current directory).
        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,

        /// Output filename; only valid with a single URL.
        #[arg(short = 'o', long)]
        output: Option<String>,

        /// Worker threads per download.
        #[arg(short = 'n', long)]
        threads: Option<usize>,

        /// Bytes per block for multi-threaded downloads.
        #[arg(long)]
        block_size: Option<i64>,

        /// Download speed cap in bytes per second (0 = unlimited).
        #[arg(long)]
        limit: Option<i64>,

        /// Replace existing files instead of failing.
        #[arg(long)]
        overwrite: bool,

        /// Ignore control files and always download from scratch.
        #[arg(long)]
        no_resume: bool,

        /// Pick "name (N).ext" when the target exists.
        #[arg(long)]
        auto_rename: bool,

        /// Whole-download timeout in seconds (0 = none).
        #[arg(long)]
        timeout: Option<u64>,

        /// Accept any TLS certificate.
        #[arg(long)]
        insecure: bool,
    },
}

pub fn run_from_args() -> Result<()> {
    let cli = Cli::parse();

    let mut engine_config = EngineConfig::default();
    match config::load_or_init() {
        Ok(file_cfg) => file_cfg.apply(&mut engine_config),
        Err(e) => tracing::warn!(error = %e, "config file unavailable, using defaults"),
    }

    match cli.command {
        Command::Get {
            urls,
            output_dir,
            output,
            threads,
            block_size,
            limit,
            overwrite,
            no_resume,
            auto_rename,
            timeout,
            insecure,
        } => {
            if output.is_some() && urls.len() > 1 {
                anyhow::bail!("--output is only valid with a single URL");
            }
            if let Some(n) = threads {
                engine_config.thread_count = n;
            }
            if let Some(n) = block_size {
                engine_config.thread_size = n;
            }
            if let Some(n) = limit {
                engine_config.speed_limit = n;
            }
            if let Some(secs) = timeout {
                engine_config.total_timeout = Duration::from_secs(secs);
            }
            engine_config.allow_overwrite = overwrite;
            engine_config.resume_enabled = !no_resume;
            engine_config.auto_rename = auto_rename;
            engine_config.insecure_skip_verify = insecure;

            let mut engine = Engine::with_config(engine_config);
            engine.add_observer(Arc::new(ConsoleProgress));

            let dir = output_dir.unwrap_or_else(|| PathBuf::from("."));
            let requests: Vec<DownloadRequest> = urls
                .iter()
                .map(|url| {
                    let mut r = DownloadRequest::new(url).output_dir(&dir);
                    if let Some(name) = &output {
                        r = r.output_name(name);
                    }
                    r
                })
                .collect();

            let outputs = engine
                .run_batch(&requests)
                .context("download failed")?;
            for path in outputs {
                println!("saved {}", path.display());
            }
        }
    }

    Ok(())
}

/// Plain single-line progress printer; rewrites the line on every tick.
struct ConsoleProgress;

impl Observer for ConsoleProgress {
    fn init(&self, _snapshot: &Snapshot) -> std::result::Result<Box<dyn JobObserver>, ObserverError> {
        Ok(Box::new(ConsoleLine))
    }
}

struct ConsoleLine;

impl JobObserver for ConsoleLine {
    fn on_progress(&mut self, s: &Snapshot) -> std::result::Result<(), ObserverError> {
        let pct = if s.total_size > 0 {
            (s.completed as f64 / s.total_size as f64) * 100.0
        } else {
            0.0
        };
        eprint!(
            "\r  {} / {} ({:.1}%)  {}/s  {} conn   ",
            format_size(s.completed),
            format_size(s.total_size),
            pct,
            format_size(s.speed),
            s.connections
        );
        Ok(())
    }

    fn on_finish(
        &mut self,
        error: Option<&DownError>,
        s: &Snapshot,
    ) -> std::result::Result<(), ObserverError> {
        match error {
            None => eprintln!("\r  {} downloaded               ", format_size(s.completed)),
            Some(e) => eprintln!("\r  failed after {}: {}        ", format_size(s.completed), e),
        }
        Ok(())
    }
}
