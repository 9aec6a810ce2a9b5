pub mod config;
pub mod logging;

pub mod batch;
pub mod blocks;
pub mod cancel;
pub mod control;
pub mod download;
pub mod engine;
pub mod error;
pub mod http;
pub mod limiter;
pub mod naming;
pub mod observer;
pub mod pool;
pub mod probe;
pub mod progress;
pub mod request;
pub mod storage;
pub mod util;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::DownError;
pub use request::DownloadRequest;
