//! Engine error type, classifiable for retry and termination decisions.

use std::path::PathBuf;
use thiserror::Error;

/// Error surfaced by a download job (transport, HTTP, storage, or lifecycle).
/// Transport and HTTP-status errors are retried by the client wrapper before
/// they reach callers; everything else surfaces immediately.
#[derive(Debug, Error)]
pub enum DownError {
    /// Network-level failure reported by libcurl (DNS, connect, TLS, reset).
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),

    /// HTTP response with status >= 400 after all retry attempts.
    #[error("{url} returned HTTP {code}")]
    Status { url: String, code: u32 },

    /// Filesystem failure (open/truncate/write/remove/mkdir). Not retried.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),

    /// Output file exists, overwrite is disabled, and no usable resume data.
    #[error("file already exists: {0} (set allow_overwrite to replace it)")]
    AlreadyExists(PathBuf),

    /// Transfer ended with fewer bytes than the requested range length.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: i64, received: i64 },

    /// The job's cancellation token fired.
    #[error("download cancelled")]
    Cancelled,

    /// The job's total timeout elapsed.
    #[error("download timed out")]
    Timeout,

    /// An observer failed during `init` (progress/finish failures are only logged).
    #[error("observer: {0}")]
    Observer(String),
}

impl DownError {
    /// True for cancellation and timeout, which workers swallow; the
    /// orchestrator surfaces the token's own reason instead.
    pub fn is_cancel(&self) -> bool {
        matches!(self, DownError::Cancelled | DownError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_names_url_and_code() {
        let e = DownError::Status {
            url: "http://example.com/f.bin".into(),
            code: 503,
        };
        let msg = e.to_string();
        assert!(msg.contains("http://example.com/f.bin"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn cancel_kinds() {
        assert!(DownError::Cancelled.is_cancel());
        assert!(DownError::Timeout.is_cancel());
        assert!(!DownError::Status { url: String::new(), code: 500 }.is_cancel());
    }
}
