//! Download request description: what to fetch and where to put it.

use std::collections::HashMap;
use std::path::PathBuf;

/// Immutable description of one download. Cloned on submission so later
/// mutation by the caller cannot affect a running job.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Resource URL (http or https).
    pub url: String,
    /// HTTP method, `GET` by default.
    pub method: String,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Request headers. Prefilled with browser-like defaults; caller entries
    /// replace them wholesale.
    pub headers: HashMap<String, String>,
    /// Output directory, current directory by default.
    pub output_dir: PathBuf,
    /// Output filename; `None` means derive it from the response.
    pub output_name: Option<String>,
    /// Permission bits for created files.
    pub perm: u32,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> DownloadRequest {
        DownloadRequest {
            url: url.into(),
            method: "GET".to_string(),
            body: None,
            headers: default_headers(),
            output_dir: PathBuf::from("."),
            output_name: None,
            perm: 0o600,
        }
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Headers sent when the caller did not override them.
pub fn default_headers() -> HashMap<String, String> {
    let mut h = HashMap::new();
    h.insert(
        "accept".to_string(),
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8"
            .to_string(),
    );
    h.insert(
        "accept-language".to_string(),
        "en-US,en;q=0.9".to_string(),
    );
    h.insert(
        "user-agent".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/104.0.5112.81 Safari/537.36"
            .to_string(),
    );
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let r = DownloadRequest::new("http://example.com/f.bin");
        assert_eq!(r.method, "GET");
        assert!(r.body.is_none());
        assert!(r.headers.contains_key("user-agent"));
        assert!(r.headers.contains_key("accept"));
        assert!(r.headers.contains_key("accept-language"));
        assert_eq!(r.perm, 0o600);
        assert!(r.output_name.is_none());
    }

    #[test]
    fn caller_header_overrides_default() {
        let r = DownloadRequest::new("http://example.com/").header("user-agent", "rdm-test");
        assert_eq!(r.headers.get("user-agent").map(String::as_str), Some("rdm-test"));
    }
}
