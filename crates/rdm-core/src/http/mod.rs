//! HTTP client wrapper over libcurl.
//!
//! Builds requests carrying the job's headers, proxy, and TLS settings,
//! streams bodies into a caller-supplied sink, and retries the headers phase
//! on network errors and HTTP statuses >= 400. Once a body byte has been
//! delivered the transfer is committed: later failures surface instead of
//! retrying, so block counters stay monotonic.

mod headers;

pub use headers::{content_range_start, content_range_total, header_value, parse_status_line};

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::error::DownError;
use crate::request::DownloadRequest;

/// Status line and headers of the final response; the body has already been
/// streamed into the sink by the time a caller sees this.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u32,
    /// Raw header lines of the final (post-redirect) response.
    pub headers: Vec<String>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        header_value(&self.headers, name)
    }
}

/// Per-job HTTP client. Cheap to share by reference across workers; every
/// request builds its own curl handle.
pub struct HttpClient {
    url: String,
    method: String,
    body: Option<Vec<u8>>,
    headers: HashMap<String, String>,
    proxy: Option<String>,
    connect_timeout: Duration,
    insecure_skip_verify: bool,
    retry_count: u32,
    retry_backoff: Duration,
    token: CancelToken,
}

impl HttpClient {
    pub fn new(request: &DownloadRequest, config: &EngineConfig, token: CancelToken) -> HttpClient {
        HttpClient {
            url: request.url.clone(),
            method: request.method.clone(),
            body: request.body.clone(),
            headers: request.headers.clone(),
            proxy: config.proxy.clone(),
            connect_timeout: config.connect_timeout,
            insecure_skip_verify: config.insecure_skip_verify,
            retry_count: config.retry_count.max(1),
            retry_backoff: config.retry_backoff,
            token,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Plain request with the job's method and headers; the body streams
    /// through `sink`. `sink` returns false to abort the transfer.
    pub fn do_default(
        &self,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<HttpResponse, DownError> {
        self.execute(None, None, sink)
    }

    /// Ranged GET for `bytes=start-end` (inclusive). Strict: the body is only
    /// delivered when the server answers 206 with a matching Content-Range,
    /// so a server that ignores the Range header cannot corrupt block writes.
    pub fn do_range(
        &self,
        start: i64,
        end: i64,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<HttpResponse, DownError> {
        self.execute(Some(RangeSpec { start, end, strict: true }), None, sink)
    }

    /// Ranged GET that delivers at most `max_body` bytes and then drops the
    /// connection, reporting success. Used by the probe so a server that
    /// ignores the Range header cannot make it stream the whole file.
    pub fn do_range_limited(
        &self,
        start: i64,
        end: i64,
        max_body: usize,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<HttpResponse, DownError> {
        self.execute(Some(RangeSpec { start, end, strict: false }), Some(max_body), sink)
    }

    fn execute(
        &self,
        range: Option<RangeSpec>,
        body_limit: Option<usize>,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<HttpResponse, DownError> {
        let mut attempt = 1u32;
        loop {
            self.token.check()?;

            let mut delivered = 0usize;
            let mut sink_aborted = false;
            let mut range_violation = false;
            match self.attempt(
                range,
                body_limit,
                &mut delivered,
                &mut sink_aborted,
                &mut range_violation,
                sink,
            ) {
                Ok(res) if res.status < 400 => {
                    if range_violation {
                        // 2xx without a matching 206: nothing was written and
                        // there is no point retrying the same request.
                        return Err(DownError::Status { url: self.url.clone(), code: res.status });
                    }
                    return Ok(res);
                }
                Ok(res) => {
                    // Error status; the body was swallowed, so retrying is safe.
                    if attempt >= self.retry_count {
                        return Err(DownError::Status { url: self.url.clone(), code: res.status });
                    }
                    tracing::debug!(url = %self.url, status = res.status, attempt, "retrying after HTTP error");
                }
                Err(e) => {
                    if sink_aborted || e.is_aborted_by_callback() {
                        // Cancelled via token, or the sink refused data; the
                        // sink's own error (if any) is recovered by the caller.
                        return Err(self.token.reason().unwrap_or(DownError::Transport(e)));
                    }
                    if delivered > 0 || attempt >= self.retry_count {
                        return Err(DownError::Transport(e));
                    }
                    tracing::debug!(url = %self.url, error = %e, attempt, "retrying after transport error");
                }
            }

            if self.token.sleep(self.retry_backoff) {
                return Err(self.token.reason().unwrap_or(DownError::Cancelled));
            }
            attempt += 1;
        }
    }

    fn attempt(
        &self,
        range: Option<RangeSpec>,
        body_limit: Option<usize>,
        delivered: &mut usize,
        sink_aborted: &mut bool,
        range_violation: &mut bool,
        sink: &mut dyn FnMut(&[u8]) -> bool,
    ) -> Result<HttpResponse, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(&self.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        // Identity transfer so Content-Length reflects bytes on the wire.
        easy.accept_encoding("identity")?;
        // Stall guard: under 1 KiB/s for 60 s counts as a dead transfer.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;
        easy.progress(true)?;
        if let Some(p) = &self.proxy {
            easy.proxy(p)?;
        }
        if self.insecure_skip_verify {
            easy.ssl_verify_peer(false)?;
            easy.ssl_verify_host(false)?;
        }
        if let Some(r) = range {
            easy.range(&format!("{}-{}", r.start, r.end))?;
        }
        if let Some(body) = &self.body {
            easy.post_fields_copy(body)?;
        }
        if self.method != "GET" || self.body.is_some() {
            easy.custom_request(&self.method)?;
        }
        if !self.headers.is_empty() {
            let mut list = curl::easy::List::new();
            for (k, v) in &self.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }

        let status = Cell::new(0u32);
        let truncated = Cell::new(false);
        // None = not yet checked; Some(false) = swallow the body.
        let range_ok: Cell<Option<bool>> = Cell::new(None);
        let header_lines: RefCell<Vec<String>> = RefCell::new(Vec::new());
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = std::str::from_utf8(data) {
                    let line = s.trim_end();
                    // Redirects emit multiple header blocks; keep only the
                    // final response's headers.
                    if line.starts_with("HTTP/") {
                        header_lines.borrow_mut().clear();
                        status.set(parse_status_line(line).unwrap_or(0));
                    }
                    header_lines.borrow_mut().push(line.to_string());
                }
                true
            })?;
            let token = self.token.clone();
            transfer.progress_function(move |_, _, _, _| !token.is_cancelled())?;
            transfer.write_function(|data| {
                if status.get() >= 400 {
                    // Swallow error bodies so a later retry starts clean.
                    return Ok(data.len());
                }
                if let Some(r) = range.filter(|r| r.strict) {
                    if range_ok.get().is_none() {
                        let lines = header_lines.borrow();
                        let matches = status.get() == 206
                            && header_value(&lines, "content-range")
                                .and_then(content_range_start)
                                .map_or(true, |s| s == r.start);
                        range_ok.set(Some(matches));
                    }
                    if range_ok.get() == Some(false) {
                        return Ok(data.len());
                    }
                }
                let take = match body_limit {
                    Some(limit) => {
                        let room = limit.saturating_sub(*delivered);
                        if room == 0 {
                            truncated.set(true);
                            return Ok(0);
                        }
                        room.min(data.len())
                    }
                    None => data.len(),
                };
                if sink(&data[..take]) {
                    *delivered += take;
                    if take < data.len() {
                        truncated.set(true);
                        return Ok(0);
                    }
                    Ok(data.len())
                } else {
                    *sink_aborted = true;
                    Ok(0)
                }
            })?;
            let r = transfer.perform();
            match r {
                Ok(()) => {}
                // Cutting off a limited body aborts the transfer; that is
                // success for the caller, headers and head bytes are in hand.
                Err(_) if truncated.get() => {}
                Err(e) => return Err(e),
            }
        }

        let code = easy.response_code()?;
        if range_ok.get() == Some(false) {
            *range_violation = true;
        }
        Ok(HttpResponse { status: code, headers: header_lines.into_inner() })
    }
}

/// Byte range for a request, inclusive on both ends. `strict` requires a
/// matching 206 before any body byte is delivered.
#[derive(Debug, Clone, Copy)]
struct RangeSpec {
    start: i64,
    end: i64,
    strict: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_header_lookup() {
        let res = HttpResponse {
            status: 206,
            headers: vec![
                "HTTP/1.1 206 Partial Content".to_string(),
                "Content-Range: bytes 0-9/1024".to_string(),
                "Accept-Ranges: bytes".to_string(),
            ],
        };
        assert_eq!(res.header("content-range"), Some("bytes 0-9/1024"));
        assert_eq!(res.header("ACCEPT-RANGES"), Some("bytes"));
        assert_eq!(res.header("etag"), None);
    }
}
