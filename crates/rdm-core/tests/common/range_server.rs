//! Minimal HTTP/1.1 server with Range support for integration tests.
//!
//! Serves a single static body, records every request, and can be configured
//! to refuse ranges, fail specific block requests with 503, attach a
//! Content-Disposition, or trickle the body slowly for cancellation tests.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub no_ranges: bool,
    /// Content-Disposition header value to attach, if any.
    pub content_disposition: Option<String>,
    /// Content-Type header value to attach, if any.
    pub content_type: Option<String>,
    /// Serve 503 for the first `fail_count` GETs matching this exact
    /// inclusive range (the 10-byte probe never matches it).
    pub fail_range: Option<(u64, u64)>,
    pub fail_count: u32,
    /// Sleep this long between 8 KiB body chunks (slow-server mode).
    pub chunk_delay: Option<Duration>,
}

/// One received request.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: String,
    /// Raw `Range` header value, e.g. `bytes=0-9`.
    pub range: Option<String>,
}

pub struct RangeServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl RangeServer {
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }

    /// Range header values of all non-probe GETs, sorted by start offset.
    pub fn block_ranges(&self) -> Vec<String> {
        let mut out: Vec<(u64, String)> = self
            .requests()
            .iter()
            .filter_map(|c| c.range.clone())
            .filter(|r| r != "bytes=0-9")
            .filter_map(|r| parse_range(&r).map(|(s, _)| (s, r)))
            .collect();
        out.sort();
        out.into_iter().map(|(_, r)| r).collect()
    }
}

/// Starts a server in a background thread serving `body`; it runs until the
/// process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let fails_left = Arc::new(Mutex::new(opts.fail_count));

    let reqs = Arc::clone(&requests);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let reqs = Arc::clone(&reqs);
            let fails_left = Arc::clone(&fails_left);
            let opts = opts.clone();
            thread::spawn(move || handle(stream, &body, &opts, &reqs, &fails_left));
        }
    });

    RangeServer {
        url: format!("http://127.0.0.1:{}/file.bin", port),
        requests,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: &RangeServerOptions,
    requests: &Mutex<Vec<Captured>>,
    fails_left: &Mutex<u32>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range_raw) = parse_request(request);
    requests.lock().unwrap().push(Captured {
        method: method.to_string(),
        range: range_raw.clone(),
    });

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let total = body.len() as u64;
    let range = range_raw.as_deref().and_then(parse_range);

    // Configured per-block failures (probe never matches).
    if let (Some(fail), Some((start, end))) = (opts.fail_range, range) {
        let end = end.min(total.saturating_sub(1));
        if (start, end) == fail {
            let mut left = fails_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                let _ = stream.write_all(
                    b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
                return;
            }
        }
    }

    let mut extra = String::new();
    if let Some(cd) = &opts.content_disposition {
        extra.push_str(&format!("Content-Disposition: {}\r\n", cd));
    }
    if let Some(ct) = &opts.content_type {
        extra.push_str(&format!("Content-Type: {}\r\n", ct));
    }

    let (head, slice) = match range.filter(|_| !opts.no_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl || start >= total {
                (
                    format!(
                        "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\n{}Connection: close\r\n\r\n",
                        total, extra
                    ),
                    &body[0..0],
                )
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                (
                    format!(
                        "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\nAccept-Ranges: bytes\r\n{}Connection: close\r\n\r\n",
                        slice.len(),
                        start,
                        end_incl,
                        total,
                        extra
                    ),
                    slice,
                )
            }
        }
        None => {
            let accept = if opts.no_ranges { "" } else { "Accept-Ranges: bytes\r\n" };
            (
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}{}Connection: close\r\n\r\n",
                    total, accept, extra
                ),
                body,
            )
        }
    };

    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    match opts.chunk_delay {
        None => {
            let _ = stream.write_all(slice);
        }
        Some(delay) => {
            for chunk in slice.chunks(8192) {
                if stream.write_all(chunk).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        }
    }
}

/// Returns (method, raw Range header value).
fn parse_request(request: &str) -> (&str, Option<String>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                range = Some(value.trim().to_string());
            }
        }
    }
    (method, range)
}

/// Parses `bytes=X-Y` into (start, end inclusive).
fn parse_range(value: &str) -> Option<(u64, u64)> {
    let rest = value.strip_prefix("bytes=")?;
    let (a, b) = rest.split_once('-')?;
    let start = a.trim().parse::<u64>().ok()?;
    let end = if b.trim().is_empty() {
        u64::MAX
    } else {
        b.trim().parse::<u64>().ok()?
    };
    Some((start, end))
}
