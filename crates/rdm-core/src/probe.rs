//! Initial resource probe.
//!
//! One tiny ranged GET (`bytes=0-9`) answers everything the orchestrator
//! needs: total size, whether the server honors ranges, a filename hint, and
//! the file's first bytes for extension sniffing.

use crate::error::DownError;
use crate::http::{content_range_total, HttpClient};
use crate::naming;

/// What the probe learned about the remote resource.
#[derive(Debug, Clone)]
pub struct ResourceInfo {
    /// Total length in bytes; 0 when the server reported nothing usable.
    pub total: i64,
    /// True when ranged requests can drive a multi-threaded download.
    pub multithread: bool,
    /// Filename derived from headers, URL, and magic bytes.
    pub filename: String,
}

pub fn probe(client: &HttpClient) -> Result<ResourceInfo, DownError> {
    let mut head = Vec::with_capacity(10);
    let res = client.do_range_limited(0, 9, 10, &mut |data| {
        head.extend_from_slice(data);
        true
    })?;

    let mut total = res
        .header("content-range")
        .and_then(content_range_total)
        .unwrap_or(0);

    // Range support: an explicit Accept-Ranges, a bytes Content-Range, or a
    // server that answered the 10-byte request with exactly 10 bytes.
    let accept_ranges = res.header("accept-ranges").map_or(false, |v| !v.is_empty());
    let content_range_bytes = res
        .header("content-range")
        .map_or(false, |v| v.contains("bytes"));
    let honored_probe = res.header("content-length") == Some("10");
    let multithread = accept_ranges || content_range_bytes || honored_probe;

    if multithread {
        tracing::debug!(url = client.url(), total, "server is range-capable");
    } else {
        // Range ignored: the collected bytes are not a trustworthy file
        // head, and the size comes from Content-Length instead.
        head.clear();
        if total == 0 {
            total = res
                .header("content-length")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(0);
        }
    }

    let filename = naming::derive_filename(
        client.url(),
        res.header("content-disposition"),
        res.header("content-type"),
        &head,
    );

    Ok(ResourceInfo { total, multithread, filename })
}
