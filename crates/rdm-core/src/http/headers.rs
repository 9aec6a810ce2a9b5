//! Raw response-header line helpers.

/// Status code from an `HTTP/x.y NNN ...` line.
pub fn parse_status_line(line: &str) -> Option<u32> {
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse::<u32>().ok()
}

/// Value of the first header named `name` (case-insensitive) among raw
/// `Name: value` lines.
pub fn header_value<'a>(lines: &'a [String], name: &str) -> Option<&'a str> {
    for line in lines {
        if let Some((n, v)) = line.split_once(':') {
            if n.trim().eq_ignore_ascii_case(name) {
                return Some(v.trim());
            }
        }
    }
    None
}

/// First offset from a `Content-Range` value (e.g. `bytes 100-199/1000`).
pub fn content_range_start(value: &str) -> Option<i64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (range, _) = rest.split_once('/')?;
    let (start, _) = range.split_once('-')?;
    start.trim().parse::<i64>().ok()
}

/// Total length from a `Content-Range` value's `/<total>` suffix
/// (e.g. `bytes 0-9/1024`). `*` and junk yield `None`.
pub fn content_range_total(value: &str) -> Option<i64> {
    let (_, total) = value.split_once('/')?;
    let total = total.trim();
    if total == "*" {
        return None;
    }
    total.parse::<i64>().ok()
}
