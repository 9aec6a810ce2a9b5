//! Filename hints carried by a Content-Disposition header.

/// The two filename parameters a header may carry. RFC 6266 gives the
/// RFC 5987 `filename*` form precedence over the plain `filename` token.
#[derive(Debug, Default, PartialEq, Eq)]
struct FilenameHints {
    plain: Option<String>,
    extended: Option<String>,
}

impl FilenameHints {
    /// Single pass over every `key=value` parameter in the header. Values
    /// are fully resolved here (unquoted or percent-decoded); empty results
    /// count as absent.
    fn scan(header: &str) -> FilenameHints {
        let mut hints = FilenameHints::default();
        for param in header.split(';') {
            let Some(eq) = param.find('=') else { continue };
            let key = param[..eq].trim();
            let raw = param[eq + 1..].trim();
            if key.eq_ignore_ascii_case("filename") {
                hints.plain = unquote(raw).filter(|v| !v.is_empty());
            } else if key.eq_ignore_ascii_case("filename*") {
                hints.extended = decode_rfc5987(raw).filter(|v| !v.is_empty());
            }
        }
        hints
    }
}

/// The filename a Content-Disposition header suggests, if any.
pub fn disposition_filename(header: &str) -> Option<String> {
    let hints = FilenameHints::scan(header);
    hints.extended.or(hints.plain)
}

/// Resolves a possibly quoted parameter value. Inside quotes, a backslash
/// escapes the following character; bare tokens pass through unchanged.
fn unquote(raw: &str) -> Option<String> {
    let inner = match raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        Some(quoted) => quoted,
        None => return Some(raw.to_string()),
    };
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    if escaped {
        out.push('\\');
    }
    Some(out)
}

/// Decodes an RFC 5987 value of the form `charset'language'pct-encoded`.
/// Rejects charsets we cannot interpret and malformed percent escapes, so a
/// bad extended parameter falls back to the plain one.
fn decode_rfc5987(raw: &str) -> Option<String> {
    let mut fields = raw.splitn(3, '\'');
    let charset = fields.next()?;
    let _language = fields.next()?;
    let encoded = fields.next()?;
    if !charset.eq_ignore_ascii_case("utf-8") && !charset.eq_ignore_ascii_case("iso-8859-1") {
        return None;
    }

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(pos) = rest.find('%') {
        bytes.extend_from_slice(rest[..pos].as_bytes());
        let hex = rest.get(pos + 1..pos + 3)?;
        bytes.push(u8::from_str_radix(hex, 16).ok()?);
        rest = &rest[pos + 3..];
    }
    bytes.extend_from_slice(rest.as_bytes());
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
