//! Output filename derivation.
//!
//! Name source order: Content-Disposition `filename`, last URL path segment,
//! random fallback. Extension source order: magic bytes of the probed file
//! head, then Content-Type lookup.

mod disposition;
mod sanitize;
mod sniff;

pub use disposition::disposition_filename;
pub use sanitize::sanitize_filename;
pub use sniff::{extension_for_content_type, sniff_extension};

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// Derives the output filename for a download.
///
/// `head` is the first bytes of the resource (empty when the probe could not
/// read a trustworthy file head).
pub fn derive_filename(
    url: &str,
    content_disposition: Option<&str>,
    content_type: Option<&str>,
    head: &[u8],
) -> String {
    if let Some(name) = content_disposition.and_then(disposition_filename) {
        return name;
    }

    let ext = match sniff_extension(head).or_else(|| content_type.and_then(extension_for_content_type)) {
        Some(e) => format!(".{}", e),
        None => String::new(),
    };

    match url_segment(url).map(|s| sanitize_filename(&s)).filter(|s| !s.is_empty()) {
        Some(name) if name.ends_with(&ext) => name,
        Some(name) => format!("{}{}", name, ext),
        None => random_filename(&ext),
    }
}

/// Last meaningful segment of the URL path, as a name hint. Trailing empty
/// segments and dot segments are skipped.
fn url_segment(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .rev()
        .find(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string)
}

/// Fallback name when nothing else yields one.
fn random_filename(ext: &str) -> String {
    let mut rng = rand::thread_rng();
    let tag: String = (0..5).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("file_{}{}{}", tag, nanos, ext)
}

/// First `stem (N).ext` variant of `path` that does not exist yet.
/// Returns `path` itself when it is free.
pub fn unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => {
            let (s, e) = name.split_at(i);
            (s.to_string(), e.to_string())
        }
        _ => (name, String::new()),
    };
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    for n in 1u32.. {
        let candidate = parent.join(format!("{} ({}){}", stem, n, ext));
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("unique_path: exhausted counters")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_wins() {
        let name = derive_filename(
            "https://example.com/archive.zip",
            Some("attachment; filename=\"report.pdf\""),
            None,
            &[],
        );
        assert_eq!(name, "report.pdf");
    }

    #[test]
    fn url_segment_picks_last_meaningful() {
        assert_eq!(
            url_segment("https://example.com/a/b/file.deb").as_deref(),
            Some("file.deb")
        );
        assert_eq!(
            url_segment("https://example.com/file.zip?token=abc").as_deref(),
            Some("file.zip")
        );
        // Trailing slash: the directory name still works as a hint.
        assert_eq!(
            url_segment("https://example.com/downloads/").as_deref(),
            Some("downloads")
        );
    }

    #[test]
    fn url_segment_empty_cases() {
        assert_eq!(url_segment("https://example.com/"), None);
        assert_eq!(url_segment("https://example.com"), None);
        assert_eq!(url_segment("https://example.com/.."), None);
        assert_eq!(url_segment("not a url"), None);
    }

    #[test]
    fn url_segment_with_content_type_extension() {
        let name = derive_filename("https://example.com/files/readme", None, Some("application/pdf"), &[]);
        assert_eq!(name, "readme.pdf");
    }

    #[test]
    fn magic_bytes_beat_content_type() {
        // PDF magic on the head wins over a misleading Content-Type.
        let head = b"%PDF-1.7 rest";
        let name = derive_filename("https://example.com/doc", None, Some("text/plain"), head);
        assert_eq!(name, "doc.pdf");
    }

    #[test]
    fn existing_extension_not_doubled() {
        let head = [0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0, 0, 0];
        let name = derive_filename("https://example.com/pack.zip", None, None, &head);
        assert_eq!(name, "pack.zip");
    }

    #[test]
    fn random_fallback_shape() {
        let name = derive_filename("https://example.com/", None, None, &[]);
        assert!(name.starts_with("file_"), "{name}");
    }

    #[test]
    fn unique_path_counts_up() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("file.iso");
        assert_eq!(unique_path(&p), p);
        std::fs::write(&p, b"x").unwrap();
        let p1 = unique_path(&p);
        assert_eq!(p1.file_name().unwrap().to_str().unwrap(), "file (1).iso");
        std::fs::write(&p1, b"x").unwrap();
        let p2 = unique_path(&p);
        assert_eq!(p2.file_name().unwrap().to_str().unwrap(), "file (2).iso");
    }

    #[test]
    fn unique_path_no_extension() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("download");
        std::fs::write(&p, b"x").unwrap();
        assert_eq!(
            unique_path(&p).file_name().unwrap().to_str().unwrap(),
            "download (1)"
        );
    }
}
