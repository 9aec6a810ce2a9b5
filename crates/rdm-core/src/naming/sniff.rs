//! File-type detection from magic bytes and Content-Type.

/// Magic prefixes of common downloadable formats, checked in order.
const MAGIC: &[(&[u8], &str)] = &[
    // Images
    (&[0xFF, 0xD8, 0xFF, 0xE0], "jpg"),
    (&[0xFF, 0xD8, 0xFF, 0xE1], "jpg"),
    (&[0xFF, 0xD8, 0xFF, 0xE8], "jpg"),
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"GIF8", "gif"),
    (&[0x49, 0x49, 0x2A, 0x00], "tif"),
    (b"BM", "bmp"),
    (b"8BPS", "psd"),
    // Audio
    (b"WAVE", "wav"),
    (b"MThd", "mid"),
    (b"ID3", "mp3"),
    (&[0xFF, 0xFB], "mp3"),
    // Video
    (b"AVI ", "avi"),
    (b".RMF", "rm"),
    (&[0x00, 0x00, 0x01, 0xBA], "mpg"),
    (&[0x00, 0x00, 0x01, 0xB3], "mpg"),
    (b"moov", "mov"),
    (b"mdat", "mov"),
    (&[0x00, 0x00, 0x00, 0x18, 0x66, 0x74, 0x79, 0x70], "mp4"),
    // Archives
    (b"PK\x03\x04", "zip"),
    (b"Rar!", "rar"),
    (&[0x1F, 0x8B], "gz"),
    (b"7z\xBC\xAF\x27\x1C", "7z"),
    // Documents and text
    (b"{\\rtf", "rtf"),
    (b"<?xml", "xml"),
    (b"%PDF-1.", "pdf"),
    (b"%!PS-Adobe", "ps"),
    (&[0x7F, 0x45, 0x4C, 0x46], "bin"),
];

/// Extension guessed from the first bytes of the file, if any prefix matches.
pub fn sniff_extension(head: &[u8]) -> Option<&'static str> {
    if head.is_empty() {
        return None;
    }
    MAGIC
        .iter()
        .find(|(prefix, _)| head.starts_with(prefix))
        .map(|&(_, ext)| ext)
}

/// Extension for a Content-Type value (parameters after `;` ignored).
/// `application/octet-stream` is deliberately unmapped.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let ext = match essence.as_str() {
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/gzip" => "gz",
        "application/x-tar" => "tar",
        "application/x-7z-compressed" => "7z",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "text/html" => "html",
        "text/plain" => "txt",
        "text/csv" => "csv",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/x-msvideo" => "avi",
        _ => return None,
    };
    Some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_extension(b"%PDF-1.4\n%"), Some("pdf"));
        assert_eq!(sniff_extension(b"PK\x03\x04rest"), Some("zip"));
        assert_eq!(sniff_extension(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), Some("jpg"));
        assert_eq!(sniff_extension(b"GIF89a"), Some("gif"));
    }

    #[test]
    fn unknown_or_empty() {
        assert_eq!(sniff_extension(b""), None);
        assert_eq!(sniff_extension(b"plain text here"), None);
    }

    #[test]
    fn content_type_lookup() {
        assert_eq!(extension_for_content_type("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_content_type("text/html; charset=utf-8"), Some("html"));
        assert_eq!(extension_for_content_type("Application/JSON"), Some("json"));
        assert_eq!(extension_for_content_type("application/octet-stream"), None);
        assert_eq!(extension_for_content_type("x/y"), None);
    }
}
