//! Filesystem sanitization for derived filenames.

/// Longest filename we will produce, in characters.
const MAX_LEN: usize = 255;

/// Strips characters that are unsafe in filenames across the filesystems we
/// care about, trims leading whitespace and dots, and caps the length.
/// May return an empty string; callers fall back to a generated name.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '/' | '\\' | '?' | '*' | '"' | '<' | '>' | '|' | ':' | '\0' => {}
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    let out = out.trim_start_matches([' ', '\t', '.']).trim_end();
    out.chars().take(MAX_LEN).collect()
}
