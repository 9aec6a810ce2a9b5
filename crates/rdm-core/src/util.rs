//! Small formatting helpers shared with the CLI.

/// Two-decimal human-readable byte size.
pub fn format_size(bytes: i64) -> String {
    if bytes < 0 {
        return "0.00 B".to_string();
    }
    const UNITS: &[(&str, f64)] = &[
        ("TiB", 1024.0 * 1024.0 * 1024.0 * 1024.0),
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
    ];
    let b = bytes as f64;
    for &(unit, scale) in UNITS {
        if b >= scale {
            return format!("{:.2} {}", b / scale, unit);
        }
    }
    format!("{:.2} B", b)
}
