const UNITS: [(u64, &str); 4] = [
    (1 << 30, "GB"),
    (1 << 20, "MB"),
    (1 << 10, "KB"),
    (1, "B"),
];

/// Human-readable byte count with two decimals, e.g. `1.50 MB`.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    for (unit, name) in UNITS {
        if bytes >= unit {
            let value = bytes as f64 / unit as f64;
            return format!("{value:.2} {name}");
        }
    }
    "0 B".to_string()
}
