/// Normalizes a checksum for comparison.
///
/// Trims whitespace, lowercases, and drops leading zeros. An all-zero
/// value normalizes to `"0"`; an empty value stays empty.
pub fn normalize_checksum(value: &str) -> String {
    let lowered = value.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return lowered;
    }
    let stripped = lowered.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Returns `true` if two checksums denote the same value.
///
/// Some backends pad 32-bit checksums with leading zeros and some report
/// upper-case hex; neither difference is a mismatch.
pub fn checksums_match(a: &str, b: &str) -> bool {
    normalize_checksum(a) == normalize_checksum(b)
}
