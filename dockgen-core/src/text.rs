//! Defensive handling of text read from project files.
//!
//! Manifest files in the wild regularly carry a byte-order mark or are
//! outright malformed; neither may abort a generation.

use serde_json::Value;

/// Drops a leading U+FEFF if present. Rust strings are already decoded,
/// so a single check covers files that were UTF-8 or UTF-16 on disk.
/// Idempotent.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// BOM-strips, trims, and attempts JSON decoding. Any failure yields
/// `None` ("no usable data"); this never panics or propagates an error.
pub fn parse_structured(text: &str) -> Option<Value> {
    let cleaned = strip_bom(text).trim();
    if cleaned.is_empty() {
        return None;
    }
    serde_json::from_str(cleaned).ok()
}
