//! Content fingerprinting and version diffing.
//!
//! The fingerprint is the SHA-256 hex digest of a document's text and
//! serves as both the analysis-cache key and the change-detection
//! primitive. The diff is a display-only unified line diff between two
//! text versions; it is never used for merging.

use sha2::{Digest, Sha256};
use similar::TextDiff;

/// SHA-256 hex digest of the UTF-8 bytes of `text`.
///
/// Deterministic and stable across calls; identical texts always map to
/// the same digest.
///
/// ```rust
/// use contract_lens::checksum::fingerprint;
///
/// let a = fingerprint("hello");
/// assert_eq!(a, fingerprint("hello"));
/// assert_eq!(a.len(), 64);
/// ```
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Unified line diff between two text versions, with 3 lines of context.
///
/// Returns an empty string when the texts are identical (no hunks, no
/// headers).
pub fn unified_diff(old_text: &str, new_text: &str) -> String {
    TextDiff::from_lines(old_text, new_text)
        .unified_diff()
        .context_radius(3)
        .header("previous", "current")
        .to_string()
}
