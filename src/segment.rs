//! Clause boundary detection.
//!
//! Splits raw contract text into candidate clause units on numbering and
//! `Section N` heading markers. This is a heuristic, not a legal clause
//! parser: missed boundaries and spurious splits inside numbered lists
//! are accepted failure modes.

use std::sync::OnceLock;

use regex::Regex;

/// Boundary markers: a newline followed by `N. ` or `N) `, or a
/// case-insensitive `section N` heading followed by `:`, `.`, or space.
fn boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\n\d+\.\s+|\n\d+\)\s+|section\s+\d+[:.\s]+")
            .expect("clause boundary pattern is valid")
    })
}

/// Split text into clause strings at boundary markers.
///
/// Each segment is trimmed and empty segments are dropped. Text without
/// any marker comes back as a single clause; empty or whitespace-only
/// input yields no clauses.
pub fn split_into_clauses(text: &str) -> Vec<String> {
    boundary_re()
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
