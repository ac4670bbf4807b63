//! Industry tagging via keyword vocabularies.
//!
//! Tags the full document text (not individual chunks) against a small
//! per-industry vocabulary. Matching is non-exclusive: a contract can be
//! both Healthcare and Employment.

/// Per-industry keyword vocabularies, matched as case-insensitive
/// substrings. Table order fixes the order of returned tags.
pub const INDUSTRY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Healthcare",
        &["hipaa", "patient", "medical", "healthcare", "hospital"],
    ),
    (
        "Finance",
        &["gdpr", "ccpa", "financial", "bank", "securities", "payment"],
    ),
    (
        "Technology",
        &["source code", "software", "api", "technology", "intellectual property"],
    ),
    (
        "Employment",
        &["employee", "employment", "non-compete", "compensation", "salary"],
    ),
];

/// Fallback tag when no industry vocabulary matches.
pub const GENERAL_TAG: &str = "General";

/// Return all industries whose vocabulary matches `text`.
///
/// Falls back to `["General"]` when nothing matches, so the tag list is
/// never empty.
pub fn detect_industries(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut found = Vec::new();
    for (industry, keywords) in INDUSTRY_KEYWORDS {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            found.push((*industry).to_string());
        }
    }
    if found.is_empty() {
        found.push(GENERAL_TAG.to_string());
    }
    found
}
