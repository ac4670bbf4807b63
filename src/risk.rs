//! Heuristic risk fusion and score aggregation.
//!
//! The model's per-clause risk label is treated as a starting point; a
//! fixed keyword vocabulary supplies minimum risk floors that can only
//! raise the final label, never lower it. Because fusion is a max-reduce
//! over the table, scan order cannot affect the result.

use crate::models::{ClauseFinding, RiskLevel};

/// Risk-indicating keyword patterns and their minimum risk floors.
///
/// Matched as case-insensitive substrings; `indemnif` deliberately covers
/// indemnify/indemnification/indemnified.
pub const RISK_KEYWORDS: &[(&str, RiskLevel)] = &[
    ("non-compete", RiskLevel::High),
    ("non compete", RiskLevel::High),
    ("penalty", RiskLevel::High),
    ("forfeit", RiskLevel::High),
    ("terminate", RiskLevel::High),
    ("termination", RiskLevel::High),
    ("indemnif", RiskLevel::High),
    ("confidential", RiskLevel::Medium),
    ("privacy", RiskLevel::Medium),
    ("data protection", RiskLevel::Medium),
    ("intellectual property", RiskLevel::Medium),
];

/// Fuse the model-reported label with keyword evidence.
///
/// Starts from the parsed model label (`Low` when absent or unrecognized)
/// and escalates to the maximum floor among matched keywords. Monotonic:
/// keyword evidence never downgrades the model's label.
pub fn fuse(clause_text: &str, model_risk: Option<&str>) -> RiskLevel {
    let mut level = RiskLevel::parse_label(model_risk);
    let lower = clause_text.to_lowercase();
    for (keyword, floor) in RISK_KEYWORDS {
        if lower.contains(keyword) {
            level = level.max(*floor);
        }
    }
    level
}

/// Aggregate fused clause labels into an overall 0..=100 score.
///
/// Mean ordinal over all clauses, rescaled linearly from `[1, 3]` to
/// `[0, 100]` and truncated. No clauses yields 0.
pub fn aggregate_score(clauses: &[ClauseFinding]) -> u8 {
    if clauses.is_empty() {
        return 0;
    }
    let total: u32 = clauses.iter().map(|c| c.risk.ordinal()).sum();
    let avg = f64::from(total) / clauses.len() as f64;
    (((avg - 1.0) / 2.0) * 100.0) as u8
}
