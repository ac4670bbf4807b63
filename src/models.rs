//! Core data models used throughout Contract Lens.
//!
//! These types represent the documents and analysis results that flow
//! through the risk-analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk label attached to a clause, totally ordered `Low < Medium < High`.
///
/// The derived `Ord` follows declaration order, which is what the
/// max-escalation fusion in [`crate::risk::fuse`] relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Numeric ordinal used for score aggregation: Low=1, Medium=2, High=3.
    pub fn ordinal(self) -> u32 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    /// Parse a model-reported label, case-insensitively.
    ///
    /// Absent or unrecognized labels fall back to `Low` so that keyword
    /// evidence alone decides the final level.
    pub fn parse_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_lowercase()) {
            Some(l) if l == "high" => RiskLevel::High,
            Some(l) if l == "medium" => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single analyzed clause with its fused risk label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseFinding {
    /// Clause body text.
    pub text: String,
    /// Final label after keyword escalation over the model's label.
    pub risk: RiskLevel,
    /// Free-text rationale from the model, may be empty.
    pub explanation: String,
    /// Suggested replacement text, may be empty.
    pub rewrite: String,
    /// The original per-clause object returned by the model, kept verbatim.
    pub source_llm: serde_json::Value,
}

/// Complete structured output of one pipeline run.
///
/// Serialized as-is into `documents.analysis_json` and
/// `analysis_cache.result_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Clause findings in chunk-then-within-chunk order.
    pub clauses: Vec<ClauseFinding>,
    /// Mean clause risk rescaled to 0..=100 (0 when there are no clauses).
    pub overall_risk_score: u8,
    /// Matched industry tags, `["General"]` when nothing matched.
    pub tags: Vec<String>,
    /// Unified diff against the owner's previous document, `None` when no
    /// prior document with text exists. `Some("")` for identical texts.
    pub diff_summary: Option<String>,
    /// SHA-256 fingerprint of the analyzed text, also the cache key.
    pub cache_hash: String,
    /// Raw per-chunk model responses, retained for audit.
    pub raw_responses: Vec<crate::model::ChunkAnalysis>,
    pub analyzed_at: DateTime<Utc>,
}

/// A stored contract document.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Opaque owner reference; scopes retrieval and version lookups.
    pub owner: String,
    pub title: Option<String>,
    /// Extracted plain text. May be empty for documents whose extraction
    /// failed upstream.
    pub text_content: String,
    /// Result of the most recent successful pipeline run.
    pub analysis: Option<AnalysisResult>,
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_ordering() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Medium < RiskLevel::High);
        assert_eq!(RiskLevel::Low.max(RiskLevel::High), RiskLevel::High);
    }

    #[test]
    fn test_parse_label_case_insensitive() {
        assert_eq!(RiskLevel::parse_label(Some("HIGH")), RiskLevel::High);
        assert_eq!(RiskLevel::parse_label(Some("medium")), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse_label(Some("Low")), RiskLevel::Low);
    }

    #[test]
    fn test_parse_label_fallback() {
        assert_eq!(RiskLevel::parse_label(None), RiskLevel::Low);
        assert_eq!(RiskLevel::parse_label(Some("severe")), RiskLevel::Low);
        assert_eq!(RiskLevel::parse_label(Some("")), RiskLevel::Low);
    }

    #[test]
    fn test_risk_serde_labels() {
        let json = serde_json::to_string(&RiskLevel::High).unwrap();
        assert_eq!(json, "\"High\"");
        let back: RiskLevel = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(back, RiskLevel::Medium);
    }
}
