//! Analysis pipeline orchestration.
//!
//! Coordinates the full run for one document: fingerprint → cache lookup
//! → clause segmentation → chunking → per-chunk model calls → risk
//! fusion → score aggregation → industry tagging → previous-version diff
//! → cache write-through → document attach.
//!
//! Failure semantics: only empty input text is fatal. Per-chunk model
//! failures and cache read/write failures degrade gracefully — the run
//! still returns a best-effort result, with the failures logged and the
//! raw responses retained for audit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::warn;

use crate::checksum;
use crate::chunk::chunk_clauses;
use crate::config::AnalysisConfig;
use crate::model::ModelProvider;
use crate::models::{AnalysisResult, ClauseFinding, Document};
use crate::risk;
use crate::segment::split_into_clauses;
use crate::store;
use crate::tagger::detect_industries;

/// Caller-visible pipeline failures.
///
/// Everything else (model errors, malformed output, cache anomalies) is
/// absorbed into the returned result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The document has no extractable text. No state is written.
    #[error("Document has no extracted text.")]
    EmptyContent,
    /// Persisting the analysis to the document store failed.
    #[error("Failed to persist analysis: {0}")]
    Store(#[source] anyhow::Error),
}

impl PipelineError {
    /// Stable machine-readable error code for API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::EmptyContent => "empty_text",
            PipelineError::Store(_) => "store_error",
        }
    }
}

/// One async mutex per fingerprint, so two simultaneous runs on
/// identical text serialize: the second observes the first's cache row
/// and never calls the model.
#[derive(Default)]
struct FingerprintLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FingerprintLocks {
    fn for_fingerprint(&self, hash: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap();
        // Drop entries no run is holding so the map does not grow with
        // every distinct fingerprint seen.
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry(hash.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// The analysis pipeline. Cheap to share behind an `Arc`; one instance
/// per process is the intended shape so fingerprint locks are global.
pub struct Pipeline {
    pool: SqlitePool,
    provider: Arc<dyn ModelProvider>,
    max_words_per_chunk: usize,
    locks: FingerprintLocks,
}

impl Pipeline {
    pub fn new(pool: SqlitePool, provider: Arc<dyn ModelProvider>, config: &AnalysisConfig) -> Self {
        Self {
            pool,
            provider,
            max_words_per_chunk: config.max_words_per_chunk,
            locks: FingerprintLocks::default(),
        }
    }

    /// Run the analysis for one document.
    ///
    /// On a cache hit (and `force_reanalyze == false`) the stored result
    /// is attached to the document and returned without any model call.
    pub async fn run(
        &self,
        document: &Document,
        force_reanalyze: bool,
    ) -> Result<AnalysisResult, PipelineError> {
        let text = document.text_content.trim();
        if text.is_empty() {
            return Err(PipelineError::EmptyContent);
        }

        let checksum = checksum::fingerprint(text);

        let lock = self.locks.for_fingerprint(&checksum);
        let _guard = lock.lock().await;

        // 1) cache hit?
        if !force_reanalyze {
            match store::cache_lookup(&self.pool, &checksum).await {
                Ok(Some(cached)) => {
                    store::save_analysis(&self.pool, &document.id, &cached)
                        .await
                        .map_err(PipelineError::Store)?;
                    return Ok(cached);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(fingerprint = %checksum, error = %e, "cache read failed; reanalyzing");
                }
            }
        }

        // 2) split & chunk
        let clauses = split_into_clauses(text);
        let chunks = chunk_clauses(&clauses, self.max_words_per_chunk);

        // 3) call the model for each chunk, strictly in order
        let mut merged_clauses = Vec::new();
        let mut raw_responses = Vec::new();

        for chunk_text in &chunks {
            let output = self.provider.analyze_chunk(chunk_text).await;

            if let Some(err) = &output.error {
                warn!(
                    model = self.provider.model_name(),
                    error = %err,
                    "chunk analysis failed; skipping its clauses"
                );
            }

            if let Some(listed) = output.structured.get("clauses").and_then(Value::as_array) {
                for clause in listed {
                    merged_clauses.push(build_finding(clause));
                }
            }

            raw_responses.push(output);
        }

        // 4) overall risk score, normalized 0-100
        let overall_risk_score = risk::aggregate_score(&merged_clauses);

        // 5) industry tags over the full text
        let tags = detect_industries(text);

        // 6) versioning: diff against the owner's latest other document
        let diff_summary = match store::find_previous(&self.pool, &document.owner, &document.id)
            .await
        {
            Ok(Some(previous)) if !previous.text_content.trim().is_empty() => {
                Some(checksum::unified_diff(&previous.text_content, text))
            }
            Ok(_) => None,
            Err(e) => {
                warn!(owner = %document.owner, error = %e, "previous-version lookup failed");
                None
            }
        };

        let result = AnalysisResult {
            clauses: merged_clauses,
            overall_risk_score,
            tags,
            diff_summary,
            cache_hash: checksum.clone(),
            raw_responses,
            analyzed_at: Utc::now(),
        };

        // 7) persist cache (non-fatal) and attach to the document
        if let Err(e) = store::cache_upsert(&self.pool, &checksum, &result).await {
            warn!(fingerprint = %checksum, error = %e, "cache write failed");
        }

        store::save_analysis(&self.pool, &document.id, &result)
            .await
            .map_err(PipelineError::Store)?;

        Ok(result)
    }
}

/// Build a [`ClauseFinding`] from one model-reported clause object,
/// tolerating the field aliases the model is known to emit.
fn build_finding(clause: &Value) -> ClauseFinding {
    let text = clause
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or("")
        .trim()
        .to_string();

    // A present-but-null or empty "risk" falls through to "severity"
    let model_risk = ["risk", "severity"].iter().find_map(|k| {
        clause
            .get(*k)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    });

    ClauseFinding {
        risk: risk::fuse(&text, model_risk),
        explanation: first_string(clause, &["explanation", "explain"]),
        rewrite: first_string(clause, &["rewrite", "suggested_rewrite"]),
        source_llm: clause.clone(),
        text,
    }
}

fn first_string(obj: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskLevel;

    #[test]
    fn test_build_finding_aliases() {
        let clause = serde_json::json!({
            "text": "  Payment due in 30 days.  ",
            "severity": "Medium",
            "explain": "standard terms",
            "suggested_rewrite": "Payment due in 45 days."
        });
        let finding = build_finding(&clause);
        assert_eq!(finding.text, "Payment due in 30 days.");
        assert_eq!(finding.risk, RiskLevel::Medium);
        assert_eq!(finding.explanation, "standard terms");
        assert_eq!(finding.rewrite, "Payment due in 45 days.");
        assert_eq!(finding.source_llm, clause);
    }

    #[test]
    fn test_build_finding_null_risk_falls_through_to_severity() {
        let clause = serde_json::json!({
            "text": "Plain words.",
            "risk": null,
            "severity": "High"
        });
        assert_eq!(build_finding(&clause).risk, RiskLevel::High);

        let clause = serde_json::json!({
            "text": "Plain words.",
            "risk": "",
            "severity": "Medium"
        });
        assert_eq!(build_finding(&clause).risk, RiskLevel::Medium);
    }

    #[test]
    fn test_build_finding_present_risk_wins_over_severity() {
        let clause = serde_json::json!({
            "text": "Plain words.",
            "risk": "Medium",
            "severity": "High"
        });
        assert_eq!(build_finding(&clause).risk, RiskLevel::Medium);
    }

    #[test]
    fn test_build_finding_missing_fields_default() {
        let clause = serde_json::json!({ "text": "No extras here." });
        let finding = build_finding(&clause);
        assert_eq!(finding.risk, RiskLevel::Low);
        assert_eq!(finding.explanation, "");
        assert_eq!(finding.rewrite, "");
    }

    #[test]
    fn test_fingerprint_locks_reuse_entry() {
        let locks = FingerprintLocks::default();
        let a = locks.for_fingerprint("abc");
        let b = locks.for_fingerprint("abc");
        assert!(Arc::ptr_eq(&a, &b));
        let c = locks.for_fingerprint("def");
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_fingerprint_locks_prune_released_entries() {
        let locks = FingerprintLocks::default();
        let a = locks.for_fingerprint("abc");
        drop(a);
        locks.for_fingerprint("def");
        let map = locks.inner.lock().unwrap();
        assert!(!map.contains_key("abc"));
        assert!(map.contains_key("def"));
    }
}
