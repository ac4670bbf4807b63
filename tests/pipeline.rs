//! End-to-end pipeline tests against a temporary SQLite database and a
//! scripted model provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tempfile::TempDir;

use contract_lens::checksum::fingerprint;
use contract_lens::config::{AnalysisConfig, Config, DbConfig, ModelConfig};
use contract_lens::model::{ChunkAnalysis, ModelProvider};
use contract_lens::models::RiskLevel;
use contract_lens::pipeline::{Pipeline, PipelineError};
use contract_lens::{db, migrate, store};

/// Provider that replays canned raw responses in call order and counts
/// invocations.
struct ScriptedProvider {
    responses: Vec<String>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: responses.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn analyze_chunk(&self, _chunk_text: &str) -> ChunkAnalysis {
        let i = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.get(i) {
            Some(raw) => ChunkAnalysis::from_raw(raw.clone()),
            None => ChunkAnalysis::failure("script exhausted"),
        }
    }
}

async fn setup() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let cfg = Config {
        db: DbConfig {
            path: tmp.path().join("clens.sqlite"),
        },
        analysis: AnalysisConfig::default(),
        model: ModelConfig::default(),
    };
    let pool = db::connect(&cfg.db).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    (tmp, pool)
}

fn pipeline_with(pool: &SqlitePool, provider: Arc<ScriptedProvider>) -> Pipeline {
    pipeline_with_budget(pool, provider, AnalysisConfig::default())
}

fn pipeline_with_budget(
    pool: &SqlitePool,
    provider: Arc<ScriptedProvider>,
    analysis: AnalysisConfig,
) -> Pipeline {
    let provider: Arc<dyn ModelProvider> = provider;
    Pipeline::new(pool.clone(), provider, &analysis)
}

fn clause_response(text: &str, risk: &str) -> String {
    serde_json::json!({
        "clauses": [{
            "text": text,
            "risk": risk,
            "explanation": "model rationale",
            "rewrite": ""
        }]
    })
    .to_string()
}

#[tokio::test]
async fn empty_text_is_fatal_and_mutates_nothing() {
    let (_tmp, pool) = setup().await;
    let provider = ScriptedProvider::new(&[]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc = store::insert_document(&pool, "alice", None, "   \n  ").await.unwrap();

    let err = pipeline.run(&doc, false).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptyContent));
    assert_eq!(err.code(), "empty_text");
    assert_eq!(provider.call_count(), 0);

    let reloaded = store::get_document(&pool, &doc.id, "alice").await.unwrap().unwrap();
    assert!(reloaded.analysis.is_none());
}

#[tokio::test]
async fn keyword_override_escalates_model_low_to_high() {
    let (_tmp, pool) = setup().await;
    let text = "Section 1. This agreement may be terminated at will.";
    let provider = ScriptedProvider::new(&[&clause_response(
        "This agreement may be terminated at will.",
        "Low",
    )]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc = store::insert_document(&pool, "alice", Some("nda.txt"), text).await.unwrap();
    let result = pipeline.run(&doc, false).await.unwrap();

    assert_eq!(provider.call_count(), 1);
    assert_eq!(result.clauses.len(), 1);
    assert_eq!(result.clauses[0].risk, RiskLevel::High);
    assert_eq!(result.overall_risk_score, 100);
    assert_eq!(result.tags, vec!["General".to_string()]);
    assert_eq!(result.cache_hash, fingerprint(text));
    assert!(result.diff_summary.is_none());
    assert_eq!(result.raw_responses.len(), 1);
    assert!(result.raw_responses[0].error.is_none());

    // attached to the document and written through to the cache
    let reloaded = store::get_document(&pool, &doc.id, "alice").await.unwrap().unwrap();
    assert!(reloaded.analysis.is_some());
    let cached = store::cache_lookup(&pool, &result.cache_hash).await.unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn second_run_is_a_cache_hit() {
    let (_tmp, pool) = setup().await;
    let text = "1. Plain obligations.\n2. More plain obligations.";
    let response = clause_response("Plain obligations.", "Low");
    let provider = ScriptedProvider::new(&[&response, &response]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc = store::insert_document(&pool, "alice", None, text).await.unwrap();

    let first = pipeline.run(&doc, false).await.unwrap();
    assert_eq!(provider.call_count(), 1);

    let second = pipeline.run(&doc, false).await.unwrap();
    assert_eq!(provider.call_count(), 1, "cache hit must not call the model");

    // identical result, analyzed_at included
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn force_reanalyze_bypasses_cache() {
    let (_tmp, pool) = setup().await;
    let response = clause_response("Body.", "Low");
    let provider = ScriptedProvider::new(&[&response, &response]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc = store::insert_document(&pool, "alice", None, "Body.").await.unwrap();

    pipeline.run(&doc, false).await.unwrap();
    assert_eq!(provider.call_count(), 1);

    pipeline.run(&doc, true).await.unwrap();
    assert_eq!(provider.call_count(), 2);

    // still exactly one cache row for the fingerprint
    let cached = store::cache_lookup(&pool, &fingerprint("Body.")).await.unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn corrupt_cache_row_is_recomputed_and_repaired() {
    let (_tmp, pool) = setup().await;
    let text = "Ordinary obligations, nothing risky.";
    let hash = fingerprint(text);

    sqlx::query("INSERT INTO analysis_cache (file_hash, result_json, created_at) VALUES (?, ?, ?)")
        .bind(&hash)
        .bind("{ not json")
        .bind(chrono::Utc::now().timestamp())
        .execute(&pool)
        .await
        .unwrap();
    assert!(store::cache_lookup(&pool, &hash).await.is_err());

    let provider = ScriptedProvider::new(&[&clause_response(text, "Low")]);
    let pipeline = pipeline_with(&pool, provider.clone());
    let doc = store::insert_document(&pool, "alice", None, text).await.unwrap();

    let result = pipeline.run(&doc, false).await.unwrap();
    assert_eq!(provider.call_count(), 1, "unreadable cache entry must fall back to a fresh run");
    assert_eq!(result.cache_hash, hash);

    // the fresh result overwrote the broken row
    let repaired = store::cache_lookup(&pool, &hash).await.unwrap();
    assert!(repaired.is_some());
}

#[tokio::test]
async fn identical_text_shares_cache_across_documents() {
    let (_tmp, pool) = setup().await;
    let text = "Shared contract body with no risk terms.";
    let provider = ScriptedProvider::new(&[&clause_response(text, "Low")]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc1 = store::insert_document(&pool, "alice", None, text).await.unwrap();
    let first = pipeline.run(&doc1, false).await.unwrap();
    assert_eq!(provider.call_count(), 1);

    let doc2 = store::insert_document(&pool, "bob", None, text).await.unwrap();
    let second = pipeline.run(&doc2, false).await.unwrap();
    assert_eq!(provider.call_count(), 1, "same text must reuse the cached result");
    assert_eq!(first.cache_hash, second.cache_hash);

    let reloaded = store::get_document(&pool, &doc2.id, "bob").await.unwrap().unwrap();
    assert!(reloaded.analysis.is_some());
}

#[tokio::test]
async fn malformed_response_is_skipped_but_retained() {
    let (_tmp, pool) = setup().await;
    let provider = ScriptedProvider::new(&["The model refuses to emit JSON here."]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc = store::insert_document(&pool, "alice", None, "Some contract text.").await.unwrap();
    let result = pipeline.run(&doc, false).await.unwrap();

    assert!(result.clauses.is_empty());
    assert_eq!(result.overall_risk_score, 0);
    assert_eq!(result.raw_responses.len(), 1);
    assert!(result.raw_responses[0].error.is_some());
    assert_eq!(
        result.raw_responses[0].raw_response,
        "The model refuses to emit JSON here."
    );

    // best-effort result is still attached to the document
    let reloaded = store::get_document(&pool, &doc.id, "alice").await.unwrap().unwrap();
    assert!(reloaded.analysis.is_some());
}

#[tokio::test]
async fn one_bad_chunk_does_not_abort_the_rest() {
    let (_tmp, pool) = setup().await;
    // Two clauses of three words each with a two-word budget: two chunks.
    let text = "1. alpha beta gamma\n2. delta epsilon zeta";
    let provider = ScriptedProvider::new(&[
        "garbage that will not parse",
        &clause_response("delta epsilon zeta", "Medium"),
    ]);
    let pipeline = pipeline_with_budget(
        &pool,
        provider.clone(),
        AnalysisConfig {
            max_words_per_chunk: 3,
        },
    );

    let doc = store::insert_document(&pool, "alice", None, text).await.unwrap();
    let result = pipeline.run(&doc, false).await.unwrap();

    assert_eq!(provider.call_count(), 2);
    assert_eq!(result.raw_responses.len(), 2);
    assert!(result.raw_responses[0].error.is_some());
    assert!(result.raw_responses[1].error.is_none());
    assert_eq!(result.clauses.len(), 1);
    assert_eq!(result.clauses[0].text, "delta epsilon zeta");
    assert_eq!(result.clauses[0].risk, RiskLevel::Medium);
}

#[tokio::test]
async fn clause_order_follows_chunk_order() {
    let (_tmp, pool) = setup().await;
    let text = "1. first clause words here\n2. second clause words here";
    let provider = ScriptedProvider::new(&[
        &clause_response("first clause words here", "Low"),
        &clause_response("second clause words here", "Low"),
    ]);
    let pipeline = pipeline_with_budget(
        &pool,
        provider.clone(),
        AnalysisConfig {
            max_words_per_chunk: 4,
        },
    );

    let doc = store::insert_document(&pool, "alice", None, text).await.unwrap();
    let result = pipeline.run(&doc, false).await.unwrap();

    assert_eq!(provider.call_count(), 2);
    let texts: Vec<&str> = result.clauses.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first clause words here", "second clause words here"]);
}

#[tokio::test]
async fn diff_present_for_second_document_of_same_owner() {
    let (_tmp, pool) = setup().await;
    let old_text = "1. Term of one year.\n2. Payment net 30.";
    let new_text = "1. Term of two years.\n2. Payment net 30.";
    let provider = ScriptedProvider::new(&[
        &clause_response("Term of one year.", "Low"),
        &clause_response("Term of two years.", "Low"),
    ]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc1 = store::insert_document(&pool, "alice", Some("v1.txt"), old_text).await.unwrap();
    let first = pipeline.run(&doc1, false).await.unwrap();
    assert!(first.diff_summary.is_none());

    let doc2 = store::insert_document(&pool, "alice", Some("v2.txt"), new_text).await.unwrap();
    let second = pipeline.run(&doc2, false).await.unwrap();

    let diff = second.diff_summary.expect("previous document exists, diff expected");
    assert!(diff.contains("-1. Term of one year."));
    assert!(diff.contains("+1. Term of two years."));
}

#[tokio::test]
async fn industry_tags_from_full_text() {
    let (_tmp, pool) = setup().await;
    let text = "Business associate shall follow HIPAA when handling patient records.";
    let provider = ScriptedProvider::new(&[&clause_response(text, "Low")]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc = store::insert_document(&pool, "clinic", None, text).await.unwrap();
    let result = pipeline.run(&doc, false).await.unwrap();

    assert!(result.tags.contains(&"Healthcare".to_string()));
    assert!(!result.tags.contains(&"General".to_string()));
}

#[tokio::test]
async fn concurrent_identical_text_calls_model_once() {
    let (_tmp, pool) = setup().await;
    let text = "Concurrent analysis of the very same contract text.";
    let response = clause_response(text, "Low");
    let provider = ScriptedProvider::new(&[&response, &response]);
    let pipeline = pipeline_with(&pool, provider.clone());

    let doc1 = store::insert_document(&pool, "alice", None, text).await.unwrap();
    let doc2 = store::insert_document(&pool, "alice", None, text).await.unwrap();

    let (r1, r2) = tokio::join!(pipeline.run(&doc1, false), pipeline.run(&doc2, false));
    let r1 = r1.unwrap();
    let r2 = r2.unwrap();

    assert_eq!(
        provider.call_count(),
        1,
        "second concurrent run must wait and reuse the first's cache entry"
    );
    assert_eq!(r1.cache_hash, r2.cache_hash);
}
