//! Model provider abstraction and implementations.
//!
//! Defines the [`ModelProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns error-shaped responses; used when
//!   no model is configured.
//! - **[`GeminiProvider`]** — calls the Gemini `generateContent` API with
//!   retry and backoff.
//!
//! Every provider response is normalized into one canonical
//! [`ChunkAnalysis`] before the pipeline touches it: the raw text, the
//! parsed JSON object (empty when parsing failed), and an optional error
//! message. Providers never propagate transport errors — a failed call
//! becomes an error-shaped `ChunkAnalysis` that the pipeline records and
//! skips.
//!
//! # Retry Strategy
//!
//! The Gemini provider retries transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ModelConfig;

/// Instruction template sent with every chunk. `{contract_text}` is
/// replaced with the chunk body.
pub const PROMPT_TEMPLATE: &str = "\
You are a contract analyzer.
Analyze the following text and return structured JSON with fields:
- clauses: list of {text, risk (Low/Medium/High), explanation, rewrite}
- overall_risk_score: integer (0-100)
- tags: relevant keywords

Contract Text:
{contract_text}

Return ONLY valid JSON. No markdown fences, no explanation, just JSON.";

pub fn build_prompt(chunk_text: &str) -> String {
    PROMPT_TEMPLATE.replace("{contract_text}", chunk_text)
}

/// Canonical normalized form of one per-chunk model response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    /// The model's raw text output, empty when the call itself failed.
    pub raw_response: String,
    /// Parsed JSON object, `{}` when parsing failed or the call errored.
    pub structured: Value,
    /// Error message for failed calls or unparsable output.
    pub error: Option<String>,
}

impl ChunkAnalysis {
    /// An error-shaped response for a call that produced no output.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            raw_response: String::new(),
            structured: serde_json::json!({}),
            error: Some(message.into()),
        }
    }

    /// Normalize raw model text: strip code fences, parse, and require a
    /// JSON object. Anything else is error-shaped but keeps the raw text
    /// for audit.
    pub fn from_raw(raw: String) -> Self {
        if raw.trim().is_empty() {
            return Self::failure("Model returned empty response.");
        }
        match clean_json_output(&raw) {
            Some(value) if value.is_object() => Self {
                raw_response: raw,
                structured: value,
                error: None,
            },
            _ => Self {
                raw_response: raw,
                structured: serde_json::json!({}),
                error: Some("Invalid JSON from model.".to_string()),
            },
        }
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("```[a-zA-Z]*").expect("fence pattern is valid"))
}

/// Remove markdown fence markers and safely parse JSON.
///
/// Returns `None` when the cleaned text is not valid JSON.
pub fn clean_json_output(raw: &str) -> Option<Value> {
    let cleaned = fence_re().replace_all(raw, "");
    let cleaned = cleaned.trim_matches(|c: char| c == '`' || c.is_whitespace());
    serde_json::from_str(cleaned).ok()
}

/// Trait for chunk-analysis model providers.
///
/// Infallible by contract: implementations fold every failure mode into
/// the returned [`ChunkAnalysis`] so a single bad chunk never aborts the
/// pipeline's remaining chunks.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-pro"`).
    fn model_name(&self) -> &str;

    /// Analyze one chunk of contract text.
    async fn analyze_chunk(&self, chunk_text: &str) -> ChunkAnalysis;
}

// ============ Disabled Provider ============

/// A no-op provider that reports every chunk as failed.
///
/// Used when `model.provider = "disabled"` in the configuration; lets the
/// pipeline run end-to-end (caching, tagging, diffing) with zero clauses.
pub struct DisabledProvider;

#[async_trait]
impl ModelProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn analyze_chunk(&self, _chunk_text: &str) -> ChunkAnalysis {
        ChunkAnalysis::failure("Model provider is disabled")
    }
}

// ============ Gemini Provider ============

/// Provider calling the Gemini `generateContent` endpoint.
///
/// Requires the `GEMINI_API_KEY` environment variable. The base URL is
/// configurable so tests can point it at a local fake.
pub struct GeminiProvider {
    model: String,
    base_url: String,
    timeout_secs: u64,
    max_retries: u32,
}

impl GeminiProvider {
    /// Create a new Gemini provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `model` is not set in config or
    /// `GEMINI_API_KEY` is not in the environment.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("model.model required for Gemini provider"))?;

        if std::env::var("GEMINI_API_KEY").is_err() {
            bail!("GEMINI_API_KEY environment variable not set");
        }

        Ok(Self {
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }

    /// One full prompt round-trip with retry/backoff.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(&url)
                .header("x-goog-api-key", &api_key)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response.json().await?;
                        return extract_response_text(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Gemini API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Gemini API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Model call failed after retries")))
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn analyze_chunk(&self, chunk_text: &str) -> ChunkAnalysis {
        let prompt = build_prompt(chunk_text);
        match self.generate(&prompt).await {
            Ok(raw) => ChunkAnalysis::from_raw(raw),
            Err(e) => ChunkAnalysis::failure(e.to_string()),
        }
    }
}

/// Pull the generated text out of a `generateContent` response:
/// `candidates[0].content.parts[*].text`, concatenated.
fn extract_response_text(json: &Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        bail!("Model returned empty response.");
    }

    Ok(text)
}

/// Create the appropriate [`ModelProvider`] based on configuration.
pub fn create_provider(config: &ModelConfig) -> Result<Box<dyn ModelProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "gemini" => Ok(Box::new(GeminiProvider::new(config)?)),
        other => bail!("Unknown model provider: {}", other),
    }
}
