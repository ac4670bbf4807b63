//! # Contract Lens
//!
//! A contract risk-analysis pipeline backed by an external LLM.
//!
//! Contract Lens ingests contract documents with extracted plain text,
//! segments them into clauses, batches clauses under a word budget, asks
//! an external model for per-clause findings, then layers deterministic
//! heuristics on top: keyword-based risk escalation, a normalized overall
//! risk score, industry tagging, and a unified diff against the owner's
//! previous document. Results are cached by content fingerprint so
//! identical text is never analyzed twice.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────────┐   ┌──────────┐
//! │ Document │──▶│  Pipeline                      │──▶│  SQLite   │
//! │  (text)  │   │ segment → chunk → model call  │   │ docs +    │
//! └──────────┘   │ → fuse → score → tag → diff   │   │ cache     │
//!                └──────────────┬────────────────┘   └──────────┘
//!                               ▼
//!                        ┌────────────┐
//!                        │ Gemini API │
//!                        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! clens init                              # create database
//! clens add contract.txt --owner alice    # ingest + auto-analyze
//! clens analyze <id> --owner alice --force
//! clens show <id> --owner alice
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`checksum`] | Text fingerprint and version diff |
//! | [`segment`] | Clause boundary detection |
//! | [`chunk`] | Word-budget clause batching |
//! | [`risk`] | Keyword risk fusion and score aggregation |
//! | [`tagger`] | Industry tagging |
//! | [`model`] | Model provider abstraction (Gemini) |
//! | [`store`] | Document store and analysis cache |
//! | [`pipeline`] | Orchestrator |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod checksum;
pub mod chunk;
pub mod config;
pub mod db;
pub mod migrate;
pub mod model;
pub mod models;
pub mod pipeline;
pub mod risk;
pub mod segment;
pub mod store;
pub mod tagger;
