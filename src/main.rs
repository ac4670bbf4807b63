//! # Contract Lens CLI (`clens`)
//!
//! The `clens` binary is the primary interface for Contract Lens. It
//! provides commands for database initialization, document ingestion with
//! automatic analysis, explicit reanalysis, and result inspection.
//!
//! ## Usage
//!
//! ```bash
//! clens --config ./config/clens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `clens init` | Create the SQLite database and run schema migrations |
//! | `clens add <file>` | Ingest a plain-text contract and analyze it |
//! | `clens analyze <id>` | Re-run the pipeline for a stored document |
//! | `clens show <id>` | Print a document and its stored analysis |
//! | `clens cache` | List analysis cache entries |

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use contract_lens::config::{self, Config};
use contract_lens::model::create_provider;
use contract_lens::models::{AnalysisResult, Document};
use contract_lens::pipeline::{Pipeline, PipelineError};
use contract_lens::{db, migrate, store};

/// Contract Lens CLI — clause-level contract risk analysis with a
/// content-addressed result cache.
#[derive(Parser)]
#[command(
    name = "clens",
    about = "Contract Lens — LLM-backed contract risk analysis pipeline",
    version,
    long_about = "Contract Lens segments contract text into clauses, batches them under a word \
    budget, asks an external model for per-clause risk findings, fuses them with keyword \
    heuristics, tags industries, diffs against the owner's previous document, and caches the \
    structured result by content fingerprint."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/clens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents and
    /// analysis_cache tables. Idempotent.
    Init,

    /// Ingest a plain-text contract file and run the analysis pipeline.
    ///
    /// The file must be UTF-8 text; binary formats are not extracted here.
    Add {
        /// Path to the contract text file.
        file: PathBuf,

        /// Owner reference the document is stored under.
        #[arg(long)]
        owner: String,

        /// Display title; defaults to the file name.
        #[arg(long)]
        title: Option<String>,
    },

    /// Re-run the analysis pipeline for a stored document.
    Analyze {
        /// Document UUID.
        id: String,

        /// Owner reference the document is stored under.
        #[arg(long)]
        owner: String,

        /// Skip the cache and call the model even for known text.
        #[arg(long)]
        force: bool,
    },

    /// Print a document and its stored analysis.
    Show {
        /// Document UUID.
        id: String,

        /// Owner reference the document is stored under.
        #[arg(long)]
        owner: String,
    },

    /// List analysis cache entries, newest first.
    Cache,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Add { file, owner, title } => {
            let text = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
            let title = title.or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            });

            let pool = db::connect(&cfg.db).await?;
            let document =
                store::insert_document(&pool, &owner, title.as_deref(), &text).await?;
            println!("document: {}", document.id);

            run_pipeline(&cfg, pool, &document, false).await?;
        }
        Commands::Analyze { id, owner, force } => {
            let pool = db::connect(&cfg.db).await?;
            let document = match store::get_document(&pool, &id, &owner).await? {
                Some(doc) => doc,
                None => {
                    eprintln!("Error: document not found: {}", id);
                    std::process::exit(1);
                }
            };

            run_pipeline(&cfg, pool, &document, force).await?;
        }
        Commands::Show { id, owner } => {
            let pool = db::connect(&cfg.db).await?;
            let document = match store::get_document(&pool, &id, &owner).await? {
                Some(doc) => doc,
                None => {
                    eprintln!("Error: document not found: {}", id);
                    std::process::exit(1);
                }
            };
            pool.close().await;

            print_document(&document);
        }
        Commands::Cache => {
            let pool = db::connect(&cfg.db).await?;
            let entries = store::list_cache_entries(&pool).await?;
            pool.close().await;

            println!("--- Analysis Cache ({}) ---", entries.len());
            for (hash, created_at) in entries {
                println!("{}  {}", &hash[..12.min(hash.len())], format_ts_iso(created_at));
            }
        }
    }

    Ok(())
}

/// Build the configured provider, run the pipeline, and print the result.
async fn run_pipeline(
    cfg: &Config,
    pool: sqlx::SqlitePool,
    document: &Document,
    force: bool,
) -> anyhow::Result<()> {
    let provider: Arc<dyn contract_lens::model::ModelProvider> =
        Arc::from(create_provider(&cfg.model)?);
    let pipeline = Pipeline::new(pool, provider, &cfg.analysis);

    match pipeline.run(document, force).await {
        Ok(result) => {
            print_analysis(&result);
            Ok(())
        }
        Err(e @ PipelineError::EmptyContent) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn print_document(document: &Document) {
    println!("--- Document ---");
    println!("id:          {}", document.id);
    println!("owner:       {}", document.owner);
    println!(
        "title:       {}",
        document.title.as_deref().unwrap_or("(untitled)")
    );
    println!(
        "uploaded_at: {}",
        document.uploaded_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!();

    match &document.analysis {
        Some(result) => print_analysis(result),
        None => println!("(no analysis stored)"),
    }
}

fn print_analysis(result: &AnalysisResult) {
    println!("--- Analysis ---");
    println!("overall_risk_score: {}", result.overall_risk_score);
    println!("tags:               {}", result.tags.join(", "));
    println!("cache_hash:         {}", result.cache_hash);
    println!(
        "analyzed_at:        {}",
        result.analyzed_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    println!(
        "diff_summary:       {}",
        match &result.diff_summary {
            Some(d) if d.is_empty() => "(identical to previous)".to_string(),
            Some(d) => format!("{} lines", d.lines().count()),
            None => "(no previous document)".to_string(),
        }
    );
    println!();

    println!("--- Clauses ({}) ---", result.clauses.len());
    for (i, clause) in result.clauses.iter().enumerate() {
        println!("[{}] risk: {}", i, clause.risk);
        println!("{}", clause.text);
        if !clause.explanation.is_empty() {
            println!("explanation: {}", clause.explanation);
        }
        if !clause.rewrite.is_empty() {
            println!("rewrite: {}", clause.rewrite);
        }
        println!();
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
