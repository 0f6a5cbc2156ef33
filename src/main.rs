//! # Statute Harness CLI (`stx`)
//!
//! The `stx` binary is the primary interface for Statute Harness. It
//! provides commands for database initialization, corpus ingestion,
//! semantic search, question answering, and collection statistics.
//!
//! ## Usage
//!
//! ```bash
//! stx --config ./config/stx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `stx init` | Create the SQLite database and run schema migrations |
//! | `stx ingest` | Index the statute corpus into the collection |
//! | `stx search "<query>"` | Retrieve the most similar sections |
//! | `stx ask "<question>"` | Answer a legal question from the indexed corpus |
//! | `stx stats` | Show collection counts and database size |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! stx init --config ./config/stx.toml
//!
//! # Build the index from the configured corpus file
//! stx ingest --config ./config/stx.toml
//!
//! # Preview an ingestion run without writing anything
//! stx ingest --dry-run --config ./config/stx.toml
//!
//! # Semantic retrieval over the indexed sections
//! stx search "house broken into at night" --limit 5
//!
//! # Ask a question (retried automatically under provider rate limits)
//! stx ask "Which charges should be filed for armed burglary?"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use statute_harness::{ask, config, index, migrate, search, stats};

/// Statute Harness CLI — a statute ingestion and retrieval assistant for
/// legal question answering.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/stx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "stx",
    about = "Statute Harness — a statute ingestion and retrieval assistant for legal question answering",
    version,
    long_about = "Statute Harness ingests a structured legal-code corpus into a persisted, \
    semantically searchable collection, and answers natural-language legal questions by \
    retrieving relevant sections and feeding them to a rate-limited chat provider behind a \
    resilient retry controller."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/stx.toml`. Corpus, database, collection,
    /// embedding, assistant, and retry settings are read from this file.
    #[arg(long, global = true, default_value = "./config/stx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the sections table. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Index the statute corpus into the collection.
    ///
    /// Loads the configured corpus file, normalizes each record, embeds
    /// changed sections, and upserts them keyed by section identifier.
    /// Re-running over an unchanged corpus leaves the collection as-is.
    Ingest {
        /// Show record and document counts without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of documents to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Retrieve the sections most similar to a query.
    ///
    /// Embeds the query and ranks indexed sections by cosine similarity.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Answer a legal question from the indexed corpus.
    ///
    /// Retrieves the most relevant sections, sends them with the question
    /// to the chat provider, and retries automatically when the provider
    /// rate-limits — honoring its suggested wait when one is present.
    Ask {
        /// The question, in natural language.
        question: String,
    },

    /// Show collection counts and database size.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { dry_run, limit } => {
            index::run_ingest(&cfg, dry_run, limit).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Ask { question } => {
            ask::run_ask(&cfg, &question).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
