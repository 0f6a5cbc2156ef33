//! The question-answering entry point.
//!
//! Wires the production pipeline to the retry controller and maps every
//! terminal outcome to a printed report. Rate-limit exhaustion and fatal
//! pipeline failures are reported, not raised: the caller always gets a
//! terminal outcome rather than an unhandled fault.

use anyhow::Result;

use crate::config::Config;
use crate::embedding;
use crate::pipeline::{AssistantPipeline, PipelineFailure, ReasoningPipeline};
use crate::retry::{Outcome, RetryController, RetryPolicy};
use crate::sqlite_store::{self, SqliteStore};

/// Answer a question, or `None` on any terminal failure.
///
/// Library form of the query entry point: drives the pipeline through the
/// controller and keeps only the answer.
pub async fn answer(
    controller: &RetryController,
    pipeline: &dyn ReasoningPipeline,
    question: &str,
) -> Option<String> {
    match controller.run(pipeline, question).await {
        Outcome::Answered(text) => Some(text),
        _ => None,
    }
}

/// Run the `ask` command.
pub async fn run_ask(config: &Config, question: &str) -> Result<()> {
    let embedder = embedding::create_embedder(&config.embedding)?;
    let pool = sqlite_store::connect(&config.db.path).await?;
    let store = SqliteStore::new(pool.clone());

    let pipeline = AssistantPipeline::new(
        config.assistant.clone(),
        config.index.collection.clone(),
        Box::new(store),
        embedder,
    )?;
    let controller = RetryController::new(RetryPolicy::from_config(&config.retry));

    match controller.run(&pipeline, question).await {
        Outcome::Answered(text) => {
            println!("{}", text);
        }
        Outcome::RetriesExhausted { attempts } => {
            eprintln!(
                "No answer after {} attempts — the provider is rate limiting. Wait a while and rerun.",
                attempts
            );
        }
        Outcome::Fatal(PipelineFailure::ConfigurationMissing { key }) => {
            eprintln!("Missing configuration: {} is not set.", key);
            eprintln!("Make sure your environment includes all required keys.");
        }
        Outcome::Fatal(failure) => {
            eprintln!("Error: {}", failure);
        }
        Outcome::Cancelled => {
            eprintln!("Cancelled.");
        }
    }

    pool.close().await;
    Ok(())
}
