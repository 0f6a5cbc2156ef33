//! Embedding indexer: corpus → normalized documents → embedded collection.
//!
//! Coordinates the full ingestion flow: load the corpus file, normalize
//! records, embed changed documents in batches, and upsert everything into
//! the named collection keyed by section identifier. Documents whose stored
//! content hash matches the current content skip the embedding call.
//!
//! Ingestion failures are fatal and abort the run; there is no retry on
//! this path.

use anyhow::Result;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::corpus::{self, CorpusError};
use crate::embedding::{self, Embedder};
use crate::models::NormalizedDocument;
use crate::normalize;
use crate::sqlite_store::{self, SqliteStore};
use crate::store::SectionStore;

/// Errors raised while building the index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("embedding failed")]
    Embedding(#[source] anyhow::Error),

    #[error("failed to write to collection store")]
    StoreWrite(#[source] anyhow::Error),
}

/// Counters reported by an ingestion run.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestReport {
    /// Documents considered (records with a non-empty section identifier).
    pub documents: usize,
    /// Documents embedded and upserted this run.
    pub embedded: usize,
    /// Documents skipped because their stored content hash matched.
    pub unchanged: usize,
}

/// Embed and upsert a document sequence into the named collection.
///
/// Core of the indexer, independent of config and SQLite so tests can
/// drive it with in-memory fakes.
pub async fn index_documents(
    docs: &[NormalizedDocument],
    embedder: &dyn Embedder,
    store: &dyn SectionStore,
    collection: &str,
    batch_size: usize,
) -> Result<IngestReport, IndexError> {
    let mut report = IngestReport {
        documents: docs.len(),
        ..Default::default()
    };

    // Staleness check: only documents whose content changed get re-embedded.
    let mut pending: Vec<(&NormalizedDocument, String)> = Vec::new();
    for doc in docs {
        let hash = hash_content(&doc.content);
        let stored = store
            .content_hash(collection, &doc.metadata.section)
            .await
            .map_err(IndexError::StoreWrite)?;

        if stored.as_deref() == Some(hash.as_str()) {
            report.unchanged += 1;
        } else {
            pending.push((doc, hash));
        }
    }

    let batch = batch_size.max(1);
    for chunk in pending.chunks(batch) {
        let texts: Vec<String> = chunk.iter().map(|(d, _)| d.content.clone()).collect();
        let vectors = embedder
            .embed(&texts)
            .await
            .map_err(IndexError::Embedding)?;

        for ((doc, hash), vector) in chunk.iter().zip(vectors.iter()) {
            store
                .upsert(collection, doc, vector, embedder.model_name(), hash)
                .await
                .map_err(IndexError::StoreWrite)?;
            report.embedded += 1;
        }
    }

    Ok(report)
}

/// Run the `ingest` command: build the index from the configured corpus.
pub async fn run_ingest(config: &Config, dry_run: bool, limit: Option<usize>) -> Result<()> {
    let records = corpus::load_corpus(&config.corpus.path)?;
    let mut docs = normalize::normalize_records(&records);

    if let Some(lim) = limit {
        docs.truncate(lim);
    }

    let collection = &config.index.collection;

    if dry_run {
        println!("ingest {} (dry-run)", collection);
        println!("  corpus records: {}", records.len());
        println!("  documents: {}", docs.len());
        return Ok(());
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let pool = sqlite_store::connect(&config.db.path).await?;
    let store = SqliteStore::new(pool.clone());

    let report = index_documents(
        &docs,
        embedder.as_ref(),
        &store,
        collection,
        config.embedding.batch_size,
    )
    .await?;

    let total = store.count(collection).await?;

    println!("ingest {}", collection);
    println!("  corpus records: {}", records.len());
    println!("  documents: {}", report.documents);
    println!("  embedded: {}", report.embedded);
    println!("  unchanged: {}", report.unchanged);
    println!("  collection size: {}", total);
    println!("ok");

    pool.close().await;
    Ok(())
}

pub(crate) fn hash_content(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
