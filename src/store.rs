//! Collection storage abstraction.
//!
//! The [`SectionStore`] trait defines the operations the indexer and the
//! query path need from a persisted collection of (document, embedding)
//! pairs, enabling pluggable backends (SQLite, in-memory for tests).
//!
//! Upsert identity is the `(collection, section)` pair — never insertion
//! order — so re-running ingestion over an unchanged corpus leaves the
//! collection untouched.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{NormalizedDocument, ScoredSection, SectionMetadata};

/// Abstract storage backend for a named section collection.
///
/// All operations are async (via `async-trait`); in-memory implementations
/// return immediately-ready futures.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](SectionStore::upsert) | Insert or update a section, keyed by `(collection, section)` |
/// | [`content_hash`](SectionStore::content_hash) | Stored content hash for staleness detection |
/// | [`count`](SectionStore::count) | Number of sections in a collection |
/// | [`vector_search`](SectionStore::vector_search) | Cosine similarity search over stored vectors |
#[async_trait]
pub trait SectionStore: Send + Sync {
    /// Insert or update a section and its embedding.
    ///
    /// Upserting the same section twice must not create a second entry.
    async fn upsert(
        &self,
        collection: &str,
        doc: &NormalizedDocument,
        vector: &[f32],
        model: &str,
        content_hash: &str,
    ) -> Result<()>;

    /// Return the stored content hash for a section, if present.
    async fn content_hash(&self, collection: &str, section: &str) -> Result<Option<String>>;

    /// Return the number of sections stored in a collection.
    ///
    /// An absent collection counts as empty, not as an error.
    async fn count(&self, collection: &str) -> Result<i64>;

    /// Return the `limit` sections most similar to the query vector,
    /// descending by score. An absent collection yields an empty result.
    async fn vector_search(
        &self,
        collection: &str,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<ScoredSection>>;
}

struct StoredSection {
    metadata: SectionMetadata,
    content: String,
    vector: Vec<f32>,
    content_hash: String,
    _model: String,
}

/// In-memory store for tests.
///
/// Brute-force cosine similarity over all stored vectors, behind a
/// `std::sync::RwLock` keyed by `(collection, section)`.
#[derive(Default)]
pub struct MemoryStore {
    sections: RwLock<HashMap<(String, String), StoredSection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SectionStore for MemoryStore {
    async fn upsert(
        &self,
        collection: &str,
        doc: &NormalizedDocument,
        vector: &[f32],
        model: &str,
        content_hash: &str,
    ) -> Result<()> {
        let mut sections = self.sections.write().unwrap();
        sections.insert(
            (collection.to_string(), doc.metadata.section.clone()),
            StoredSection {
                metadata: doc.metadata.clone(),
                content: doc.content.clone(),
                vector: vector.to_vec(),
                content_hash: content_hash.to_string(),
                _model: model.to_string(),
            },
        );
        Ok(())
    }

    async fn content_hash(&self, collection: &str, section: &str) -> Result<Option<String>> {
        let sections = self.sections.read().unwrap();
        Ok(sections
            .get(&(collection.to_string(), section.to_string()))
            .map(|s| s.content_hash.clone()))
    }

    async fn count(&self, collection: &str) -> Result<i64> {
        let sections = self.sections.read().unwrap();
        Ok(sections.keys().filter(|(c, _)| c == collection).count() as i64)
    }

    async fn vector_search(
        &self,
        collection: &str,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<ScoredSection>> {
        let sections = self.sections.read().unwrap();
        let mut results: Vec<ScoredSection> = sections
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|(_, s)| ScoredSection {
                metadata: s.metadata.clone(),
                content: s.content.clone(),
                score: cosine_similarity(query_vec, &s.vector),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(section: &str, content: &str) -> NormalizedDocument {
        NormalizedDocument {
            content: content.to_string(),
            metadata: SectionMetadata {
                chapter: String::new(),
                chapter_title: String::new(),
                section: section.to_string(),
                section_title: format!("Title {section}"),
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_section() {
        let store = MemoryStore::new();
        store
            .upsert("c", &doc("378", "first"), &[1.0, 0.0], "m", "h1")
            .await
            .unwrap();
        store
            .upsert("c", &doc("378", "second"), &[0.0, 1.0], "m", "h2")
            .await
            .unwrap();

        assert_eq!(store.count("c").await.unwrap(), 1);
        assert_eq!(
            store.content_hash("c", "378").await.unwrap().as_deref(),
            Some("h2")
        );
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let store = MemoryStore::new();
        store
            .upsert("a", &doc("1", "x"), &[1.0], "m", "h")
            .await
            .unwrap();

        assert_eq!(store.count("a").await.unwrap(), 1);
        assert_eq!(store.count("b").await.unwrap(), 0);
        assert!(store.content_hash("b", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_vector_search_orders_by_similarity() {
        let store = MemoryStore::new();
        store
            .upsert("c", &doc("1", "east"), &[1.0, 0.0], "m", "h")
            .await
            .unwrap();
        store
            .upsert("c", &doc("2", "north"), &[0.0, 1.0], "m", "h")
            .await
            .unwrap();
        store
            .upsert("c", &doc("3", "northeast"), &[0.7, 0.7], "m", "h")
            .await
            .unwrap();

        let results = store.vector_search("c", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].metadata.section, "1");
        assert_eq!(results[1].metadata.section, "3");
    }

    #[tokio::test]
    async fn test_absent_collection_yields_empty() {
        let store = MemoryStore::new();
        let results = store.vector_search("nope", &[1.0], 5).await.unwrap();
        assert!(results.is_empty());
    }
}
