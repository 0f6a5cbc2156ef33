//! Core data models used throughout Statute Harness.
//!
//! These types represent the statute records, normalized documents, and
//! search results that flow through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Raw statute entry as it appears in the corpus file.
///
/// Legal-code exports in the wild key the section identifier as `Section`;
/// the alias accepts both spellings. Chapter fields are optional — not every
/// corpus carries chapter groupings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecord {
    #[serde(alias = "Section")]
    pub section: String,
    pub section_title: String,
    pub section_desc: String,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub chapter_title: Option<String>,
}

/// Metadata stored alongside a normalized section.
///
/// Field order is the serialization order. Absent source fields are
/// represented as empty strings rather than options so every indexed row
/// has the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub chapter: String,
    pub chapter_title: String,
    pub section: String,
    pub section_title: String,
}

/// Canonical text + metadata form of a section, prepared for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub content: String,
    pub metadata: SectionMetadata,
}

/// A search result returned from semantic retrieval.
#[derive(Debug, Clone)]
pub struct ScoredSection {
    pub metadata: SectionMetadata,
    pub content: String,
    /// Cosine similarity against the query vector, in `[-1.0, 1.0]`.
    pub score: f32,
}
