//! SQLite-backed [`SectionStore`] implementation.
//!
//! Sections live in a single `sections` table with a `(collection, section)`
//! primary key; embeddings are stored inline as little-endian f32 BLOBs.
//! Vector search is brute-force cosine similarity over the collection's
//! rows, decoded in Rust.

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{NormalizedDocument, ScoredSection, SectionMetadata};
use crate::store::SectionStore;

/// Open (creating if missing) the SQLite database at `path`.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// SQLite adapter for [`SectionStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SectionStore for SqliteStore {
    async fn upsert(
        &self,
        collection: &str,
        doc: &NormalizedDocument,
        vector: &[f32],
        model: &str,
        content_hash: &str,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let blob = vec_to_blob(vector);

        sqlx::query(
            r#"
            INSERT INTO sections (collection, section, section_title, chapter, chapter_title,
                                  content, content_hash, model, dims, embedding, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(collection, section) DO UPDATE SET
                section_title = excluded.section_title,
                chapter = excluded.chapter,
                chapter_title = excluded.chapter_title,
                content = excluded.content,
                content_hash = excluded.content_hash,
                model = excluded.model,
                dims = excluded.dims,
                embedding = excluded.embedding,
                indexed_at = excluded.indexed_at
            "#,
        )
        .bind(collection)
        .bind(&doc.metadata.section)
        .bind(&doc.metadata.section_title)
        .bind(&doc.metadata.chapter)
        .bind(&doc.metadata.chapter_title)
        .bind(&doc.content)
        .bind(content_hash)
        .bind(model)
        .bind(vector.len() as i64)
        .bind(&blob)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn content_hash(&self, collection: &str, section: &str) -> Result<Option<String>> {
        let hash: Option<String> = sqlx::query_scalar(
            "SELECT content_hash FROM sections WHERE collection = ? AND section = ?",
        )
        .bind(collection)
        .bind(section)
        .fetch_optional(&self.pool)
        .await?;

        Ok(hash)
    }

    async fn count(&self, collection: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sections WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn vector_search(
        &self,
        collection: &str,
        query_vec: &[f32],
        limit: i64,
    ) -> Result<Vec<ScoredSection>> {
        let rows = sqlx::query(
            r#"
            SELECT section, section_title, chapter, chapter_title, content, embedding
            FROM sections
            WHERE collection = ?
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let mut results: Vec<ScoredSection> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                ScoredSection {
                    metadata: SectionMetadata {
                        chapter: row.get("chapter"),
                        chapter_title: row.get("chapter_title"),
                        section: row.get("section"),
                        section_title: row.get("section_title"),
                    },
                    content: row.get("content"),
                    score: cosine_similarity(query_vec, &vector),
                }
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
