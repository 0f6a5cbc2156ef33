use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::models::ScoredSection;
use crate::sqlite_store::{self, SqliteStore};
use crate::store::SectionStore;

/// Retrieve the sections most similar to a query, descending by score.
///
/// Read-only; tolerates an absent or empty collection by returning an
/// empty result.
pub async fn retrieve(
    store: &dyn SectionStore,
    embedder: &dyn Embedder,
    collection: &str,
    query: &str,
    limit: i64,
) -> Result<Vec<ScoredSection>> {
    let query_vec = embedding::embed_query(embedder, query).await?;
    store.vector_search(collection, &query_vec, limit).await
}

pub async fn run_search(config: &Config, query: &str, limit: Option<i64>) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }

    let embedder = embedding::create_embedder(&config.embedding)?;
    let pool = sqlite_store::connect(&config.db.path).await?;
    let store = SqliteStore::new(pool.clone());

    let final_limit = limit.unwrap_or(config.assistant.top_k as i64);
    let results = retrieve(
        &store,
        embedder.as_ref(),
        &config.index.collection,
        query,
        final_limit,
    )
    .await?;

    if results.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] Section {}: {}",
            i + 1,
            r.score,
            r.metadata.section,
            r.metadata.section_title
        );
        if !r.metadata.chapter_title.is_empty() {
            println!("   chapter {} — {}", r.metadata.chapter, r.metadata.chapter_title);
        }
        println!("   {}", snippet(&r.content, 200));
    }

    pool.close().await;
    Ok(())
}

/// First `max_chars` of the section body, on a char boundary, single line.
fn snippet(content: &str, max_chars: usize) -> String {
    let body = content.replace('\n', " ");
    let trimmed = body.trim();
    let mut out: String = trimmed.chars().take(max_chars).collect();
    if trimmed.chars().count() > max_chars {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_short_text_unchanged() {
        assert_eq!(snippet("Short body.", 200), "Short body.");
    }

    #[test]
    fn test_snippet_truncates_and_flattens_newlines() {
        let s = snippet("line one\n\nline two that keeps going", 12);
        assert_eq!(s, "line one  li…");
    }
}
