use anyhow::Result;

use crate::config::Config;
use crate::sqlite_store;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = sqlite_store::connect(&config.db.path).await?;

    // Create sections table. Identity is (collection, section) so repeated
    // ingestion runs update rows in place instead of appending duplicates.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sections (
            collection TEXT NOT NULL,
            section TEXT NOT NULL,
            section_title TEXT NOT NULL,
            chapter TEXT NOT NULL DEFAULT '',
            chapter_title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            indexed_at INTEGER NOT NULL,
            PRIMARY KEY (collection, section)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sections_collection ON sections(collection)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
