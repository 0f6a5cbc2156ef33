//! Collection statistics overview.
//!
//! Provides a quick summary of what's indexed: section count, embedding
//! model breakdown, and database size. Used by `stx stats` to give
//! confidence that ingestion is working as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::sqlite_store;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = sqlite_store::connect(&config.db.path).await?;
    let collection = &config.index.collection;

    let total_sections: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sections WHERE collection = ?")
            .bind(collection)
            .fetch_one(&pool)
            .await?;

    let last_indexed: Option<i64> =
        sqlx::query_scalar("SELECT MAX(indexed_at) FROM sections WHERE collection = ?")
            .bind(collection)
            .fetch_one(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Statute Harness — Collection Stats");
    println!("==================================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Collection:   {}", collection);
    println!("  Sections:     {}", total_sections);
    println!(
        "  Last indexed: {}",
        match last_indexed {
            Some(ts) => format_ts_relative(ts),
            None => "never".to_string(),
        }
    );

    // Per-model breakdown
    let model_rows = sqlx::query(
        r#"
        SELECT model, dims, COUNT(*) AS section_count
        FROM sections
        WHERE collection = ?
        GROUP BY model, dims
        ORDER BY section_count DESC
        "#,
    )
    .bind(collection)
    .fetch_all(&pool)
    .await?;

    if !model_rows.is_empty() {
        println!();
        println!("  By model:");
        println!("  {:<32} {:>6} {:>10}", "MODEL", "DIMS", "SECTIONS");
        println!("  {}", "-".repeat(52));
        for row in &model_rows {
            let model: String = row.get("model");
            let dims: i64 = row.get("dims");
            let count: i64 = row.get("section_count");
            println!("  {:<32} {:>6} {:>10}", model, dims, count);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let delta = now - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
