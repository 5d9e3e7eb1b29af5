//! Database statistics overview.
//!
//! Summarizes what the outline store holds: thought and context counts,
//! the widest contexts, navigation history size and when the outline was
//! last edited. Used by `olh stats`.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct WideContext {
    context: String,
    children: i64,
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_thoughts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM thoughts")
        .fetch_one(&pool)
        .await?;

    let total_contexts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM contexts")
        .fetch_one(&pool)
        .await?;

    let total_history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM history")
        .fetch_one(&pool)
        .await?;

    let version: Option<String> =
        sqlx::query_scalar("SELECT value FROM meta WHERE key = 'version'")
            .fetch_optional(&pool)
            .await?;

    let last_edit_ms: Option<i64> = sqlx::query_scalar("SELECT MAX(last_updated) FROM thoughts")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Outline Harness — Database Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Version:     {}", version.as_deref().unwrap_or("0"));
    println!();
    println!("  Thoughts:    {}", total_thoughts);
    println!("  Contexts:    {}", total_contexts);
    println!("  History:     {}", total_history);
    println!(
        "  Last edit:   {}",
        match last_edit_ms {
            Some(ms) => format_ts_relative(ms / 1000),
            None => "never".to_string(),
        }
    );

    let rows = sqlx::query(
        r#"
        SELECT context_json, json_array_length(children_json) AS children
        FROM contexts
        ORDER BY children DESC
        LIMIT 5
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let wide: Vec<WideContext> = rows
        .iter()
        .map(|row| {
            let json: String = row.get("context_json");
            let values: Vec<String> = serde_json::from_str(&json).unwrap_or_default();
            WideContext {
                context: if values.is_empty() {
                    "/".to_string()
                } else {
                    values.join("/")
                },
                children: row.get("children"),
            }
        })
        .collect();

    if !wide.is_empty() {
        println!();
        println!("  Widest contexts:");
        println!("  {:<48} {:>8}", "CONTEXT", "CHILDREN");
        println!("  {}", "-".repeat(58));
        for w in &wide {
            println!("  {:<48} {:>8}", w.context, w.children);
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
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
