use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table the outline store uses. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Thought index, keyed by value fingerprint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS thoughts (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            contexts_json TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER NOT NULL,
            last_updated INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Context index, keyed by context fingerprint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contexts (
            key TEXT PRIMARY KEY,
            context_json TEXT NOT NULL,
            children_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recently_edited (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            tree_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS context_views (
            key TEXT PRIMARY KEY,
            setting TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Navigation history
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            url TEXT NOT NULL,
            path_json TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_thoughts_last_updated ON thoughts(last_updated DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
