//! SQLite-backed navigation history.
//!
//! Every navigation records the path in two forms: a URL with each value
//! percent-encoded as one path segment (for display and export), and the
//! exact ranked path as JSON. The newest row is where the cursor sits.

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use url::Url;

use outline_harness_core::store::Navigation;
use outline_harness_core::Path;

const URL_BASE: &str = "olh:///";

/// URL form of `path`, e.g. `olh:///Fruits/Red%20Apple`.
pub fn path_to_url(path: &Path) -> Result<Url> {
    let mut url = Url::parse(URL_BASE)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("{} cannot carry path segments", URL_BASE))?
        .clear()
        .extend(path.steps().iter().map(|s| s.value.as_str()));
    Ok(url)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: i64,
    pub url: String,
    pub path: Path,
    pub created_at: i64,
}

pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent entry, if any navigation happened yet.
    pub async fn latest(&self) -> Result<Option<HistoryEntry>> {
        let row = sqlx::query(
            "SELECT id, url, path_json, created_at FROM history ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let path_json: String = row.get("path_json");
                let path: Path =
                    serde_json::from_str(&path_json).context("Corrupt history entry")?;
                Ok(Some(HistoryEntry {
                    id: row.get("id"),
                    url: row.get("url"),
                    path,
                    created_at: row.get("created_at"),
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn len(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM history")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl Navigation for SqliteHistory {
    async fn navigate(&self, path: &Path, replace: bool) -> Result<()> {
        let url = path_to_url(path)?;
        let path_json = serde_json::to_string(path)?;
        let now = chrono::Utc::now().timestamp();

        if replace {
            let updated = sqlx::query(
                r#"
                UPDATE history SET url = ?, path_json = ?, created_at = ?
                WHERE id = (SELECT MAX(id) FROM history)
                "#,
            )
            .bind(url.as_str())
            .bind(&path_json)
            .bind(now)
            .execute(&self.pool)
            .await?;
            if updated.rows_affected() > 0 {
                return Ok(());
            }
        }

        sqlx::query("INSERT INTO history (url, path_json, created_at) VALUES (?, ?, ?)")
            .bind(url.as_str())
            .bind(&path_json)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
