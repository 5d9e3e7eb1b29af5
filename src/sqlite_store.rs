//! SQLite-backed [`Persistence`] implementation.
//!
//! Each delta in a [`SyncBatch`] becomes an upsert keyed by fingerprint, or
//! a delete for pruned context entries and cleared view settings. A batch
//! is written in one transaction.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::warn;

use outline_harness_core::hash::ContextKey;
use outline_harness_core::models::{Child, Context, ContextEntry, Occurrence, Thought};
use outline_harness_core::recent::RecentlyEdited;
use outline_harness_core::store::Persistence;
use outline_harness_core::{State, SyncBatch, ViewSetting};

const VERSION_KEY: &str = "version";

/// SQLite implementation of the [`Persistence`] trait.
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Version of the latest batch written.
    pub async fn version(&self) -> Result<u64> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?")
            .bind(VERSION_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn apply(&self, batch: &SyncBatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (key, thought) in &batch.thoughts {
            let contexts_json = serde_json::to_string(&thought.contexts)?;
            sqlx::query(
                r#"
                INSERT INTO thoughts (key, value, contexts_json, created_at, last_updated)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    contexts_json = excluded.contexts_json,
                    last_updated = excluded.last_updated
                "#,
            )
            .bind(key.as_str())
            .bind(&thought.value)
            .bind(&contexts_json)
            .bind(thought.created.timestamp_millis())
            .bind(thought.last_updated.timestamp_millis())
            .execute(&mut *tx)
            .await?;
        }

        for (key, entry) in &batch.contexts {
            match entry {
                Some(entry) => {
                    sqlx::query(
                        r#"
                        INSERT INTO contexts (key, context_json, children_json)
                        VALUES (?, ?, ?)
                        ON CONFLICT(key) DO UPDATE SET
                            context_json = excluded.context_json,
                            children_json = excluded.children_json
                        "#,
                    )
                    .bind(key.as_str())
                    .bind(serde_json::to_string(&entry.context)?)
                    .bind(serde_json::to_string(&entry.children)?)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM contexts WHERE key = ?")
                        .bind(key.as_str())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        for (key, setting) in &batch.context_views {
            match setting {
                Some(setting) => {
                    sqlx::query(
                        r#"
                        INSERT INTO context_views (key, setting) VALUES (?, ?)
                        ON CONFLICT(key) DO UPDATE SET setting = excluded.setting
                        "#,
                    )
                    .bind(key.as_str())
                    .bind(setting.as_str())
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM context_views WHERE key = ?")
                        .bind(key.as_str())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        sqlx::query(
            r#"
            INSERT INTO recently_edited (id, tree_json) VALUES (1, ?)
            ON CONFLICT(id) DO UPDATE SET tree_json = excluded.tree_json
            "#,
        )
        .bind(serde_json::to_string(&batch.recently_edited)?)
        .execute(&mut *tx)
        .await?;

        // never step the stored version backwards
        sqlx::query(
            r#"
            INSERT INTO meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            WHERE CAST(excluded.value AS INTEGER) > CAST(meta.value AS INTEGER)
            "#,
        )
        .bind(VERSION_KEY)
        .bind(batch.version.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_state(&self) -> Result<State> {
        let mut state = State::new();

        let rows = sqlx::query(
            "SELECT key, value, contexts_json, created_at, last_updated FROM thoughts",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &rows {
            let value: String = row.get("value");
            let contexts_json: String = row.get("contexts_json");
            let contexts: Vec<Occurrence> = serde_json::from_str(&contexts_json)
                .with_context(|| format!("Corrupt contexts for thought {:?}", value))?;
            state.thought_index.insert(Thought {
                value,
                contexts,
                created: from_millis(row.get("created_at")),
                last_updated: from_millis(row.get("last_updated")),
            });
        }

        let rows = sqlx::query("SELECT key, context_json, children_json FROM contexts")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let key: String = row.get("key");
            let context_json: String = row.get("context_json");
            let children_json: String = row.get("children_json");
            let context: Context = serde_json::from_str(&context_json)
                .with_context(|| format!("Corrupt context entry {}", key))?;
            let children: Vec<Child> = serde_json::from_str(&children_json)
                .with_context(|| format!("Corrupt children for context {}", key))?;
            state.context_index.put(ContextEntry::new(context, children));
        }

        let rows = sqlx::query("SELECT key, setting FROM context_views")
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let key: String = row.get("key");
            let setting: String = row.get("setting");
            match ViewSetting::parse(&setting) {
                Some(view) => {
                    state.context_views.insert(ContextKey::from_raw(key), view);
                }
                None => warn!(key = %key, setting = %setting, "skipping unknown view setting"),
            }
        }

        let tree_json: Option<String> =
            sqlx::query_scalar("SELECT tree_json FROM recently_edited WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        if let Some(json) = tree_json {
            state.recently_edited = serde_json::from_str::<RecentlyEdited>(&json)
                .context("Corrupt recently-edited tree")?;
        }

        state.version = self.version().await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use outline_harness_core::consistency::is_consistent;
    use outline_harness_core::hash::hash_context;
    use outline_harness_core::{Engine, MoveRequest, OutlineRead, Path};
    use tempfile::TempDir;

    async fn open(tmp: &TempDir) -> SqlitePersistence {
        let mut cfg = Config::minimal();
        cfg.db.path = tmp.path().join("data").join("outline.sqlite");
        let pool = db::connect(&cfg).await.unwrap();
        migrate::migrate_pool(&pool).await.unwrap();
        SqlitePersistence::new(pool)
    }

    fn shape(state: &State) -> Vec<(String, Vec<(String, f64)>)> {
        let mut out: Vec<_> = state
            .context_index
            .iter()
            .map(|(_, e)| {
                (
                    e.context.to_string(),
                    e.children
                        .iter()
                        .map(|c| (c.value.clone(), c.rank.value()))
                        .collect(),
                )
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    #[tokio::test]
    async fn test_batches_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let engine = Engine::new();

        let mut state = State::new();
        for (parent, value) in [
            (vec![], "Fruits"),
            (vec!["Fruits"], "Apple"),
            (vec!["Fruits", "Apple"], "Red"),
            (vec![], "Produce"),
        ] {
            let parent = state.resolve(&parent).unwrap();
            let t = engine.insert(&state, &parent, value, None).unwrap();
            store.apply(t.persist_batch().unwrap()).await.unwrap();
            state = t.state;
        }
        state
            .context_views
            .insert(hash_context(&Context::new(["Fruits"])), ViewSetting::Table);
        store.apply(&SyncBatch::full(&state)).await.unwrap();

        let apple = state.resolve(&["Fruits", "Apple"]).unwrap();
        let dest = state
            .resolve(&["Produce"])
            .unwrap()
            .child(apple.head().unwrap().clone());
        let t = engine
            .move_thought(&state, &MoveRequest::new(apple, dest))
            .unwrap();
        store.apply(t.persist_batch().unwrap()).await.unwrap();

        let loaded = store.load_state().await.unwrap();
        assert!(is_consistent(&loaded));
        assert_eq!(shape(&loaded), shape(&t.state));
        assert_eq!(loaded.version, t.state.version);
        assert_eq!(loaded.context_views, t.state.context_views);
        assert!(loaded
            .context_index
            .get(&Context::new(["Fruits"]))
            .is_none());
        assert_eq!(loaded.recently_edited.len(), t.state.recently_edited.len());
    }

    #[tokio::test]
    async fn test_version_never_decreases() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let newer = SyncBatch {
            version: 7,
            ..SyncBatch::default()
        };
        let older = SyncBatch {
            version: 3,
            ..SyncBatch::default()
        };
        store.apply(&newer).await.unwrap();
        store.apply(&older).await.unwrap();
        assert_eq!(store.version().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_empty_store_loads_empty_state() {
        let tmp = TempDir::new().unwrap();
        let store = open(&tmp).await;
        let state = store.load_state().await.unwrap();
        assert!(state.thought_index.is_empty());
        assert_eq!(state.version, 0);
        assert!(state.resolve(&[]).unwrap() == Path::default());
    }
}
