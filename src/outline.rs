//! Outline commands: `add`, `show`, `move`, `cursor`, `recent`, `check` and
//! `import`.
//!
//! Every command opens a [`Session`]: the snapshot is rebuilt from SQLite,
//! the cursor is restored from the newest history entry, and a sync worker
//! is started to carry out the effects of whatever transitions the command
//! runs. Closing the session waits for the worker to drain.

use std::path::Path as FsPath;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::debug;

use outline_harness_core::consistency::inconsistencies;
use outline_harness_core::rank::next_rank_from;
use outline_harness_core::store::Persistence;
use outline_harness_core::{
    Effect, Engine, MoveRequest, OutlineRead, Path, Rank, State, Step, Transition,
};

use crate::config::Config;
use crate::db;
use crate::history::SqliteHistory;
use crate::import::{import_lines, parse_outline, render_outline};
use crate::sqlite_store::SqlitePersistence;
use crate::sync::{SyncHandle, SyncStats, SyncWorker};

/// Split an `A/B/C` argument into values. `/` and the empty string name
/// the root.
pub fn split_path_arg(arg: &str) -> Vec<&str> {
    arg.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `path` names an occurrence present in `state`.
fn occurs(state: &State, path: &Path) -> bool {
    match path.head() {
        Some(head) => state
            .context_index
            .get(&path.parent_context())
            .and_then(|e| e.find(&head.value, head.rank))
            .is_some(),
        None => false,
    }
}

pub struct Session {
    pub state: State,
    engine: Engine,
    pool: SqlitePool,
    handle: SyncHandle,
    worker: JoinHandle<SyncStats>,
}

impl Session {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        let store = Arc::new(SqlitePersistence::new(pool.clone()));
        let history = Arc::new(SqliteHistory::new(pool.clone()));

        let mut state = store
            .load_state()
            .await
            .context("Failed to load outline (has `olh init` been run?)")?;
        if let Some(entry) = history.latest().await? {
            if occurs(&state, &entry.path) {
                state = state.with_cursor(entry.path);
            } else {
                debug!(url = %entry.url, "latest history entry no longer exists");
            }
        }

        let (handle, worker) = SyncWorker::new(store, history, &config.sync).spawn();
        let engine = Engine::new().with_base_rank(Rank(config.outline.base_rank));

        Ok(Self {
            state,
            engine,
            pool,
            handle,
            worker,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Adopt the transition's snapshot and queue its effects.
    pub fn commit(&mut self, transition: Transition) -> Result<Path> {
        self.adopt(transition.state, transition.effects)?;
        Ok(transition.path)
    }

    pub fn adopt(&mut self, state: State, effects: Vec<Effect>) -> Result<()> {
        self.handle.dispatch(effects)?;
        self.state = state;
        Ok(())
    }

    pub fn resolve_arg(&self, arg: &str) -> Result<Path> {
        let values = split_path_arg(arg);
        self.state
            .resolve(&values)
            .ok_or_else(|| anyhow!("No thought at '{}'", arg))
    }

    /// Wait for every queued effect, then stop the worker.
    pub async fn close(self) -> Result<SyncStats> {
        let Session {
            handle,
            worker,
            pool,
            ..
        } = self;
        handle.flush().await?;
        drop(handle);
        let stats = worker.await?;
        pool.close().await;
        if stats.dropped > 0 {
            bail!("{} change batch(es) could not be saved", stats.dropped);
        }
        Ok(stats)
    }
}

pub async fn run_add(config: &Config, parent: &str, value: &str, rank: Option<f64>) -> Result<()> {
    let mut session = Session::open(config).await?;
    let parent = session.resolve_arg(parent)?;
    let t = session
        .engine()
        .insert(&session.state, &parent, value, rank.map(Rank))?;
    let path = session.commit(t)?;
    session.close().await?;
    println!("added {}", path);
    Ok(())
}

pub async fn run_show(config: &Config, path: Option<&str>) -> Result<()> {
    let session = Session::open(config).await?;
    let path = session.resolve_arg(path.unwrap_or("/"))?;
    let rendered = render_outline(&session.state, &path);
    if rendered.is_empty() {
        println!("(empty)");
    } else {
        print!("{}", rendered);
    }
    session.close().await?;
    Ok(())
}

/// Move the thought at `old` under `new_parent`.
///
/// Without `rank`, a reorder keeps its rank and a move to another context
/// appends after the destination's children. An unknown destination is
/// passed through so the engine reports it.
pub async fn run_move(
    config: &Config,
    old: &str,
    new_parent: &str,
    rank: Option<f64>,
    offset: Option<usize>,
) -> Result<()> {
    let mut session = Session::open(config).await?;
    let old_path = session.resolve_arg(old)?;
    let head = old_path
        .head()
        .cloned()
        .ok_or_else(|| anyhow!("Cannot move the root"))?;

    let values = split_path_arg(new_parent);
    let parent = session.state.resolve(&values).unwrap_or_else(|| {
        Path::new(values.iter().map(|v| Step::new(*v, 0i64)).collect())
    });
    let rank = match rank {
        Some(r) => Rank(r),
        None if parent.to_context() == old_path.parent_context() => head.rank,
        None => next_rank_from(
            &parent.to_context(),
            &session.state.context_index,
            session.engine().base_rank(),
        ),
    };

    let mut req = MoveRequest::new(old_path.clone(), parent.child(Step::new(head.value, rank)));
    if let Some(offset) = offset {
        req = req.with_offset(offset);
    }
    let t = session.engine().move_thought(&session.state, &req)?;
    let path = session.commit(t)?;
    session.close().await?;
    println!("moved {} -> {}", old_path, path);
    Ok(())
}

pub async fn run_cursor(config: &Config, path: Option<&str>) -> Result<()> {
    let mut session = Session::open(config).await?;
    match path {
        Some(arg) => {
            let path = session.resolve_arg(arg)?;
            if path.is_empty() {
                bail!("The cursor cannot be placed on the root");
            }
            session.handle.dispatch(vec![Effect::Navigate {
                path: path.clone(),
                replace: false,
            }])?;
            session.state = session.state.clone().with_cursor(path.clone());
            println!("cursor at {}", path);
        }
        None => match &session.state.cursor {
            Some(cursor) => println!("cursor at {}", cursor),
            None => println!("(no cursor)"),
        },
    }
    session.close().await?;
    Ok(())
}

pub async fn run_recent(config: &Config, limit: usize) -> Result<()> {
    let session = Session::open(config).await?;
    let leaves = session.state.recently_edited.recent(limit);
    if leaves.is_empty() {
        println!("(nothing edited yet)");
    }
    for leaf in leaves {
        println!(
            "{}  {}",
            leaf.last_updated.format("%Y-%m-%d %H:%M:%S"),
            leaf.path
        );
    }
    session.close().await?;
    Ok(())
}

pub async fn run_check(config: &Config) -> Result<()> {
    let session = Session::open(config).await?;
    let found = inconsistencies(&session.state);
    let thoughts = session.state.thought_index.len();
    let contexts = session.state.context_index.len();
    session.close().await?;

    if found.is_empty() {
        println!("ok: {} thoughts, {} contexts", thoughts, contexts);
        return Ok(());
    }
    for problem in &found {
        println!("  {}", problem);
    }
    bail!("{} inconsistencies found", found.len());
}

pub async fn run_import(config: &Config, file: &FsPath, under: Option<&str>) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read outline file: {}", file.display()))?;
    let lines = parse_outline(&text)
        .with_context(|| format!("Failed to parse outline file: {}", file.display()))?;

    let mut session = Session::open(config).await?;
    let parent = session.resolve_arg(under.unwrap_or("/"))?;
    let (state, effects) = import_lines(session.engine(), &session.state, &parent, &lines)?;
    session.adopt(state, effects)?;
    session.close().await?;
    println!("imported {} thoughts", lines.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path_arg() {
        assert!(split_path_arg("/").is_empty());
        assert!(split_path_arg("").is_empty());
        assert_eq!(split_path_arg("Fruits/Apple"), vec!["Fruits", "Apple"]);
        assert_eq!(split_path_arg("/Fruits/ Apple /"), vec!["Fruits", "Apple"]);
    }
}
