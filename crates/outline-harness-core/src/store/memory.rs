//! In-memory [`Persistence`] and [`Navigation`] for testing.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! [`InMemoryPersistence::fail_next`] makes the next applies fail so callers
//! can exercise their retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::effects::SyncBatch;
use crate::hash::{ContextKey, ValueKey};
use crate::models::{ContextEntry, Path, Thought};
use crate::recent::RecentlyEdited;
use crate::state::{State, ViewSetting};

use super::{Navigation, Persistence};

#[derive(Default)]
struct Stored {
    thoughts: HashMap<ValueKey, Thought>,
    contexts: HashMap<ContextKey, ContextEntry>,
    context_views: HashMap<ContextKey, ViewSetting>,
    recently_edited: RecentlyEdited,
    version: u64,
}

/// In-memory store for tests.
pub struct InMemoryPersistence {
    stored: RwLock<Stored>,
    applied: AtomicUsize,
    failures: AtomicUsize,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            stored: RwLock::new(Stored::default()),
            applied: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` calls to [`Persistence::apply`] fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Number of batches applied successfully.
    pub fn applied(&self) -> usize {
        self.applied.load(Ordering::SeqCst)
    }

    pub fn version(&self) -> Result<u64> {
        Ok(self.read()?.version)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Stored>> {
        self.stored
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Stored>> {
        self.stored
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn apply(&self, batch: &SyncBatch) -> Result<()> {
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            bail!("injected persistence failure");
        }

        let mut stored = self.write()?;
        for (key, thought) in &batch.thoughts {
            stored.thoughts.insert(key.clone(), thought.clone());
        }
        for (key, entry) in &batch.contexts {
            match entry {
                Some(entry) => {
                    stored.contexts.insert(key.clone(), entry.clone());
                }
                None => {
                    stored.contexts.remove(key);
                }
            }
        }
        for (key, setting) in &batch.context_views {
            match setting {
                Some(setting) => {
                    stored.context_views.insert(key.clone(), *setting);
                }
                None => {
                    stored.context_views.remove(key);
                }
            }
        }
        stored.recently_edited = batch.recently_edited.clone();
        stored.version = stored.version.max(batch.version);
        drop(stored);

        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_state(&self) -> Result<State> {
        let stored = self.read()?;
        let mut state = State::new();
        for thought in stored.thoughts.values() {
            state.thought_index.insert(thought.clone());
        }
        for entry in stored.contexts.values() {
            state.context_index.put(entry.clone());
        }
        state.context_views = stored.context_views.clone();
        state.recently_edited = stored.recently_edited.clone();
        state.version = stored.version;
        Ok(state)
    }
}

/// [`Navigation`] that records every call.
#[derive(Default)]
pub struct RecordingNavigation {
    calls: RwLock<Vec<(Path, bool)>>,
}

impl RecordingNavigation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(Path, bool)> {
        self.calls
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Navigation for RecordingNavigation {
    async fn navigate(&self, path: &Path, replace: bool) -> Result<()> {
        self.calls
            .write()
            .map_err(|_| anyhow!("navigation log lock poisoned"))?
            .push((path.clone(), replace));
        Ok(())
    }
}
