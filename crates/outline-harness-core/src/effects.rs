//! Deferred side effects emitted alongside a new snapshot.
//!
//! A transition is pure: it returns the next [`State`] and a list of
//! [`Effect`]s describing what the outside world should be told. Effects
//! are consumed after the snapshot is committed and their failure never
//! affects it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hash::{ContextKey, ValueKey};
use crate::models::{ContextEntry, Path, Thought};
use crate::recent::RecentlyEdited;
use crate::state::{State, ViewSetting};

/// Index deltas produced by one transition, keyed by fingerprint.
///
/// A `None` context entry means the entry was pruned; a `None` view setting
/// means the setting was cleared. Applying the same batch twice is
/// harmless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub version: u64,
    pub thoughts: HashMap<ValueKey, Thought>,
    pub contexts: HashMap<ContextKey, Option<ContextEntry>>,
    pub context_views: HashMap<ContextKey, Option<ViewSetting>>,
    pub recently_edited: RecentlyEdited,
}

impl SyncBatch {
    /// A batch carrying every thought and context in `state`, used to
    /// seed a fresh store.
    pub fn full(state: &State) -> Self {
        Self {
            version: state.version,
            thoughts: state
                .thought_index
                .iter()
                .map(|(k, t)| (k.clone(), t.clone()))
                .collect(),
            contexts: state
                .context_index
                .iter()
                .map(|(k, e)| (k.clone(), Some(e.clone())))
                .collect(),
            context_views: state
                .context_views
                .iter()
                .map(|(k, v)| (k.clone(), Some(*v)))
                .collect(),
            recently_edited: state.recently_edited.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty() && self.contexts.is_empty() && self.context_views.is_empty()
    }

    /// Fold a batch produced after this one into it. Later deltas replace
    /// earlier ones for the same key.
    pub fn absorb(&mut self, later: SyncBatch) {
        self.version = self.version.max(later.version);
        self.thoughts.extend(later.thoughts);
        self.contexts.extend(later.contexts);
        self.context_views.extend(later.context_views);
        self.recently_edited = later.recently_edited;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Merge the deltas into the durable store.
    Persist(SyncBatch),
    /// Update the address/history display to `path`.
    Navigate { path: Path, replace: bool },
}

/// Result of a successful transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: State,
    /// Path of the thought the transition acted on, in the new snapshot.
    pub path: Path,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn persist_batch(&self) -> Option<&SyncBatch> {
        self.effects.iter().find_map(|e| match e {
            Effect::Persist(batch) => Some(batch),
            _ => None,
        })
    }

    pub fn navigation(&self) -> Option<&Path> {
        self.effects.iter().find_map(|e| match e {
            Effect::Navigate { path, .. } => Some(path),
            _ => None,
        })
    }
}
