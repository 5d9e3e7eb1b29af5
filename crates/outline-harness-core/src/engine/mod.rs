//! State transitions over the outline.
//!
//! The [`Engine`] owns the pieces of policy a transition needs (the rank
//! baseline and the recently-edited relocator) and exposes the two
//! transitions: [`Engine::move_thought`] and [`Engine::insert`]. Both are
//! synchronous and pure: they read an input [`State`](crate::state::State)
//! and return a new one plus deferred effects, or an error and no change.

mod insert;
mod move_thought;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::hash::{hash_context, hash_value, ContextKey, ValueKey};
use crate::index::{ContextIndex, ThoughtIndex};
use crate::models::{Child, Context, ContextEntry, Path, Rank, Thought};
use crate::rank::BASE_RANK;
use crate::recent::{RecentlyEdited, RecentlyEditedError};

pub use insert::InsertError;
pub use move_thought::{move_thought, MoveError, MoveRequest};

/// Capability used to relocate a node of the recently-edited tree.
///
/// Failures are advisory: the engine logs them and keeps the previous tree.
pub trait RecentlyEditedRelocator: Send + Sync {
    fn relocate(
        &self,
        tree: &RecentlyEdited,
        old: &Path,
        new: &Path,
    ) -> Result<RecentlyEdited, RecentlyEditedError>;
}

/// Default relocator: [`RecentlyEdited::relocate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeRelocator;

impl RecentlyEditedRelocator for TreeRelocator {
    fn relocate(
        &self,
        tree: &RecentlyEdited,
        old: &Path,
        new: &Path,
    ) -> Result<RecentlyEdited, RecentlyEditedError> {
        tree.relocate(old, new)
    }
}

pub struct Engine {
    base_rank: Rank,
    relocator: Box<dyn RecentlyEditedRelocator>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            base_rank: BASE_RANK,
            relocator: Box::new(TreeRelocator),
        }
    }

    /// Rank given to the first child of an empty context.
    pub fn with_base_rank(mut self, base_rank: Rank) -> Self {
        self.base_rank = base_rank;
        self
    }

    pub fn with_relocator(mut self, relocator: Box<dyn RecentlyEditedRelocator>) -> Self {
        self.relocator = relocator;
        self
    }

    pub fn base_rank(&self) -> Rank {
        self.base_rank
    }
}

/// Thought records touched by a transition, copied on first write.
struct ThoughtEdits<'a> {
    base: &'a ThoughtIndex,
    touched: HashMap<ValueKey, Thought>,
}

impl<'a> ThoughtEdits<'a> {
    fn new(base: &'a ThoughtIndex) -> Self {
        Self {
            base,
            touched: HashMap::new(),
        }
    }

    /// Working copy of the record for `value`, created if the value is new.
    fn get_mut(&mut self, value: &str, now: DateTime<Utc>) -> &mut Thought {
        let base = self.base;
        self.touched.entry(hash_value(value)).or_insert_with(|| {
            base.get(value)
                .cloned()
                .unwrap_or_else(|| Thought::new(value, now))
        })
    }

    fn apply(self, index: &mut ThoughtIndex) -> HashMap<ValueKey, Thought> {
        for thought in self.touched.values() {
            index.insert(thought.clone());
        }
        self.touched
    }
}

/// Pending context-entry rewrites, copied on first write and applied as
/// one batch.
struct ContextEdits<'a> {
    base: &'a ContextIndex,
    pending: HashMap<ContextKey, ContextEntry>,
}

impl<'a> ContextEdits<'a> {
    fn new(base: &'a ContextIndex) -> Self {
        Self {
            base,
            pending: HashMap::new(),
        }
    }

    fn entry(&mut self, context: &Context) -> &mut ContextEntry {
        let base = self.base;
        self.pending.entry(hash_context(context)).or_insert_with(|| {
            base.get(context)
                .cloned()
                .unwrap_or_else(|| ContextEntry::new(context.clone(), Vec::new()))
        })
    }

    /// Drop the child `{value, rank}` from `context`.
    fn remove(&mut self, context: &Context, value: &str, rank: Rank) {
        self.entry(context)
            .children
            .retain(|c| !(c.value == value && c.rank == rank));
    }

    /// Drop every child named `value` from `context`.
    fn remove_value(&mut self, context: &Context, value: &str) {
        self.entry(context).children.retain(|c| c.value != value);
    }

    /// Make `value` appear exactly once in `context`, at `rank`.
    fn place(&mut self, context: &Context, value: &str, rank: Rank, now: DateTime<Utc>) {
        let entry = self.entry(context);
        entry.children.retain(|c| c.value != value);
        entry.children.push(Child::new(value, rank, now));
    }

    /// Write every pending entry into `index`, pruning empty ones.
    ///
    /// Returns the delta: `Some(entry)` for rewritten entries, `None` for
    /// pruned ones.
    fn apply(self, index: &mut ContextIndex) -> HashMap<ContextKey, Option<ContextEntry>> {
        let mut delta = HashMap::with_capacity(self.pending.len());
        for (key, mut entry) in self.pending {
            if entry.is_empty() {
                index.remove(&key);
                delta.insert(key, None);
            } else {
                entry.children.sort_by(|a, b| a.rank.cmp(&b.rank));
                index.put(entry.clone());
                delta.insert(key, Some(entry));
            }
        }
        delta
    }
}
