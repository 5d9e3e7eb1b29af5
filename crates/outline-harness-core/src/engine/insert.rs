use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{ContextEdits, Engine, ThoughtEdits};
use crate::effects::{Effect, SyncBatch, Transition};
use crate::index::OutlineRead;
use crate::models::{Path, Rank, Step};
use crate::rank::next_rank_from;
use crate::state::State;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    #[error("thought value is empty")]
    EmptyValue,
    #[error("parent {path} does not exist")]
    InvalidParent { path: String },
    #[error("rank {rank} is not a finite number")]
    InvalidRank { rank: String },
}

impl Engine {
    /// Add `value` as a child of `parent`.
    ///
    /// Thought and context entries are created on first use. If the parent
    /// already has a child with the same value, the insert merges onto it
    /// and only refreshes timestamps. Without an explicit `rank` the child
    /// is appended after its current siblings.
    pub fn insert(
        &self,
        state: &State,
        parent: &Path,
        value: &str,
        rank: Option<Rank>,
    ) -> Result<Transition, InsertError> {
        let now = Utc::now();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(InsertError::EmptyValue);
        }
        if let Some(rank) = rank.filter(|r| !r.is_finite()) {
            return Err(InsertError::InvalidRank {
                rank: rank.to_string(),
            });
        }
        let parent = state.canonicalize(parent);
        let context = parent.to_context();
        if !state.context_exists(&context) {
            return Err(InsertError::InvalidParent {
                path: parent.to_string(),
            });
        }
        let value = state
            .thought_index
            .canonical(trimmed)
            .unwrap_or(trimmed)
            .to_string();

        let requested = rank.unwrap_or_else(|| {
            next_rank_from(&context, &state.context_index, self.base_rank)
        });

        let mut thoughts = ThoughtEdits::new(&state.thought_index);
        let mut contexts = ContextEdits::new(&state.context_index);

        let record = thoughts.get_mut(&value, now);
        let rank = record.add_occurrence(context.clone(), requested);
        record.dedup_contexts();
        record.last_updated = now;
        contexts.place(&context, &value, rank, now);

        let path = parent.child(Step::new(value.clone(), rank));

        let mut next = state.clone();
        let thought_delta = thoughts.apply(&mut next.thought_index);
        let context_delta = contexts.apply(&mut next.context_index);
        if let Err(e) = next.recently_edited.touch(&path, now) {
            warn!(error = %e, path = %path, "recently-edited update failed");
        }
        next.version = state.version + 1;

        debug!(path = %path, rank = %rank, version = next.version, "inserted thought");

        let effects = vec![Effect::Persist(SyncBatch {
            version: next.version,
            thoughts: thought_delta,
            contexts: context_delta,
            context_views: Default::default(),
            recently_edited: next.recently_edited.clone(),
        })];

        Ok(Transition {
            state: next,
            path,
            effects,
        })
    }
}
