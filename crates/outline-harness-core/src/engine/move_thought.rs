//! Relocating a thought and its whole subtree.
//!
//! # Algorithm
//!
//! 1. Resolve the source occurrence, reject cycles, resolve the destination.
//! 2. Move the thought's own occurrence from `(old_context, old_rank)` to
//!    `new_context`. If the destination already holds the same value (and
//!    it is not a same-context reorder) the move merges onto that rank.
//! 3. Walk the subtree of the input snapshot with an explicit stack,
//!    collecting one edit per descendant. Every descendant context is the
//!    old one with the `old_path` prefix swapped for the new prefix.
//!    Children landing in a context that already has children in the input
//!    snapshot are appended after them in their original order; children
//!    landing in a fresh context keep their ranks.
//! 4. Apply every removal, then every placement, and write the context
//!    rewrites as one batch, pruning empty entries.
//! 5. Carry the view setting, relocate the recently-edited node (best
//!    effort), move the cursor if it was on the moved occurrence, bump the
//!    version.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{ContextEdits, Engine, ThoughtEdits};
use crate::effects::{Effect, SyncBatch, Transition};
use crate::hash::hash_context;
use crate::index::OutlineRead;
use crate::models::{Context, Path, Rank, Step};
use crate::rank::next_rank_from;
use crate::state::State;

/// Rejected move. The input snapshot is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("no thought at {path}")]
    NotFound { path: String },
    #[error("destination context {context} does not exist")]
    InvalidDestination { context: String },
    #[error("cannot move {from} into its own subtree at {to}")]
    CyclicMove { from: String, to: String },
    #[error("rank {rank} is not a finite number")]
    InvalidRank { rank: String },
}

impl MoveError {
    /// Every move error aborts the whole transition; there is no partial
    /// result to keep.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            MoveError::NotFound { .. }
                | MoveError::InvalidDestination { .. }
                | MoveError::CyclicMove { .. }
                | MoveError::InvalidRank { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveRequest {
    pub old_path: Path,
    /// Destination; its trailing rank is the requested rank. The moved
    /// value always comes from `old_path`.
    pub new_path: Path,
    /// Cursor offset to apply when the moved thought is being edited.
    pub offset: Option<usize>,
}

impl MoveRequest {
    pub fn new(old_path: Path, new_path: Path) -> Self {
        Self {
            old_path,
            new_path,
            offset: None,
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

struct Frame {
    old: Context,
    new: Context,
}

/// One descendant moving from `old` to `new`, read off the input snapshot.
struct DescendantEdit {
    old: Context,
    new: Context,
    value: String,
    rank: Rank,
}

impl Engine {
    /// Move the thought at `req.old_path` (and its subtree) to `req.new_path`.
    pub fn move_thought(&self, state: &State, req: &MoveRequest) -> Result<Transition, MoveError> {
        let now = Utc::now();
        let old_path = state.canonicalize(&req.old_path);
        let new_path = state.canonicalize(&req.new_path);

        let (old_head, new_head) = match (old_path.head(), new_path.head()) {
            (Some(o), Some(n)) => (o.clone(), n.clone()),
            (None, _) => {
                return Err(MoveError::NotFound {
                    path: old_path.to_string(),
                })
            }
            (_, None) => {
                return Err(MoveError::InvalidDestination {
                    context: new_path.to_string(),
                })
            }
        };
        if !new_head.rank.is_finite() {
            return Err(MoveError::InvalidRank {
                rank: new_head.rank.to_string(),
            });
        }
        let value = old_head.value.clone();
        let old_rank = old_head.rank;
        let old_context = old_path.parent_context();
        let new_context = new_path.parent_context();
        let old_thoughts = old_context.child(&value);
        let new_thoughts = new_context.child(&value);
        let same_context = old_context == new_context;

        let located = state
            .context_index
            .get(&old_context)
            .and_then(|e| e.find(&value, old_rank))
            .is_some();
        let Some(thought) = state.thought_index.get(&value).filter(|_| located) else {
            return Err(MoveError::NotFound {
                path: old_path.to_string(),
            });
        };

        if new_context.starts_with(&old_thoughts) {
            return Err(MoveError::CyclicMove {
                from: old_path.to_string(),
                to: new_path.to_string(),
            });
        }
        if !state.context_exists(&new_context) {
            return Err(MoveError::InvalidDestination {
                context: new_context.to_string(),
            });
        }

        let mut thoughts = ThoughtEdits::new(&state.thought_index);
        let mut contexts = ContextEdits::new(&state.context_index);

        // the moved thought
        let moved = thoughts.get_mut(&thought.value, now);
        moved.remove_occurrence(&old_context, old_rank);
        let rank = moved.add_occurrence(new_context.clone(), new_head.rank);
        moved.dedup_contexts();
        moved.last_updated = now;

        contexts.remove(&old_context, &value, old_rank);
        contexts.place(&new_context, &value, rank, now);

        let new_path = new_path.parent().child(Step::new(value.clone(), rank));

        // descendants; a same-context reorder leaves their value-based contexts unchanged
        let edits = if same_context {
            Vec::new()
        } else {
            self.descendant_edits(state, &old_thoughts, &new_thoughts)
        };
        let rewritten = edits.len();

        // All removals land before any placement: with a value repeated
        // along its own ancestry, one edit's destination can be another's source.
        for edit in &edits {
            let record = thoughts.get_mut(&edit.value, now);
            record.leave(&edit.old);
            contexts.remove_value(&edit.old, &edit.value);
        }
        for edit in &edits {
            let record = thoughts.get_mut(&edit.value, now);
            let rank = record.add_occurrence(edit.new.clone(), edit.rank);
            record.dedup_contexts();
            record.last_updated = now;
            contexts.place(&edit.new, &edit.value, rank, now);
        }

        let mut next = state.clone();
        let thought_delta = thoughts.apply(&mut next.thought_index);
        let context_delta = contexts.apply(&mut next.context_index);

        // view settings follow the parent context
        let mut view_delta = std::collections::HashMap::new();
        let old_key = hash_context(&old_context);
        let new_key = hash_context(&new_context);
        if state.context_views.get(&old_key) != state.context_views.get(&new_key) {
            match next.context_views.remove(&old_key) {
                Some(setting) => {
                    next.context_views.insert(new_key.clone(), setting);
                    view_delta.insert(new_key, Some(setting));
                }
                None => {
                    next.context_views.remove(&new_key);
                    view_delta.insert(new_key, None);
                }
            }
            view_delta.insert(old_key, None);
        }

        match self
            .relocator
            .relocate(&state.recently_edited, &old_path, &new_path)
        {
            Ok(mut tree) => {
                // merged children were re-ranked; leaf paths follow the new snapshot
                let index = &next.thought_index;
                tree.rerank(&new_path, |context, value| {
                    index.get(value).and_then(|t| t.rank_in(context))
                });
                next.recently_edited = tree;
            }
            Err(e) => warn!(
                error = %e,
                from = %old_path,
                to = %new_path,
                "recently-edited update failed; keeping previous tree"
            ),
        }

        let editing = state.is_editing(&old_path) || state.is_editing(&req.old_path);
        if editing {
            next.cursor = Some(new_path.clone());
            next.cursor_before_edit = Some(new_path.clone());
            next.cursor_offset = req.offset;
        }

        next.version = state.version + 1;

        debug!(
            from = %old_path,
            to = %new_path,
            rank = %rank,
            merged = rank != new_head.rank,
            descendants = rewritten,
            version = next.version,
            "moved thought"
        );

        let mut effects = vec![Effect::Persist(SyncBatch {
            version: next.version,
            thoughts: thought_delta,
            contexts: context_delta,
            context_views: view_delta,
            recently_edited: next.recently_edited.clone(),
        })];
        if editing {
            effects.push(Effect::Navigate {
                path: new_path.clone(),
                replace: true,
            });
        }

        Ok(Transition {
            state: next,
            path: new_path,
            effects,
        })
    }
}

impl Engine {
    /// Every descendant of `old_root`, paired with its context under
    /// `new_root`. Children landing in a context that already has children
    /// in `state` are appended after them in their original order; children
    /// landing in a fresh context keep their ranks.
    fn descendant_edits(
        &self,
        state: &State,
        old_root: &Context,
        new_root: &Context,
    ) -> Vec<DescendantEdit> {
        let mut edits = Vec::new();
        let mut stack = vec![Frame {
            old: old_root.clone(),
            new: new_root.clone(),
        }];
        while let Some(frame) = stack.pop() {
            let children = state.context_index.children(&frame.old);
            if children.is_empty() {
                continue;
            }
            let append_after = state
                .context_index
                .get(&frame.new)
                .map(|_| next_rank_from(&frame.new, &state.context_index, self.base_rank));

            for (i, child) in children.iter().enumerate() {
                stack.push(Frame {
                    old: frame.old.child(&child.value),
                    new: frame.new.child(&child.value),
                });
                edits.push(DescendantEdit {
                    old: frame.old.clone(),
                    new: frame.new.clone(),
                    value: child.value.clone(),
                    rank: append_after.map(|r| r.offset(i)).unwrap_or(child.rank),
                });
            }
        }
        edits
    }
}

/// Move with the default [`Engine`].
pub fn move_thought(state: &State, req: &MoveRequest) -> Result<Transition, MoveError> {
    Engine::new().move_thought(state, req)
}
