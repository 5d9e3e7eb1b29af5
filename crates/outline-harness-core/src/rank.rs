//! Rank allocation for appending children.
//!
//! Allocation does not reserve anything: two allocations against the same
//! snapshot return the same rank. Always allocate from the snapshot the
//! child will be inserted into.

use crate::index::ContextIndex;
use crate::models::{Context, Rank};

/// Rank used for the first child of an empty context.
pub const BASE_RANK: Rank = Rank(0.0);

/// Rank strictly greater than every current child of `context`, or
/// [`BASE_RANK`] when the context has no children.
pub fn next_rank(context: &Context, index: &ContextIndex) -> Rank {
    next_rank_from(context, index, BASE_RANK)
}

/// Like [`next_rank`] with a caller-chosen baseline for empty contexts.
pub fn next_rank_from(context: &Context, index: &ContextIndex, base: Rank) -> Rank {
    match index.get(context).and_then(|e| e.max_rank()) {
        Some(max) => Rank(max.value().floor() + 1.0),
        None => base,
    }
}
