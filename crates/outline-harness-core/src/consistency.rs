//! Cross-check of the thought and context indices.
//!
//! Every occurrence listed on a thought must appear as a child row in the
//! context index, and every child row must be listed on its thought. The
//! checker also rejects stored empty entries, repeated occurrences and keys
//! that do not match their contents.

use std::collections::HashSet;

use thiserror::Error;

use crate::hash::{hash_context, hash_value};
use crate::index::OutlineRead;
use crate::models::Rank;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Inconsistency {
    #[error("thought {value:?} lists {context} at rank {rank} but the context has no such child")]
    MissingChild {
        value: String,
        context: String,
        rank: Rank,
    },
    #[error("context {context} has child {value:?} at rank {rank} but the thought does not list it")]
    MissingOccurrence {
        value: String,
        context: String,
        rank: Rank,
    },
    #[error("context {context} is stored with no children")]
    EmptyContext { context: String },
    #[error("thought {value:?} lists {context} more than once")]
    DuplicateOccurrence { value: String, context: String },
    #[error("context {context} has child {value:?} more than once")]
    DuplicateChild { value: String, context: String },
    #[error("index key does not match stored {what} {name:?}")]
    KeyMismatch { what: &'static str, name: String },
    #[error("children of {context} are not in rank order")]
    Unordered { context: String },
}

/// All inconsistencies found in `outline`, empty when the indices agree.
pub fn inconsistencies<O: OutlineRead + ?Sized>(outline: &O) -> Vec<Inconsistency> {
    let mut found = Vec::new();

    for (key, thought) in outline.thought_index().iter() {
        if &hash_value(&thought.value) != key {
            found.push(Inconsistency::KeyMismatch {
                what: "thought",
                name: thought.value.clone(),
            });
        }
        let mut seen = HashSet::new();
        for occ in &thought.contexts {
            if !seen.insert(hash_context(&occ.context)) {
                found.push(Inconsistency::DuplicateOccurrence {
                    value: thought.value.clone(),
                    context: occ.context.to_string(),
                });
            }
            let present = outline
                .context_index()
                .get(&occ.context)
                .and_then(|e| e.find(&thought.value, occ.rank))
                .is_some();
            if !present {
                found.push(Inconsistency::MissingChild {
                    value: thought.value.clone(),
                    context: occ.context.to_string(),
                    rank: occ.rank,
                });
            }
        }
    }

    for (key, entry) in outline.context_index().iter() {
        let context = entry.context.to_string();
        if &hash_context(&entry.context) != key {
            found.push(Inconsistency::KeyMismatch {
                what: "context",
                name: context.clone(),
            });
        }
        if entry.is_empty() {
            found.push(Inconsistency::EmptyContext {
                context: context.clone(),
            });
        }
        if entry.children.windows(2).any(|w| w[0].rank > w[1].rank) {
            found.push(Inconsistency::Unordered {
                context: context.clone(),
            });
        }
        let mut seen = HashSet::new();
        for child in &entry.children {
            if !seen.insert(hash_value(&child.value)) {
                found.push(Inconsistency::DuplicateChild {
                    value: child.value.clone(),
                    context: context.clone(),
                });
            }
            let listed = outline
                .thought_index()
                .get(&child.value)
                .map(|t| {
                    t.value == child.value
                        && t.contexts
                            .iter()
                            .any(|o| o.context == entry.context && o.rank == child.rank)
                })
                .unwrap_or(false);
            if !listed {
                found.push(Inconsistency::MissingOccurrence {
                    value: child.value.clone(),
                    context: context.clone(),
                    rank: child.rank,
                });
            }
        }
    }

    found
}

pub fn is_consistent<O: OutlineRead + ?Sized>(outline: &O) -> bool {
    inconsistencies(outline).is_empty()
}
