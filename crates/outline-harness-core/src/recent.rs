//! Recently-edited tree.
//!
//! Mirrors the outline paths that were edited, one node per path step,
//! with a leaf timestamp on every node that was edited directly. It owns no
//! thought or context data and is advisory only: the move engine treats a
//! failed update as a warning and keeps the previous tree.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::{hash_value, ValueKey};
use crate::models::{Context, Path, Rank, Step};

/// Deepest path the tree will record.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecentlyEditedError {
    #[error("path is empty")]
    EmptyPath,
    #[error("path depth {depth} exceeds the recently-edited limit of {max}")]
    TooDeep { depth: usize, max: usize },
    #[error("cannot relocate {from} into its own subtree at {to}")]
    Cyclic { from: String, to: String },
}

/// A directly edited path and when it was last touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentLeaf {
    pub path: Path,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct RecentNode {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    children: BTreeMap<ValueKey, RecentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    leaf: Option<RecentLeaf>,
}

impl RecentNode {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.leaf.is_none()
    }

    fn depth(&self) -> usize {
        self.children
            .values()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }

    fn rebase(&mut self, old: &Path, new: &Path) {
        if let Some(leaf) = self.leaf.as_mut() {
            let suffix = leaf.path.steps().get(old.len()..).unwrap_or(&[]);
            let mut steps: Vec<Step> = new.steps().to_vec();
            steps.extend_from_slice(suffix);
            leaf.path = Path::new(steps);
        }
        for child in self.children.values_mut() {
            child.rebase(old, new);
        }
    }

    fn rerank<F>(&mut self, from: usize, rank_of: &F)
    where
        F: Fn(&Context, &str) -> Option<Rank>,
    {
        if let Some(leaf) = self.leaf.as_mut() {
            let mut steps = leaf.path.steps().to_vec();
            for i in from.min(steps.len())..steps.len() {
                let context = Path::new(steps[..i].to_vec()).to_context();
                if let Some(rank) = rank_of(&context, &steps[i].value) {
                    steps[i].rank = rank;
                }
            }
            leaf.path = Path::new(steps);
        }
        for child in self.children.values_mut() {
            child.rerank(from, rank_of);
        }
    }

    fn merge(&mut self, other: RecentNode) {
        match (&mut self.leaf, other.leaf) {
            (Some(mine), Some(theirs)) if theirs.last_updated > mine.last_updated => {
                *mine = theirs;
            }
            (None, Some(theirs)) => self.leaf = Some(theirs),
            _ => {}
        }
        for (key, child) in other.children {
            self.children.entry(key).or_default().merge(child);
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a RecentLeaf>) {
        if let Some(leaf) = &self.leaf {
            out.push(leaf);
        }
        for child in self.children.values() {
            child.collect(out);
        }
    }
}

/// Tree of recently edited paths.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentlyEdited {
    root: RecentNode,
}

fn keys(path: &Path) -> Vec<ValueKey> {
    path.steps().iter().map(|s| hash_value(&s.value)).collect()
}

impl RecentlyEdited {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of directly edited paths.
    pub fn len(&self) -> usize {
        let mut leaves = Vec::new();
        self.root.collect(&mut leaves);
        leaves.len()
    }

    /// Record an edit at `path`.
    pub fn touch(&mut self, path: &Path, now: DateTime<Utc>) -> Result<(), RecentlyEditedError> {
        if path.is_empty() {
            return Err(RecentlyEditedError::EmptyPath);
        }
        if path.len() > MAX_DEPTH {
            return Err(RecentlyEditedError::TooDeep {
                depth: path.len(),
                max: MAX_DEPTH,
            });
        }
        let mut node = &mut self.root;
        for key in keys(path) {
            node = node.children.entry(key).or_default();
        }
        node.leaf = Some(RecentLeaf {
            path: path.clone(),
            last_updated: now,
        });
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.node(path).is_some_and(|n| n.leaf.is_some())
    }

    fn node(&self, path: &Path) -> Option<&RecentNode> {
        let mut node = &self.root;
        for key in keys(path) {
            node = node.children.get(&key)?;
        }
        Some(node)
    }

    fn detach(&mut self, path: &Path) -> Option<RecentNode> {
        let keys = keys(path);
        let (last, parents) = keys.split_last()?;
        let mut node = &mut self.root;
        for key in parents {
            node = node.children.get_mut(key)?;
        }
        node.children.remove(last)
    }

    /// Forget `path` and everything recorded below it.
    pub fn remove(&mut self, path: &Path) {
        self.detach(path);
        self.prune();
    }

    fn prune(&mut self) {
        fn prune_node(node: &mut RecentNode) {
            for child in node.children.values_mut() {
                prune_node(child);
            }
            node.children.retain(|_, c| !c.is_empty());
        }
        prune_node(&mut self.root);
    }

    /// Return a copy of the tree with the subtree at `old` moved to `new`.
    ///
    /// Leaf paths inside the moved subtree have their `old` prefix replaced
    /// by `new`. If a node already exists at `new` the two are merged and the
    /// newer timestamp wins. Nothing recorded at `old` is not an error.
    pub fn relocate(&self, old: &Path, new: &Path) -> Result<RecentlyEdited, RecentlyEditedError> {
        if old.is_empty() || new.is_empty() {
            return Err(RecentlyEditedError::EmptyPath);
        }
        let old_keys = keys(old);
        let new_keys = keys(new);
        if new_keys.len() > old_keys.len() && new_keys.starts_with(&old_keys) {
            return Err(RecentlyEditedError::Cyclic {
                from: old.to_string(),
                to: new.to_string(),
            });
        }

        let mut tree = self.clone();
        let Some(mut subtree) = tree.detach(old) else {
            return Ok(tree);
        };

        let depth = new.len() + subtree.depth();
        if depth > MAX_DEPTH {
            return Err(RecentlyEditedError::TooDeep {
                depth,
                max: MAX_DEPTH,
            });
        }

        subtree.rebase(old, new);
        let mut node = &mut tree.root;
        for key in new_keys {
            node = node.children.entry(key).or_default();
        }
        node.merge(subtree);
        tree.prune();
        Ok(tree)
    }

    /// Refresh the ranks of leaf steps below `prefix` from `rank_of`.
    ///
    /// Steps `rank_of` has no answer for keep their recorded rank.
    pub fn rerank<F>(&mut self, prefix: &Path, rank_of: F)
    where
        F: Fn(&Context, &str) -> Option<Rank>,
    {
        let mut node = &mut self.root;
        for key in keys(prefix) {
            match node.children.get_mut(&key) {
                Some(child) => node = child,
                None => return,
            }
        }
        node.rerank(prefix.len(), &rank_of);
    }

    /// Up to `limit` edited paths, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RecentLeaf> {
        let mut leaves = Vec::new();
        self.root.collect(&mut leaves);
        leaves.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        leaves.into_iter().take(limit).cloned().collect()
    }
}
