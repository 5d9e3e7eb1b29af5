//! The two cross-referencing indices.
//!
//! [`ThoughtIndex`] maps a value fingerprint to the [`Thought`] listing every
//! context the value occupies. [`ContextIndex`] maps a context fingerprint to
//! the rank-ordered children of that context. They are two projections of
//! one relation; [`crate::consistency`] checks that they agree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hash::{hash_context, hash_value, ContextKey, ValueKey};
use crate::models::{Child, Context, ContextEntry, Path, Step, Thought};

/// Value fingerprint → thought record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThoughtIndex {
    thoughts: HashMap<ValueKey, Thought>,
}

impl ThoughtIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, value: &str) -> Option<&Thought> {
        self.thoughts.get(&hash_value(value))
    }

    pub fn get_by_key(&self, key: &ValueKey) -> Option<&Thought> {
        self.thoughts.get(key)
    }

    pub fn insert(&mut self, thought: Thought) {
        self.thoughts.insert(hash_value(&thought.value), thought);
    }

    pub fn remove(&mut self, value: &str) -> Option<Thought> {
        self.thoughts.remove(&hash_value(value))
    }

    pub fn len(&self) -> usize {
        self.thoughts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thoughts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ValueKey, &Thought)> {
        self.thoughts.iter()
    }

    /// Canonical display text for `value`, if the value is indexed.
    pub fn canonical(&self, value: &str) -> Option<&str> {
        self.get(value).map(|t| t.value.as_str())
    }
}

/// Context fingerprint → children of that context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextIndex {
    entries: HashMap<ContextKey, ContextEntry>,
}

impl ContextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, context: &Context) -> Option<&ContextEntry> {
        self.entries.get(&hash_context(context))
    }

    pub fn get_by_key(&self, key: &ContextKey) -> Option<&ContextEntry> {
        self.entries.get(key)
    }

    /// Children of `context` in rank order; empty when the context has none.
    pub fn children(&self, context: &Context) -> &[Child] {
        self.get(context)
            .map(|e| e.children.as_slice())
            .unwrap_or(&[])
    }

    /// Store `entry`, or drop the key entirely when it has no children.
    pub fn put(&mut self, entry: ContextEntry) {
        let key = hash_context(&entry.context);
        if entry.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, entry);
        }
    }

    pub fn remove(&mut self, key: &ContextKey) -> Option<ContextEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ContextKey, &ContextEntry)> {
        self.entries.iter()
    }
}

/// Read contract exposed to consumers outside the move engine, such as an
/// expansion policy or a renderer.
pub trait OutlineRead {
    fn thought_index(&self) -> &ThoughtIndex;
    fn context_index(&self) -> &ContextIndex;

    /// Children of `context` in rank order.
    fn children(&self, context: &Context) -> &[Child] {
        self.context_index().children(context)
    }

    /// Every occurrence of `value`.
    fn thought(&self, value: &str) -> Option<&Thought> {
        self.thought_index().get(value)
    }

    /// Resolve a value sequence to a ranked path, matching values by
    /// fingerprint and taking the lowest-ranked match at each level.
    ///
    /// The returned path carries canonical display values.
    fn resolve(&self, values: &[&str]) -> Option<Path> {
        let mut context = Context::root();
        let mut steps = Vec::with_capacity(values.len());
        for value in values {
            let key = hash_value(value);
            let child = self
                .children(&context)
                .iter()
                .filter(|c| hash_value(&c.value) == key)
                .min_by(|a, b| a.rank.cmp(&b.rank))?;
            context = context.child(&child.value);
            steps.push(child.step());
        }
        Some(Path::new(steps))
    }

    /// Whether every step of `context` names a child of the preceding prefix.
    fn context_exists(&self, context: &Context) -> bool {
        let values: Vec<&str> = context.values().iter().map(String::as_str).collect();
        self.resolve(&values).is_some()
    }

    /// Every descendant path below `path`, depth first in rank order.
    fn descendants(&self, path: &Path) -> Vec<Path> {
        let mut out = Vec::new();
        let mut stack = vec![path.clone()];
        while let Some(current) = stack.pop() {
            let children = self.children(&current.to_context());
            for child in children.iter().rev() {
                stack.push(current.child(child.step()));
            }
            if &current != path {
                out.push(current);
            }
        }
        out
    }

    /// Rewrite each step's value to the canonical display text stored in
    /// the thought index, leaving unknown values untouched.
    fn canonicalize(&self, path: &Path) -> Path {
        Path::new(
            path.steps()
                .iter()
                .map(|s| Step {
                    value: self
                        .thought_index()
                        .canonical(&s.value)
                        .unwrap_or(&s.value)
                        .to_string(),
                    rank: s.rank,
                })
                .collect(),
        )
    }
}
