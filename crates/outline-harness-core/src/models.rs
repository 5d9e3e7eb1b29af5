//! Core data models used throughout Outline Harness.
//!
//! A thought is identified by its text value, not by a tree position. The
//! same value may occur under many contexts at once; each place it occurs
//! is an [`Occurrence`]. A [`Context`] is the sequence of values from the
//! root down to (but not including) a thought, and a [`Path`] is the same
//! walk with the rank of every step attached.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sibling order key within one context.
///
/// Ranks are only compared, never used as identity. They are floating
/// point so that callers can place a thought between two siblings without
/// renumbering; ordering uses [`f64::total_cmp`] so the type is `Ord`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub f64);

impl Rank {
    pub fn value(self) -> f64 {
        self.0
    }

    /// NaN and infinities cannot be stored; JSON has no encoding for them.
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Rank `n` positions after this one.
    pub fn offset(self, n: usize) -> Rank {
        Rank(self.0 + n as f64)
    }

    fn normalized_bits(self) -> u64 {
        // -0.0 and 0.0 are the same rank
        if self.0 == 0.0 {
            0.0f64.to_bits()
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for Rank {
    fn eq(&self, other: &Self) -> bool {
        self.normalized_bits() == other.normalized_bits()
    }
}

impl Eq for Rank {}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            Ordering::Equal
        } else {
            self.0.total_cmp(&other.0)
        }
    }
}

impl Hash for Rank {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized_bits().hash(state);
    }
}

impl From<f64> for Rank {
    fn from(value: f64) -> Self {
        Rank(value)
    }
}

impl From<i64> for Rank {
    fn from(value: i64) -> Self {
        Rank(value as f64)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered sequence of values from the root to a parent location.
///
/// The empty context is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Vec<String>);

impl Context {
    pub fn root() -> Self {
        Context(Vec::new())
    }

    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Context(values.into_iter().map(Into::into).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    /// Context one level deeper, under `value`.
    pub fn child(&self, value: &str) -> Context {
        let mut values = self.0.clone();
        values.push(value.to_string());
        Context(values)
    }

    /// Enclosing context, or `None` at the root.
    pub fn parent(&self) -> Option<Context> {
        if self.0.is_empty() {
            None
        } else {
            Some(Context(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn starts_with(&self, prefix: &Context) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Replace `old_prefix` with `new_prefix`, keeping the remainder.
    ///
    /// Returns `None` when `old_prefix` is not a prefix of this context.
    pub fn rebase(&self, old_prefix: &Context, new_prefix: &Context) -> Option<Context> {
        if !self.starts_with(old_prefix) {
            return None;
        }
        let mut values = new_prefix.0.clone();
        values.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Context(values))
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        write!(f, "{}", self.0.join("/"))
    }
}

/// One step of a [`Path`]: a value and its rank within the parent context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Step {
    pub value: String,
    pub rank: Rank,
}

impl Step {
    pub fn new(value: impl Into<String>, rank: impl Into<Rank>) -> Self {
        Self {
            value: value.into(),
            rank: rank.into(),
        }
    }
}

/// Ranked walk from the root to one specific occurrence of a thought.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<Step>);

impl Path {
    pub fn new(steps: Vec<Step>) -> Self {
        Path(steps)
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn head(&self) -> Option<&Step> {
        self.0.last()
    }

    /// Values of every step, i.e. the context the head thought's children live in.
    pub fn to_context(&self) -> Context {
        Context(self.0.iter().map(|s| s.value.clone()).collect())
    }

    /// Context that contains the head step.
    pub fn parent_context(&self) -> Context {
        let n = self.0.len().saturating_sub(1);
        Context(self.0[..n].iter().map(|s| s.value.clone()).collect())
    }

    pub fn parent(&self) -> Path {
        let n = self.0.len().saturating_sub(1);
        Path(self.0[..n].to_vec())
    }

    pub fn child(&self, step: Step) -> Path {
        let mut steps = self.0.clone();
        steps.push(step);
        Path(steps)
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Replace `old_prefix` with `new_prefix`, keeping the remainder.
    pub fn rebase(&self, old_prefix: &Path, new_prefix: &Path) -> Option<Path> {
        if !self.starts_with(old_prefix) {
            return None;
        }
        let mut steps = new_prefix.0.clone();
        steps.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Path(steps))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_context(), f)
    }
}

/// One place a value occurs: a context plus the rank it holds there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub context: Context,
    pub rank: Rank,
}

/// Value-keyed record listing every context a value currently occupies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thought {
    pub value: String,
    pub contexts: Vec<Occurrence>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Thought {
    pub fn new(value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            contexts: Vec::new(),
            created: now,
            last_updated: now,
        }
    }

    /// Rank this value holds in `context`, if it occurs there.
    pub fn rank_in(&self, context: &Context) -> Option<Rank> {
        self.contexts
            .iter()
            .filter(|o| &o.context == context)
            .map(|o| o.rank)
            .min()
    }

    pub fn remove_occurrence(&mut self, context: &Context, rank: Rank) {
        self.contexts
            .retain(|o| !(&o.context == context && o.rank == rank));
    }

    /// Drop every occurrence in `context`.
    pub fn leave(&mut self, context: &Context) {
        self.contexts.retain(|o| &o.context != context);
    }

    /// Add an occurrence, merging onto an existing occurrence in the same
    /// context. Returns the rank the value ends up holding there.
    pub fn add_occurrence(&mut self, context: Context, rank: Rank) -> Rank {
        if let Some(existing) = self.rank_in(&context) {
            return existing;
        }
        self.contexts.push(Occurrence { context, rank });
        rank
    }

    /// Collapse repeated occurrences so each context appears once, keeping
    /// the lowest rank.
    pub fn dedup_contexts(&mut self) {
        let mut kept: Vec<Occurrence> = Vec::with_capacity(self.contexts.len());
        for occ in self.contexts.drain(..) {
            match kept.iter_mut().find(|k| k.context == occ.context) {
                Some(k) => {
                    if occ.rank < k.rank {
                        k.rank = occ.rank;
                    }
                }
                None => kept.push(occ),
            }
        }
        self.contexts = kept;
    }
}

/// A child row in a [`ContextEntry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Child {
    pub value: String,
    pub rank: Rank,
    pub last_updated: DateTime<Utc>,
}

impl Child {
    pub fn new(value: impl Into<String>, rank: Rank, now: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            rank,
            last_updated: now,
        }
    }

    pub fn step(&self) -> Step {
        Step::new(self.value.clone(), self.rank)
    }
}

/// Rank-ordered children occupying one context.
///
/// An entry is never stored empty; the index drops it instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub context: Context,
    pub children: Vec<Child>,
}

impl ContextEntry {
    pub fn new(context: Context, mut children: Vec<Child>) -> Self {
        children.sort_by(|a, b| a.rank.cmp(&b.rank));
        Self { context, children }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn find(&self, value: &str, rank: Rank) -> Option<&Child> {
        self.children
            .iter()
            .find(|c| c.value == value && c.rank == rank)
    }

    /// Lowest-ranked child carrying `value`.
    pub fn first_with_value(&self, value: &str) -> Option<&Child> {
        self.children
            .iter()
            .filter(|c| c.value == value)
            .min_by(|a, b| a.rank.cmp(&b.rank))
    }

    pub fn max_rank(&self) -> Option<Rank> {
        self.children.iter().map(|c| c.rank).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_total_order() {
        let mut ranks = vec![Rank(2.0), Rank(-1.0), Rank(0.5), Rank(-0.0)];
        ranks.sort();
        assert_eq!(ranks, vec![Rank(-1.0), Rank(0.0), Rank(0.5), Rank(2.0)]);
        assert_eq!(Rank(0.0), Rank(-0.0));
    }

    #[test]
    fn test_context_rebase() {
        let ctx = Context::new(["Fruits", "Apple", "Red"]);
        let rebased = ctx
            .rebase(&Context::new(["Fruits"]), &Context::new(["Produce", "Local"]))
            .unwrap();
        assert_eq!(rebased, Context::new(["Produce", "Local", "Apple", "Red"]));
        assert!(ctx.rebase(&Context::new(["Veg"]), &Context::root()).is_none());
    }

    #[test]
    fn test_path_contexts() {
        let path = Path::new(vec![Step::new("Fruits", 0i64), Step::new("Apple", 3i64)]);
        assert_eq!(path.to_context(), Context::new(["Fruits", "Apple"]));
        assert_eq!(path.parent_context(), Context::new(["Fruits"]));
        assert_eq!(path.head().unwrap().rank, Rank(3.0));
        assert_eq!(path.to_string(), "Fruits/Apple");
        assert_eq!(Context::root().to_string(), "/");
    }

    #[test]
    fn test_add_occurrence_merges_same_context() {
        let now = Utc::now();
        let mut thought = Thought::new("Apple", now);
        let ctx = Context::new(["Fruits"]);
        assert_eq!(thought.add_occurrence(ctx.clone(), Rank(4.0)), Rank(4.0));
        assert_eq!(thought.add_occurrence(ctx.clone(), Rank(9.0)), Rank(4.0));
        assert_eq!(thought.contexts.len(), 1);
    }

    #[test]
    fn test_dedup_keeps_lowest_rank() {
        let now = Utc::now();
        let mut thought = Thought::new("Apple", now);
        let ctx = Context::new(["Fruits"]);
        thought.contexts = vec![
            Occurrence { context: ctx.clone(), rank: Rank(5.0) },
            Occurrence { context: Context::root(), rank: Rank(1.0) },
            Occurrence { context: ctx.clone(), rank: Rank(2.0) },
            Occurrence { context: ctx.clone(), rank: Rank(2.0) },
        ];
        thought.dedup_contexts();
        assert_eq!(thought.contexts.len(), 2);
        assert_eq!(thought.rank_in(&ctx), Some(Rank(2.0)));
    }

    #[test]
    fn test_context_entry_sorted() {
        let now = Utc::now();
        let entry = ContextEntry::new(
            Context::root(),
            vec![
                Child::new("b", Rank(2.0), now),
                Child::new("a", Rank(1.0), now),
            ],
        );
        assert_eq!(entry.children[0].value, "a");
        assert_eq!(entry.max_rank(), Some(Rank(2.0)));
        assert!(entry.find("b", Rank(2.0)).is_some());
        assert!(entry.find("b", Rank(1.0)).is_none());
    }
}
