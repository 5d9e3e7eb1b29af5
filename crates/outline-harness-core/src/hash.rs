//! Fingerprints used as index keys.
//!
//! Value fingerprints are case- and whitespace-insensitive, so `"Apple"`,
//! `"apple"` and `"  APPLE "` share one [`Thought`](crate::models::Thought)
//! record. Context fingerprints are built from the value fingerprints of
//! each step, so they inherit the same normalization.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::Context;

/// Key of the thought index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueKey(String);

/// Key of the context index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(String);

impl ValueKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a key that was previously rendered with [`as_str`](Self::as_str).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        ValueKey(raw.into())
    }
}

impl ContextKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        ContextKey(raw.into())
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, trim, and collapse whitespace runs to a single space.
pub fn normalize_value(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub fn hash_value(value: &str) -> ValueKey {
    let mut hasher = Sha256::new();
    hasher.update(normalize_value(value).as_bytes());
    ValueKey(format!("{:x}", hasher.finalize()))
}

pub fn hash_context(context: &Context) -> ContextKey {
    let mut hasher = Sha256::new();
    hasher.update(b"ctx");
    for value in context.values() {
        hasher.update([0x1f]);
        hasher.update(hash_value(value).as_str().as_bytes());
    }
    ContextKey(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_value("  Hello   World "), "hello world");
        assert_eq!(normalize_value("A\tB\nC"), "a b c");
    }

    #[test]
    fn test_value_hash_insensitive() {
        assert_eq!(hash_value("Apple"), hash_value("  apple"));
        assert_ne!(hash_value("Apple"), hash_value("Apples"));
    }

    #[test]
    fn test_context_hash_order_matters() {
        let ab = hash_context(&Context::new(["a", "b"]));
        let ba = hash_context(&Context::new(["b", "a"]));
        assert_ne!(ab, ba);
        assert_eq!(ab, hash_context(&Context::new(["A", " b "])));
    }

    #[test]
    fn test_root_context_distinct() {
        let root = hash_context(&Context::root());
        assert_ne!(root, hash_context(&Context::new([""])));
        assert_eq!(root.as_str().len(), 64);
    }
}
