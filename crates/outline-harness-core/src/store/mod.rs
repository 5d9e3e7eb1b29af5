//! Collaborator abstractions for deferred side effects.
//!
//! The [`Persistence`] trait receives the index deltas produced by each
//! transition and can rebuild a [`State`] from what it has stored. The
//! [`Navigation`] trait keeps an address/history display in sync with the
//! editing cursor. Both run after a snapshot is committed; their failures
//! are theirs to report and never roll the snapshot back.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::effects::SyncBatch;
use crate::models::Path;
use crate::state::State;

/// Durable mirror of the indices.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`apply`](Persistence::apply) | Merge one batch of deltas, keyed by fingerprint |
/// | [`load_state`](Persistence::load_state) | Rebuild a snapshot from stored data |
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Merge `batch` into the store.
    ///
    /// Must be idempotent: applying the same batch twice leaves the store
    /// as applying it once.
    async fn apply(&self, batch: &SyncBatch) -> Result<()>;

    /// Rebuild a state snapshot from everything stored so far.
    ///
    /// Cursor fields are left empty; they belong to the navigation side.
    async fn load_state(&self) -> Result<State>;
}

/// Address/history display.
#[async_trait]
pub trait Navigation: Send + Sync {
    /// Show `path`. With `replace`, overwrite the latest history entry
    /// instead of pushing a new one.
    async fn navigate(&self, path: &Path, replace: bool) -> Result<()>;
}
