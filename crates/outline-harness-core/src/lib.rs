//! # Outline Harness Core
//!
//! Pure logic for Outline Harness: the thought and context indices, rank
//! allocation, the recently-edited tree, and the transitions that keep all
//! of them consistent, most importantly the subtree move.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Side effects are described by
//! [`effects::Effect`] values and carried out by the embedding application
//! through the [`store`] traits.

pub mod consistency;
pub mod effects;
pub mod engine;
pub mod hash;
pub mod index;
pub mod models;
pub mod rank;
pub mod recent;
pub mod state;
pub mod store;

pub use effects::{Effect, SyncBatch, Transition};
pub use engine::{move_thought, Engine, InsertError, MoveError, MoveRequest};
pub use index::OutlineRead;
pub use models::{Child, Context, ContextEntry, Occurrence, Path, Rank, Step, Thought};
pub use state::{State, ViewSetting};
