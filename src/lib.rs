//! # Outline Harness
//!
//! A local outliner backed by SQLite. Thoughts are plain values that can
//! appear in many contexts; the pure engine in
//! [`outline_harness_core`] keeps the thought and context indices in step,
//! and this crate stores them, replays navigation history and exposes the
//! whole thing as the `olh` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────┐
//! │   CLI    │──▶│ Engine (core)│──▶│  Effects  │
//! │  (olh)   │   │ move/insert  │   │  Persist  │
//! └──────────┘   └──────────────┘   │  Navigate │
//!                                   └─────┬─────┘
//!                                         ▼
//!                                  ┌────────────┐
//!                                  │ SyncWorker │──▶ SQLite
//!                                  └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! olh init                          # create database
//! olh import notes.txt              # load an indented outline
//! olh show Fruits                   # print a subtree
//! olh move Fruits/Apple Produce     # move a thought and its subtree
//! olh check                         # verify the indices agree
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite persistence of index deltas |
//! | [`history`] | Navigation history |
//! | [`sync`] | Background effect worker |
//! | [`import`] | Indented outline import and rendering |
//! | [`outline`] | Outline commands |
//! | [`stats`] | Database statistics |

pub mod config;
pub mod db;
pub mod history;
pub mod import;
pub mod logging;
pub mod migrate;
pub mod outline;
pub mod sqlite_store;
pub mod stats;
pub mod sync;
