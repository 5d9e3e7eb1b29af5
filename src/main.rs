//! # Outline Harness CLI (`olh`)
//!
//! The `olh` binary edits an outline stored in SQLite. Every editing
//! command loads the outline, runs one or more engine transitions and waits
//! for their side effects to be written before exiting.
//!
//! ## Usage
//!
//! ```bash
//! olh --config ./config/olh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `olh init` | Create the SQLite database and run schema migrations |
//! | `olh import <file>` | Insert an indented outline (two spaces per level) |
//! | `olh add <parent> <value>` | Add one thought |
//! | `olh show [path]` | Print the outline below a path |
//! | `olh move <old> <new-parent>` | Move a thought and its subtree |
//! | `olh cursor [path]` | Show or set the editing cursor |
//! | `olh recent` | List recently edited paths |
//! | `olh check` | Cross-check the thought and context indices |
//! | `olh stats` | Print database statistics |
//!
//! Paths are written `A/B/C`; `/` is the root.

mod config;
mod db;
mod history;
mod import;
mod logging;
mod migrate;
mod outline;
mod sqlite_store;
mod stats;
mod sync;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Outline Harness CLI: a local outliner whose thoughts can live in many
/// contexts at once.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "olh",
    about = "Outline Harness — a local outliner backed by SQLite",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/olh.toml`.
    #[arg(long, global = true, default_value = "./config/olh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Import an indented outline file.
    Import {
        /// Outline file, two spaces per nesting level.
        file: PathBuf,

        /// Insert under this path instead of the root.
        #[arg(long)]
        under: Option<String>,
    },

    /// Add a thought under a parent path.
    Add {
        /// Parent path (`/` for the root).
        parent: String,

        /// Text of the new thought.
        value: String,

        /// Rank among its siblings. Defaults to after the last sibling.
        #[arg(long, allow_hyphen_values = true, value_parser = parse_rank)]
        rank: Option<f64>,
    },

    /// Print the outline below a path.
    Show {
        /// Path to print (defaults to the root).
        path: Option<String>,
    },

    /// Move a thought, with its subtree, under a new parent.
    Move {
        /// Path of the thought to move.
        old: String,

        /// New parent path (`/` for the root).
        new: String,

        /// Rank in the new context.
        #[arg(long, allow_hyphen_values = true, value_parser = parse_rank)]
        rank: Option<f64>,

        /// Caret offset to restore if the thought is being edited.
        #[arg(long)]
        offset: Option<usize>,
    },

    /// Show the editing cursor, or place it on a path.
    Cursor {
        path: Option<String>,
    },

    /// List recently edited paths, newest first.
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Verify that the thought and context indices agree.
    Check,

    /// Show database statistics.
    Stats,
}

/// Ranks end up in JSON columns, which cannot hold NaN or infinities.
fn parse_rank(s: &str) -> Result<f64, String> {
    let rank: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !rank.is_finite() {
        return Err(format!("rank must be a finite number, got {s}"));
    }
    Ok(rank)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Log setup needs the config, but a broken config still deserves logs
    let loaded = config::load_config(&cli.config);
    let log_config = match &loaded {
        Ok(cfg) => cfg.logging.clone(),
        Err(_) => config::Config::minimal().logging,
    };
    logging::init(&log_config)?;
    let cfg = loaded?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file, under } => {
            outline::run_import(&cfg, &file, under.as_deref()).await?;
        }
        Commands::Add {
            parent,
            value,
            rank,
        } => {
            outline::run_add(&cfg, &parent, &value, rank).await?;
        }
        Commands::Show { path } => {
            outline::run_show(&cfg, path.as_deref()).await?;
        }
        Commands::Move {
            old,
            new,
            rank,
            offset,
        } => {
            outline::run_move(&cfg, &old, &new, rank, offset).await?;
        }
        Commands::Cursor { path } => {
            outline::run_cursor(&cfg, path.as_deref()).await?;
        }
        Commands::Recent { limit } => {
            outline::run_recent(&cfg, limit).await?;
        }
        Commands::Check => {
            outline::run_check(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
