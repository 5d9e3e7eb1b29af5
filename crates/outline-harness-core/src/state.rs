//! Versioned state snapshot.
//!
//! A [`State`] owns both indices plus the auxiliary data a transition
//! touches. Transitions never mutate a snapshot in place; they return a new
//! one with `version` bumped by exactly one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::hash::ContextKey;
use crate::index::{ContextIndex, OutlineRead, ThoughtIndex};
use crate::models::Path;
use crate::recent::RecentlyEdited;

/// Per-context display setting, keyed by context fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSetting {
    /// Show the contexts a thought appears in instead of its children.
    Contexts,
    Table,
    Prose,
}

impl ViewSetting {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewSetting::Contexts => "contexts",
            ViewSetting::Table => "table",
            ViewSetting::Prose => "prose",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "contexts" => Some(ViewSetting::Contexts),
            "table" => Some(ViewSetting::Table),
            "prose" => Some(ViewSetting::Prose),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub thought_index: ThoughtIndex,
    pub context_index: ContextIndex,
    pub recently_edited: RecentlyEdited,
    /// Thought currently selected.
    pub cursor: Option<Path>,
    /// Thought being edited; a move of this occurrence drags the cursor along.
    pub cursor_before_edit: Option<Path>,
    pub cursor_offset: Option<usize>,
    pub context_views: HashMap<ContextKey, ViewSetting>,
    pub version: u64,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the editing cursor on `path`.
    pub fn with_cursor(mut self, path: Path) -> Self {
        self.cursor = Some(path.clone());
        self.cursor_before_edit = Some(path);
        self
    }

    pub fn is_editing(&self, path: &Path) -> bool {
        self.cursor_before_edit.as_ref() == Some(path)
    }
}

impl OutlineRead for State {
    fn thought_index(&self) -> &ThoughtIndex {
        &self.thought_index
    }

    fn context_index(&self) -> &ContextIndex {
        &self.context_index
    }
}
