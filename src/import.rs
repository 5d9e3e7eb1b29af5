//! Indented plain-text outlines.
//!
//! One thought per line, two spaces per nesting level, with an optional
//! `- ` or `* ` bullet. Blank lines are ignored. The same format is what
//! `olh show` prints, so an export can be imported again.

use anyhow::{bail, Result};

use outline_harness_core::{Effect, Engine, OutlineRead, Path, State, SyncBatch};

pub const INDENT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineLine {
    pub depth: usize,
    pub value: String,
}

/// Split `text` into `(depth, value)` lines, checking the nesting.
pub fn parse_outline(text: &str) -> Result<Vec<OutlineLine>> {
    let mut lines = Vec::new();
    let mut previous_depth: Option<usize> = None;

    for (i, raw) in text.lines().enumerate() {
        let lineno = i + 1;
        if raw.trim().is_empty() {
            continue;
        }
        if raw.trim_start_matches(' ').starts_with('\t') {
            bail!("line {}: tabs are not allowed in indentation", lineno);
        }
        let spaces = raw.len() - raw.trim_start_matches(' ').len();
        if spaces % INDENT != 0 {
            bail!(
                "line {}: indentation of {} spaces is not a multiple of {}",
                lineno,
                spaces,
                INDENT
            );
        }
        let depth = spaces / INDENT;
        let max_depth = previous_depth.map(|d| d + 1).unwrap_or(0);
        if depth > max_depth {
            bail!("line {}: indented more than one level past its parent", lineno);
        }

        let body = raw.trim();
        let value = body
            .strip_prefix("- ")
            .or_else(|| body.strip_prefix("* "))
            .unwrap_or(body)
            .trim();
        if value.is_empty() {
            bail!("line {}: empty bullet", lineno);
        }

        lines.push(OutlineLine {
            depth,
            value: value.to_string(),
        });
        previous_depth = Some(depth);
    }

    Ok(lines)
}

/// Insert `lines` under `parent`.
///
/// Returns the final snapshot and its effects, with every line's index
/// deltas folded into a single persist batch.
pub fn import_lines(
    engine: &Engine,
    state: &State,
    parent: &Path,
    lines: &[OutlineLine],
) -> Result<(State, Vec<Effect>)> {
    let mut current = state.clone();
    let mut batch: Option<SyncBatch> = None;
    let mut stack: Vec<Path> = vec![state.canonicalize(parent)];

    for line in lines {
        stack.truncate(line.depth + 1);
        let Some(under) = stack.last() else {
            bail!("outline nesting is inconsistent at {:?}", line.value);
        };
        let t = engine.insert(&current, under, &line.value, None)?;
        stack.push(t.path);
        current = t.state;
        for effect in t.effects {
            if let Effect::Persist(next) = effect {
                match batch.as_mut() {
                    Some(b) => b.absorb(next),
                    None => batch = Some(next),
                }
            }
        }
    }

    let effects = batch.map(Effect::Persist).into_iter().collect();
    Ok((current, effects))
}

/// Render the subtree below `path` in the import format.
pub fn render_outline<O: OutlineRead + ?Sized>(outline: &O, path: &Path) -> String {
    let base = path.len();
    let mut out = String::new();
    for descendant in outline.descendants(path) {
        let depth = descendant.len() - base - 1;
        if let Some(step) = descendant.head() {
            out.push_str(&" ".repeat(depth * INDENT));
            out.push_str(&step.value);
            out.push('\n');
        }
    }
    out
}
