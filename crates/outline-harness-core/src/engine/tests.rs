use super::*;
use crate::consistency::{inconsistencies, is_consistent};
use crate::effects::Effect;
use crate::hash::hash_context;
use crate::index::OutlineRead;
use crate::models::Step;
use crate::state::{State, ViewSetting};

/// Build an outline from `A/B/C` lines, appending each missing step.
fn build(lines: &[&str]) -> State {
    let engine = Engine::new();
    let mut state = State::new();
    for line in lines {
        let values: Vec<&str> = line.split('/').collect();
        for i in 0..values.len() {
            if state.resolve(&values[..=i]).is_some() {
                continue;
            }
            let parent = state.resolve(&values[..i]).unwrap();
            state = engine.insert(&state, &parent, values[i], None).unwrap().state;
        }
    }
    state
}

fn path(state: &State, line: &str) -> Path {
    let values: Vec<&str> = line.split('/').collect();
    state.resolve(&values).unwrap()
}

/// Destination under `parent` for the head value of `moved`, at `rank`.
fn dest(state: &State, parent: &str, moved: &Path, rank: f64) -> Path {
    let parent = if parent.is_empty() {
        Path::default()
    } else {
        path(state, parent)
    };
    parent.child(Step::new(moved.head().unwrap().value.clone(), rank))
}

fn children(state: &State, ctx: &[&str]) -> Vec<(String, f64)> {
    state
        .children(&Context::new(ctx.iter().copied()))
        .iter()
        .map(|c| (c.value.clone(), c.rank.value()))
        .collect()
}

fn occurrences(state: &State, value: &str) -> Vec<(String, f64)> {
    let mut occ: Vec<(String, f64)> = state
        .thought(value)
        .unwrap()
        .contexts
        .iter()
        .map(|o| (o.context.to_string(), o.rank.value()))
        .collect();
    occ.sort_by(|a, b| a.0.cmp(&b.0));
    occ
}

/// Index contents with timestamps stripped.
fn shape(state: &State) -> (Vec<(String, Vec<(String, f64)>)>, Vec<(String, Vec<(String, f64)>)>) {
    let mut thoughts: Vec<_> = state
        .thought_index
        .iter()
        .map(|(_, t)| (t.value.clone(), occurrences(state, &t.value)))
        .collect();
    thoughts.sort_by(|a, b| a.0.cmp(&b.0));
    let mut contexts: Vec<_> = state
        .context_index
        .iter()
        .map(|(_, e)| {
            (
                e.context.to_string(),
                e.children
                    .iter()
                    .map(|c| (c.value.clone(), c.rank.value()))
                    .collect(),
            )
        })
        .collect();
    contexts.sort_by(|a, b| a.0.cmp(&b.0));
    (thoughts, contexts)
}

struct FailingRelocator;

impl RecentlyEditedRelocator for FailingRelocator {
    fn relocate(
        &self,
        _tree: &RecentlyEdited,
        _old: &Path,
        _new: &Path,
    ) -> Result<RecentlyEdited, RecentlyEditedError> {
        Err(RecentlyEditedError::TooDeep { depth: 0, max: 0 })
    }
}

// ============ move ============

#[test]
fn test_descendant_rewrite() {
    let state = build(&["Fruits/Apple/Red", "Fruits/Pear", "Produce"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let t = move_thought(&state, &MoveRequest::new(apple, to)).unwrap();
    let next = &t.state;

    assert_eq!(children(next, &["Produce"]), vec![("Apple".into(), 0.0)]);
    assert_eq!(children(next, &["Produce", "Apple"]), vec![("Red".into(), 0.0)]);
    assert_eq!(children(next, &["Fruits"]), vec![("Pear".into(), 1.0)]);
    assert!(next
        .context_index
        .get(&Context::new(["Fruits", "Apple"]))
        .is_none());
    assert_eq!(occurrences(next, "Red"), vec![("Produce/Apple".into(), 0.0)]);
    assert_eq!(occurrences(next, "Apple"), vec![("Produce".into(), 0.0)]);
    assert_eq!(t.path.to_string(), "Produce/Apple");
    assert!(is_consistent(next), "{:?}", inconsistencies(next));
}

#[test]
fn test_deep_descendants_keep_ranks() {
    let state = build(&["Fruits/Apple/Red/Dark", "Fruits/Apple/Green", "Produce"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let next = move_thought(&state, &MoveRequest::new(apple, to))
        .unwrap()
        .state;
    assert_eq!(
        children(&next, &["Produce", "Apple"]),
        vec![("Red".into(), 0.0), ("Green".into(), 1.0)]
    );
    assert_eq!(
        children(&next, &["Produce", "Apple", "Red"]),
        vec![("Dark".into(), 0.0)]
    );
    assert!(next
        .context_index
        .get(&Context::new(["Fruits", "Apple", "Red"]))
        .is_none());
    assert!(is_consistent(&next));
}

#[test]
fn test_old_context_pruned() {
    let state = build(&["Fruits/Apple/Red", "Produce"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let t = move_thought(&state, &MoveRequest::new(apple, to)).unwrap();
    let fruits_key = hash_context(&Context::new(["Fruits"]));
    assert!(t.state.context_index.get_by_key(&fruits_key).is_none());
    let batch = t.persist_batch().unwrap();
    assert_eq!(batch.contexts.get(&fruits_key), Some(&None));
    assert!(t.state.context_index.iter().all(|(_, e)| !e.is_empty()));
    assert!(is_consistent(&t.state));
}

#[test]
fn test_merge_on_duplicate_destination() {
    let state = build(&["Fruits/Apple/Red", "Produce/Kiwi", "Produce/Apple/Green"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 7.0);

    let t = move_thought(&state, &MoveRequest::new(apple, to)).unwrap();
    let next = &t.state;

    assert_eq!(
        children(next, &["Produce"]),
        vec![("Kiwi".into(), 0.0), ("Apple".into(), 1.0)]
    );
    assert_eq!(occurrences(next, "Apple"), vec![("Produce".into(), 1.0)]);
    assert_eq!(t.path.head().unwrap().rank, Rank(1.0));
    // merged children go after the existing ones
    assert_eq!(
        children(next, &["Produce", "Apple"]),
        vec![("Green".into(), 0.0), ("Red".into(), 1.0)]
    );
    assert!(next.context_index.get(&Context::new(["Fruits"])).is_none());
    assert!(is_consistent(next), "{:?}", inconsistencies(next));
}

#[test]
fn test_merge_reranks_recently_edited_leaves() {
    let state = build(&["Fruits/Apple/Red", "Produce/Kiwi", "Produce/Apple/Green"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 7.0);

    let next = move_thought(&state, &MoveRequest::new(apple, to))
        .unwrap()
        .state;
    let red = next
        .recently_edited
        .recent(10)
        .into_iter()
        .find(|l| l.path.to_string() == "Produce/Apple/Red")
        .unwrap();
    assert_eq!(red.path, path(&next, "Produce/Apple/Red"));
    assert_eq!(red.path.head().unwrap().rank, Rank(1.0));
}

#[test]
fn test_value_repeated_along_ancestry_keeps_subtree() {
    // v/v/{x/y, v/x/y}: moving the inner v onto the root v shifts every
    // descendant context one level up, so [v,v] is both a source and a target
    let state = build(&["v/v/x/y", "v/v/v/x/y"]);
    let inner = path(&state, "v/v");
    let to = dest(&state, "", &inner, 0.0);

    let t = move_thought(&state, &MoveRequest::new(inner, to)).unwrap();
    let next = &t.state;

    assert_eq!(children(next, &["v"]), vec![("x".into(), 1.0), ("v".into(), 2.0)]);
    assert_eq!(children(next, &["v", "x"]), vec![("y".into(), 0.0)]);
    assert_eq!(children(next, &["v", "v"]), vec![("x".into(), 2.0)]);
    assert_eq!(children(next, &["v", "v", "x"]), vec![("y".into(), 1.0)]);
    assert!(next.resolve(&["v", "x", "y"]).is_some());
    assert!(next.resolve(&["v", "v", "x", "y"]).is_some());
    assert!(next
        .context_index
        .get(&Context::new(["v", "v", "v"]))
        .is_none());
    assert_eq!(
        occurrences(next, "y"),
        vec![("v/v/x".into(), 1.0), ("v/x".into(), 0.0)]
    );
    assert!(is_consistent(next), "{:?}", inconsistencies(next));
}

#[test]
fn test_non_finite_rank_rejected() {
    let state = build(&["Fruits/Apple", "Produce"]);
    let apple = path(&state, "Fruits/Apple");

    for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        let to = dest(&state, "Produce", &apple, bad);
        let err = move_thought(&state, &MoveRequest::new(apple.clone(), to)).unwrap_err();
        assert!(matches!(err, MoveError::InvalidRank { .. }), "{bad}");
        assert!(err.is_abort());
    }
}

#[test]
fn test_same_context_reorder() {
    let state = build(&["L/a/x", "L/b", "L/c"]);
    let a = path(&state, "L/a");
    let to = dest(&state, "L", &a, 5.0);

    let t = move_thought(&state, &MoveRequest::new(a, to)).unwrap();
    let next = &t.state;
    assert_eq!(
        children(next, &["L"]),
        vec![("b".into(), 1.0), ("c".into(), 2.0), ("a".into(), 5.0)]
    );
    assert_eq!(children(next, &["L", "a"]), vec![("x".into(), 0.0)]);
    assert_eq!(occurrences(next, "a"), vec![("L".into(), 5.0)]);
    assert_eq!(occurrences(next, "x"), vec![("L/a".into(), 0.0)]);
    assert!(is_consistent(next));
}

#[test]
fn test_noop_move_only_bumps_version() {
    let state = build(&["Fruits/Apple/Red", "Fruits/Pear"]);
    let apple = path(&state, "Fruits/Apple");

    let t = move_thought(&state, &MoveRequest::new(apple.clone(), apple)).unwrap();
    assert_eq!(shape(&t.state), shape(&state));
    assert_eq!(t.state.version, state.version + 1);
    assert!(is_consistent(&t.state));
}

#[test]
fn test_shared_value_keeps_other_occurrences() {
    let state = build(&["Fruits/Apple/Red", "Colors/Red"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Colors", &apple, 1.0);

    let next = move_thought(&state, &MoveRequest::new(apple, to))
        .unwrap()
        .state;
    assert_eq!(
        occurrences(&next, "Red"),
        vec![("Colors".into(), 0.0), ("Colors/Apple".into(), 0.0)]
    );
    assert_eq!(
        children(&next, &["Colors"]),
        vec![("Red".into(), 0.0), ("Apple".into(), 1.0)]
    );
    assert!(is_consistent(&next));
}

#[test]
fn test_move_to_root() {
    let state = build(&["Fruits/Apple/Red"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "", &apple, 1.0);

    let next = move_thought(&state, &MoveRequest::new(apple, to))
        .unwrap()
        .state;
    assert_eq!(
        children(&next, &[]),
        vec![("Fruits".into(), 0.0), ("Apple".into(), 1.0)]
    );
    assert_eq!(children(&next, &["Apple"]), vec![("Red".into(), 0.0)]);
    assert!(is_consistent(&next));
}

#[test]
fn test_paths_match_case_insensitively() {
    let state = build(&["Fruits/Apple", "Produce"]);
    let old = Path::new(vec![Step::new("fruits", 0i64), Step::new("APPLE", 0i64)]);
    let new = Path::new(vec![Step::new("produce", 1i64), Step::new("apple", 0i64)]);

    let next = move_thought(&state, &MoveRequest::new(old, new))
        .unwrap()
        .state;
    assert_eq!(children(&next, &["Produce"]), vec![("Apple".into(), 0.0)]);
    assert!(is_consistent(&next));
}

#[test]
fn test_cycle_rejected() {
    let state = build(&["A/B/C"]);
    let a = path(&state, "A");
    let into_b = path(&state, "A/B");

    let err = move_thought(&state, &MoveRequest::new(a.clone(), into_b)).unwrap_err();
    assert!(matches!(err, MoveError::CyclicMove { .. }));

    let deeper = path(&state, "A/B/C").child(Step::new("A", 0i64));
    let err = move_thought(&state, &MoveRequest::new(a.clone(), deeper)).unwrap_err();
    assert!(matches!(err, MoveError::CyclicMove { .. }));

    let inside_self = a.child(Step::new("A", 4i64));
    let err = move_thought(&state, &MoveRequest::new(a, inside_self)).unwrap_err();
    assert!(matches!(err, MoveError::CyclicMove { .. }));
    assert!(err.is_abort());
}

#[test]
fn test_not_found() {
    let state = build(&["Fruits/Apple"]);
    let to = Path::new(vec![Step::new("Apple", 0i64)]);

    let wrong_rank = Path::new(vec![Step::new("Fruits", 0i64), Step::new("Apple", 9i64)]);
    let err = move_thought(&state, &MoveRequest::new(wrong_rank, to.clone())).unwrap_err();
    assert!(matches!(err, MoveError::NotFound { .. }));

    let missing = Path::new(vec![Step::new("Kiwi", 0i64)]);
    let err = move_thought(&state, &MoveRequest::new(missing, to.clone())).unwrap_err();
    assert!(matches!(err, MoveError::NotFound { .. }));

    let err = move_thought(&state, &MoveRequest::new(Path::default(), to)).unwrap_err();
    assert!(matches!(err, MoveError::NotFound { .. }));
}

#[test]
fn test_invalid_destination() {
    let state = build(&["Fruits/Apple"]);
    let apple = path(&state, "Fruits/Apple");

    let nowhere = Path::new(vec![Step::new("Nope", 0i64), Step::new("Apple", 0i64)]);
    let err = move_thought(&state, &MoveRequest::new(apple.clone(), nowhere)).unwrap_err();
    assert_eq!(
        err,
        MoveError::InvalidDestination {
            context: "Nope".into()
        }
    );

    let err = move_thought(&state, &MoveRequest::new(apple, Path::default())).unwrap_err();
    assert!(matches!(err, MoveError::InvalidDestination { .. }));
}

#[test]
fn test_advisory_failure_keeps_tree() {
    let state = build(&["Fruits/Apple/Red", "Produce"]);
    assert!(!state.recently_edited.is_empty());
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let engine = Engine::new().with_relocator(Box::new(FailingRelocator));
    let t = engine.move_thought(&state, &MoveRequest::new(apple, to)).unwrap();
    assert_eq!(t.state.recently_edited, state.recently_edited);
    assert_eq!(t.state.version, state.version + 1);
    assert_eq!(children(&t.state, &["Produce", "Apple"]), vec![("Red".into(), 0.0)]);
    assert!(is_consistent(&t.state));
}

#[test]
fn test_recently_edited_follows_move() {
    let state = build(&["Fruits/Apple/Red", "Produce"]);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let next = move_thought(&state, &MoveRequest::new(apple, to))
        .unwrap()
        .state;
    let produce_red = path(&next, "Produce/Apple/Red");
    assert!(next.recently_edited.contains(&produce_red));
    assert!(!next
        .recently_edited
        .contains(&path(&state, "Fruits/Apple/Red")));
}

#[test]
fn test_cursor_follows_edited_thought() {
    let state = build(&["Fruits/Apple", "Produce"]);
    let apple = path(&state, "Fruits/Apple");
    let state = state.with_cursor(apple.clone());
    let to = dest(&state, "Produce", &apple, 0.0);

    let t = move_thought(&state, &MoveRequest::new(apple, to.clone()).with_offset(3)).unwrap();
    assert_eq!(t.state.cursor.as_ref(), Some(&to));
    assert_eq!(t.state.cursor_before_edit.as_ref(), Some(&to));
    assert_eq!(t.state.cursor_offset, Some(3));
    assert!(t.effects.contains(&Effect::Navigate {
        path: to.clone(),
        replace: true
    }));
}

#[test]
fn test_cursor_untouched_when_not_editing() {
    let state = build(&["Fruits/Apple", "Fruits/Pear", "Produce"]);
    let pear = path(&state, "Fruits/Pear");
    let state = state.with_cursor(pear.clone());
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let t = move_thought(&state, &MoveRequest::new(apple, to).with_offset(3)).unwrap();
    assert_eq!(t.state.cursor, Some(pear));
    assert_eq!(t.state.cursor_offset, None);
    assert!(t.navigation().is_none());
    assert_eq!(t.effects.len(), 1);
}

#[test]
fn test_view_setting_carried() {
    let mut state = build(&["Fruits/Apple", "Produce"]);
    let fruits_key = hash_context(&Context::new(["Fruits"]));
    let produce_key = hash_context(&Context::new(["Produce"]));
    state
        .context_views
        .insert(fruits_key.clone(), ViewSetting::Table);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let t = move_thought(&state, &MoveRequest::new(apple, to)).unwrap();
    assert_eq!(t.state.context_views.get(&produce_key), Some(&ViewSetting::Table));
    assert!(!t.state.context_views.contains_key(&fruits_key));
    let batch = t.persist_batch().unwrap();
    assert_eq!(batch.context_views.get(&produce_key), Some(&Some(ViewSetting::Table)));
    assert_eq!(batch.context_views.get(&fruits_key), Some(&None));
}

#[test]
fn test_view_setting_equal_untouched() {
    let mut state = build(&["Fruits/Apple", "Produce"]);
    let fruits_key = hash_context(&Context::new(["Fruits"]));
    let produce_key = hash_context(&Context::new(["Produce"]));
    state.context_views.insert(fruits_key.clone(), ViewSetting::Prose);
    state.context_views.insert(produce_key.clone(), ViewSetting::Prose);
    let apple = path(&state, "Fruits/Apple");
    let to = dest(&state, "Produce", &apple, 0.0);

    let t = move_thought(&state, &MoveRequest::new(apple, to)).unwrap();
    assert_eq!(t.state.context_views, state.context_views);
    assert!(t.persist_batch().unwrap().context_views.is_empty());
}

#[test]
fn test_version_increments_once_per_move() {
    let state = build(&["a", "b"]);
    let mut current = state.clone();
    for i in 0..3 {
        let a = path(&current, "a");
        let to = Path::new(vec![Step::new("a", 10.0 + i as f64)]);
        current = move_thought(&current, &MoveRequest::new(a, to)).unwrap().state;
    }
    assert_eq!(current.version, state.version + 3);
}

// ============ insert ============

#[test]
fn test_insert_appends_after_siblings() {
    let state = build(&["a", "b"]);
    let t = Engine::new()
        .insert(&state, &Path::default(), "c", None)
        .unwrap();
    assert_eq!(t.path, Path::new(vec![Step::new("c", 2i64)]));
    assert_eq!(t.state.version, state.version + 1);
    assert!(t.state.recently_edited.contains(&t.path));
    assert!(is_consistent(&t.state));
}

#[test]
fn test_insert_base_rank() {
    let t = Engine::new()
        .with_base_rank(Rank(100.0))
        .insert(&State::new(), &Path::default(), "first", None)
        .unwrap();
    assert_eq!(t.path.head().unwrap().rank, Rank(100.0));
}

#[test]
fn test_insert_merges_same_value() {
    let state = build(&["Fruits/Apple"]);
    let fruits = path(&state, "Fruits");
    let t = Engine::new()
        .insert(&state, &fruits, "  apple ", Some(Rank(9.0)))
        .unwrap();
    assert_eq!(children(&t.state, &["Fruits"]), vec![("Apple".into(), 0.0)]);
    assert_eq!(t.path.head().unwrap().value, "Apple");
    assert!(is_consistent(&t.state));
}

#[test]
fn test_insert_errors() {
    let state = build(&["a"]);
    let engine = Engine::new();
    assert_eq!(
        engine.insert(&state, &Path::default(), "   ", None).unwrap_err(),
        InsertError::EmptyValue
    );
    let ghost = Path::new(vec![Step::new("ghost", 0i64)]);
    assert!(matches!(
        engine.insert(&state, &ghost, "x", None).unwrap_err(),
        InsertError::InvalidParent { .. }
    ));
    assert!(matches!(
        engine
            .insert(&state, &Path::default(), "x", Some(Rank(f64::INFINITY)))
            .unwrap_err(),
        InsertError::InvalidRank { .. }
    ));
    assert!(matches!(
        engine
            .insert(&state, &Path::default(), "x", Some(Rank(f64::NAN)))
            .unwrap_err(),
        InsertError::InvalidRank { .. }
    ));
}
