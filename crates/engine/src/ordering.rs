//! Ordering engine.
//!
//! Every operation takes a forest index snapshot and computes a change set;
//! storage is never touched from here. Order-changing results are routed
//! through [`crate::chain::to_pointers`] and diffed against the snapshot so
//! only genuinely changed issues are written.

use thicket_core::{ChangeSet, EngineError, EngineResult, Issue, IssueId};

use crate::chain;
use crate::index::ForestIndex;

/// Direction of travel of a drag gesture, derived from successive hover
/// positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Moving toward the head of the list; insert before the target.
    Up,
    /// Moving toward the tail of the list; insert after the target.
    Down,
}

/// Drag gesture state.
///
/// Rendering reports hover positions; the direction of travel is the sign
/// of the index delta between successive hovers, nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragState {
    /// The issue being dragged
    pub dragging: IssueId,

    /// Position reported by the previous hover event, if any
    pub last_hover_index: Option<usize>,
}

impl DragState {
    /// Start tracking a drag of the given issue.
    pub fn new(dragging: IssueId) -> Self {
        Self {
            dragging,
            last_hover_index: None,
        }
    }

    /// Record a hover position and return the direction travelled since the
    /// previous one. The first hover only establishes a baseline.
    pub fn hover(&mut self, index: usize) -> Option<Direction> {
        let direction = match self.last_hover_index {
            Some(last) if index > last => Some(Direction::Down),
            Some(last) if index < last => Some(Direction::Up),
            _ => None,
        };
        self.last_hover_index = Some(index);
        direction
    }
}

/// Insert a brand-new ordered issue between `after` and `before` (either may
/// be `None` at the list ends) under the draft's parent.
pub fn insert_ordered(
    index: &ForestIndex,
    draft: Issue,
    after: Option<IssueId>,
    before: Option<IssueId>,
) -> EngineResult<ChangeSet> {
    if index.get(draft.id).is_some() {
        return Err(EngineError::Validation(format!(
            "issue {} already exists",
            draft.id
        )));
    }
    let parent = draft.parent;
    if let Some(pid) = parent {
        index.require(pid)?;
    }

    let mut run = ordered_run(index, parent)?;
    let at = match (after, before) {
        (Some(a), _) => {
            let pos = run
                .iter()
                .position(|i| i.id == a)
                .ok_or_else(|| {
                    EngineError::Validation("after target is not an ordered sibling".to_string())
                })?
                + 1;
            if let Some(b) = before {
                if run.get(pos).map(|i| i.id) != Some(b) {
                    return Err(EngineError::Validation(
                        "after and before targets are not adjacent".to_string(),
                    ));
                }
            }
            pos
        }
        (None, Some(b)) => {
            let pos = run.iter().position(|i| i.id == b).ok_or_else(|| {
                EngineError::Validation("before target is not an ordered sibling".to_string())
            })?;
            if pos != 0 {
                return Err(EngineError::Validation(
                    "inserting at the head requires the current head as the before target"
                        .to_string(),
                ));
            }
            pos
        }
        (None, None) => {
            if !run.is_empty() {
                return Err(EngineError::Validation(
                    "insert position required in a non-empty ordered group".to_string(),
                ));
            }
            0
        }
    };

    let mut me = draft;
    me.ordered = true;
    run.insert(at, me.clone());

    let mut set = ChangeSet::new();
    for issue in chain::to_pointers(run) {
        push_changed(index, &mut set, issue);
    }
    if let Some(pid) = parent {
        let mut p = current(index, &set, pid)?;
        p.children.push(me.id);
        set.upsert(p);
    }
    Ok(set)
}

/// Give an unordered issue an explicit position at the tail of its sibling
/// ordered list.
pub fn convert_to_ordered(index: &ForestIndex, id: IssueId) -> EngineResult<ChangeSet> {
    let me = index.require(id)?;
    if me.ordered {
        return Ok(ChangeSet::new());
    }

    let mut run = ordered_run(index, me.parent)?;
    let mut m = me.clone();
    m.ordered = true;
    run.push(m);

    let mut set = ChangeSet::new();
    for issue in chain::to_pointers(run) {
        push_changed(index, &mut set, issue);
    }
    Ok(set)
}

/// Detach an ordered issue from its sibling chain, splicing its former
/// neighbors together. A second call on the same issue is a no-op.
pub fn convert_to_unordered(index: &ForestIndex, id: IssueId) -> EngineResult<ChangeSet> {
    let me = index.require(id)?;
    if !me.ordered {
        return Ok(ChangeSet::new());
    }

    let mut run = ordered_run(index, me.parent)?;
    run.retain(|i| i.id != id);

    let mut set = ChangeSet::new();
    for issue in chain::to_pointers(run) {
        push_changed(index, &mut set, issue);
    }
    let mut m = me.clone();
    m.ordered = false;
    m.after = None;
    m.before = None;
    set.upsert(m);
    Ok(set)
}

/// Swap an ordered issue with the sibling just above it. No-op at the head.
///
/// Re-links exactly the swapped pair plus their outer neighbors; nothing is
/// removed and reinserted.
pub fn move_up(index: &ForestIndex, id: IssueId) -> EngineResult<ChangeSet> {
    let me = index.require(id)?;
    if !me.ordered {
        return Err(EngineError::Precondition(
            "only ordered issues can be moved".to_string(),
        ));
    }
    let Some(above_id) = me.after else {
        return Ok(ChangeSet::new());
    };
    let above = index.require(above_id)?;
    if above.before != Some(id) {
        return Err(EngineError::Invariant(
            "sibling chain neighbors disagree".to_string(),
        ));
    }

    let outer_above = above.after;
    let outer_below = me.before;

    let mut set = ChangeSet::new();
    let mut m = me.clone();
    m.after = outer_above;
    m.before = Some(above_id);
    set.upsert(m);

    let mut a = above.clone();
    a.after = Some(id);
    a.before = outer_below;
    set.upsert(a);

    if let Some(oa) = outer_above {
        let mut o = index.require(oa)?.clone();
        o.before = Some(id);
        set.upsert(o);
    }
    if let Some(ob) = outer_below {
        let mut o = index.require(ob)?.clone();
        o.after = Some(above_id);
        set.upsert(o);
    }
    Ok(set)
}

/// Swap an ordered issue with the sibling just below it. No-op at the tail.
pub fn move_down(index: &ForestIndex, id: IssueId) -> EngineResult<ChangeSet> {
    let me = index.require(id)?;
    if !me.ordered {
        return Err(EngineError::Precondition(
            "only ordered issues can be moved".to_string(),
        ));
    }
    let Some(below_id) = me.before else {
        return Ok(ChangeSet::new());
    };
    let below = index.require(below_id)?;
    if below.after != Some(id) {
        return Err(EngineError::Invariant(
            "sibling chain neighbors disagree".to_string(),
        ));
    }

    let outer_above = me.after;
    let outer_below = below.before;

    let mut set = ChangeSet::new();
    let mut m = me.clone();
    m.after = Some(below_id);
    m.before = outer_below;
    set.upsert(m);

    let mut b = below.clone();
    b.after = outer_above;
    b.before = Some(id);
    set.upsert(b);

    if let Some(oa) = outer_above {
        let mut o = index.require(oa)?.clone();
        o.before = Some(below_id);
        set.upsert(o);
    }
    if let Some(ob) = outer_below {
        let mut o = index.require(ob)?.clone();
        o.after = Some(id);
        set.upsert(o);
    }
    Ok(set)
}

/// Move an issue under a new parent (or to the root for `None`).
///
/// The issue leaves its old sibling chain if it held a position there and
/// always lands unordered; the old and new parents' `children` lists are
/// repaired in the same change set.
pub fn reparent(
    index: &ForestIndex,
    id: IssueId,
    new_parent: Option<IssueId>,
) -> EngineResult<ChangeSet> {
    let me = index.require(id)?;
    if me.parent == new_parent {
        return Ok(ChangeSet::new());
    }
    if let Some(np) = new_parent {
        if np == id {
            return Err(EngineError::Validation(
                "cannot nest an issue under itself".to_string(),
            ));
        }
        index.require(np)?;
        if index.descendants_of(id).iter().any(|d| d.id == np) {
            return Err(EngineError::Validation(
                "cannot nest an issue under its own descendant".to_string(),
            ));
        }
    }

    let mut set = ChangeSet::new();
    if me.ordered {
        let mut run = ordered_run(index, me.parent)?;
        run.retain(|i| i.id != id);
        for issue in chain::to_pointers(run) {
            push_changed(index, &mut set, issue);
        }
    }

    let mut m = me.clone();
    m.parent = new_parent;
    m.ordered = false;
    m.after = None;
    m.before = None;
    set.upsert(m);

    if let Some(op) = me.parent {
        let mut p = current(index, &set, op)?;
        p.children.retain(|c| *c != id);
        set.upsert(p);
    }
    if let Some(np) = new_parent {
        let mut p = current(index, &set, np)?;
        p.children.push(id);
        set.upsert(p);
    }
    Ok(set)
}

/// Detach an issue from its parent, making it a root-level issue.
///
/// Only legal while the issue is open or in progress; detaching a closed
/// issue would let the resolved-subtree accounting of its old parent go
/// stale.
pub fn remove_from_parent(index: &ForestIndex, id: IssueId) -> EngineResult<ChangeSet> {
    let me = index.require(id)?;
    if !me.status.is_active() {
        return Err(EngineError::Precondition(
            "cannot detach a closed issue from its parent".to_string(),
        ));
    }
    if me.parent.is_none() {
        return Ok(ChangeSet::new());
    }
    reparent(index, id, None)
}

/// Delete an issue and every descendant, repairing the sibling chain and
/// parent `children` list it leaves behind.
pub fn delete(index: &ForestIndex, id: IssueId) -> EngineResult<ChangeSet> {
    let me = index.require(id)?;

    let mut set = ChangeSet::new();
    if me.ordered {
        let mut run = ordered_run(index, me.parent)?;
        run.retain(|i| i.id != id);
        for issue in chain::to_pointers(run) {
            push_changed(index, &mut set, issue);
        }
    }
    if let Some(pid) = me.parent {
        let mut p = current(index, &set, pid)?;
        p.children.retain(|c| *c != id);
        set.upsert(p);
    }

    set.delete(id);
    for descendant in index.descendants_of(id) {
        set.delete(descendant.id);
    }
    Ok(set)
}

/// Reposition `source` relative to `target` within their shared sibling
/// group, as reported by a drag gesture.
///
/// Moving down inserts after the target, moving up before it. The four
/// pointer-conversion cases: ordered onto ordered repositions; ordered onto
/// unordered drops the dragged issue out of the chain; unordered onto
/// ordered gives it a position at that slot; unordered onto unordered does
/// nothing, since unordered siblings only ever follow their rank.
pub fn reorder(
    index: &ForestIndex,
    source_id: IssueId,
    target_id: IssueId,
    direction: Direction,
) -> EngineResult<ChangeSet> {
    if source_id == target_id {
        return Ok(ChangeSet::new());
    }
    let source = index.require(source_id)?;
    let target = index.require(target_id)?;
    if source.parent != target.parent {
        return Err(EngineError::Validation(
            "reorder stays within one sibling group".to_string(),
        ));
    }

    match (source.ordered, target.ordered) {
        (false, false) => Ok(ChangeSet::new()),
        (true, false) => convert_to_unordered(index, source_id),
        (_, true) => {
            let mut run = ordered_run(index, source.parent)?;
            run.retain(|i| i.id != source_id);
            let Some(pos) = run.iter().position(|i| i.id == target_id) else {
                return Err(EngineError::Invariant(
                    "target missing from its sibling chain".to_string(),
                ));
            };
            let at = match direction {
                Direction::Down => pos + 1,
                Direction::Up => pos,
            };
            let mut moved = source.clone();
            moved.ordered = true;
            run.insert(at, moved);

            let mut set = ChangeSet::new();
            for issue in chain::to_pointers(run) {
                push_changed(index, &mut set, issue);
            }
            Ok(set)
        }
    }
}

/// The ordered partition of a parent's sibling group, cloned in chain order.
fn ordered_run(index: &ForestIndex, parent: Option<IssueId>) -> EngineResult<Vec<Issue>> {
    let group: Vec<&Issue> = index
        .children_of(parent)
        .into_iter()
        .filter(|i| i.ordered)
        .collect();
    Ok(chain::to_array(&group)?.into_iter().cloned().collect())
}

/// Add an upsert only when the issue actually differs from the snapshot.
fn push_changed(index: &ForestIndex, set: &mut ChangeSet, issue: Issue) {
    if index.get(issue.id) != Some(&issue) {
        set.upsert(issue);
    }
}

/// The freshest visible version of an issue: a pending upsert if the change
/// set already touched it, the snapshot otherwise.
fn current(index: &ForestIndex, set: &ChangeSet, id: IssueId) -> EngineResult<Issue> {
    match set.upserted(id) {
        Some(issue) => Ok(issue.clone()),
        None => Ok(index.require(id)?.clone()),
    }
}
