//! Status cascade engine.
//!
//! Resolve, reopen, and set-in-progress with their automatic propagation
//! through the forest. Like the ordering engine, everything here computes a
//! change set against a snapshot; nothing touches storage.

use thicket_core::{ChangeSet, EngineError, EngineResult, Issue, IssueId, Status, Time};

use crate::index::ForestIndex;

/// Resolve an issue.
///
/// When the issue is the last unresolved child of its parent, the parent
/// resolves instead, recursively: parents only ever auto-resolve by virtue
/// of their children completing. The resolved target and every still-active
/// descendant close in the same change set. Resolving a closed issue is a
/// no-op.
pub fn resolve(index: &ForestIndex, id: IssueId, now: Time) -> EngineResult<ChangeSet> {
    let issue = index.require(id)?;
    if issue.status.is_closed() {
        return Ok(ChangeSet::new());
    }

    // Climb while this completion also completes the parent.
    let mut target = issue;
    let mut hops = 0;
    while let Some(pid) = target.parent {
        hops += 1;
        if hops > index.len() {
            return Err(EngineError::Invariant(
                "parent chain does not terminate".to_string(),
            ));
        }
        let parent = index.require(pid)?;
        if parent.status.is_active() && is_last_active_child(index, pid, target.id) {
            target = parent;
        } else {
            break;
        }
    }

    let mut set = ChangeSet::new();
    close(&mut set, target.clone(), now);
    for descendant in index.descendants_of(target.id) {
        if descendant.status.is_active() {
            close(&mut set, descendant.clone(), now);
        }
    }
    tracing::debug!(issue = %id, resolved_as = %target.id, closed = set.upserts.len(), "resolve cascade");
    Ok(set)
}

/// Reopen a resolved issue.
///
/// Blocked when the issue has children and every one of them is closed: the
/// issue would immediately count as completed again, so the caller has to
/// reopen or add a child first. Otherwise the issue opens and every closed
/// ancestor opens with it; descendants are never touched. Reopening an open
/// issue is a no-op.
pub fn reopen(index: &ForestIndex, id: IssueId) -> EngineResult<ChangeSet> {
    let issue = index.require(id)?;
    if issue.status.is_active() {
        return Ok(ChangeSet::new());
    }

    let children = index.children_of(Some(id));
    if !children.is_empty() && children.iter().all(|c| c.status.is_closed()) {
        return Err(EngineError::Precondition(
            "all children are closed; reopen or add a child first".to_string(),
        ));
    }

    let mut set = ChangeSet::new();
    open(&mut set, issue.clone());
    for ancestor in index.ancestors_of(id) {
        if ancestor.status.is_closed() {
            open(&mut set, ancestor.clone());
        }
    }
    Ok(set)
}

/// Mark an issue as being worked on.
///
/// Propagates upward only: every ancestor not already in progress moves to
/// in progress as well, so the path from the root down to the active work
/// is visible. Starting a closed issue is rejected; reopen it first.
pub fn set_in_progress(index: &ForestIndex, id: IssueId, now: Time) -> EngineResult<ChangeSet> {
    let issue = index.require(id)?;
    if issue.status.is_closed() {
        return Err(EngineError::Precondition(
            "cannot start a closed issue; reopen it first".to_string(),
        ));
    }

    let mut set = ChangeSet::new();
    if issue.status == Status::InProgress {
        return Ok(set);
    }
    start(&mut set, issue.clone(), now);
    for ancestor in index.ancestors_of(id) {
        if ancestor.status == Status::Open {
            start(&mut set, ancestor.clone(), now);
        }
    }
    Ok(set)
}

/// Follow-up cascade after an issue left one parent chain for another
/// (reparent, detach, create, delete).
///
/// Old side: removing the last active child may complete the old parent.
/// New side: an active issue landing under closed ancestors reopens them.
/// Evaluated against the post-move state; `moved` may be gone (delete).
pub fn reconcile_after_move(
    index: &ForestIndex,
    moved: IssueId,
    old_parent: Option<IssueId>,
    now: Time,
) -> EngineResult<ChangeSet> {
    let mut set = ChangeSet::new();

    if let Some(pid) = old_parent {
        if let Some(parent) = index.get(pid) {
            let children = index.children_of(Some(pid));
            if parent.status.is_active()
                && !children.is_empty()
                && children.iter().all(|c| c.status.is_closed())
            {
                set.merge(resolve(index, pid, now)?);
            }
        }
    }

    if let Some(issue) = index.get(moved) {
        if issue.status.is_active() {
            for ancestor in index.ancestors_of(moved) {
                if ancestor.status.is_closed() {
                    open(&mut set, ancestor.clone());
                }
            }
        }
    }
    Ok(set)
}

/// Exactly one of the parent's children is still active, and it is `id`.
fn is_last_active_child(index: &ForestIndex, parent: IssueId, id: IssueId) -> bool {
    let mut active = index
        .children_of(Some(parent))
        .into_iter()
        .filter(|c| c.status.is_active());
    match (active.next(), active.next()) {
        (Some(only), None) => only.id == id,
        _ => false,
    }
}

fn close(set: &mut ChangeSet, mut issue: Issue, now: Time) {
    issue.status = Status::Resolved;
    issue.closed_at = Some(now);
    if issue.in_progress_from.is_none() {
        issue.in_progress_from = Some(now);
    }
    set.upsert(issue);
}

fn open(set: &mut ChangeSet, mut issue: Issue) {
    issue.status = Status::Open;
    issue.closed_at = None;
    issue.in_progress_from = None;
    set.upsert(issue);
}

fn start(set: &mut ChangeSet, mut issue: Issue, now: Time) {
    issue.status = Status::InProgress;
    if issue.in_progress_from.is_none() {
        issue.in_progress_from = Some(now);
    }
    set.upsert(issue);
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket_core::ProjectId;

    fn now() -> Time {
        chrono::Utc::now()
    }

    /// Parent with two open children.
    fn family() -> (ForestIndex, IssueId, IssueId, IssueId) {
        let project = ProjectId::new();
        let mut p = Issue::new(project, "p");
        let mut a = Issue::new(project, "a");
        let mut b = Issue::new(project, "b");
        a.parent = Some(p.id);
        b.parent = Some(p.id);
        p.children = vec![a.id, b.id];
        let ids = (p.id, a.id, b.id);
        (ForestIndex::build(vec![p, a, b]), ids.0, ids.1, ids.2)
    }

    #[test]
    fn test_resolve_leaf_leaves_parent_open() {
        let (index, p, a, _) = family();
        let changes = resolve(&index, a, now()).unwrap();
        let after = index.with_changes(&changes);
        assert_eq!(after.get(a).unwrap().status, Status::Resolved);
        assert_eq!(after.get(p).unwrap().status, Status::Open);
    }

    #[test]
    fn test_resolving_last_child_resolves_parent() {
        let (index, p, a, b) = family();
        let first = resolve(&index, a, now()).unwrap();
        let mid = index.with_changes(&first);
        let second = resolve(&mid, b, now()).unwrap();
        let after = mid.with_changes(&second);
        assert_eq!(after.get(b).unwrap().status, Status::Resolved);
        assert_eq!(after.get(p).unwrap().status, Status::Resolved);
    }

    #[test]
    fn test_reopen_child_reopens_resolved_ancestors() {
        let (index, p, a, b) = family();
        let mut state = index.with_changes(&resolve(&index, a, now()).unwrap());
        state = state.with_changes(&resolve(&state, b, now()).unwrap());
        assert_eq!(state.get(p).unwrap().status, Status::Resolved);

        let changes = reopen(&state, b).unwrap();
        let after = state.with_changes(&changes);
        assert_eq!(after.get(b).unwrap().status, Status::Open);
        assert_eq!(after.get(p).unwrap().status, Status::Open);
        // The sibling stays as it was.
        assert_eq!(after.get(a).unwrap().status, Status::Resolved);
    }

    #[test]
    fn test_reopen_guard_blocks_completed_parent() {
        let (index, p, a, b) = family();
        let mut state = index.with_changes(&resolve(&index, a, now()).unwrap());
        state = state.with_changes(&resolve(&state, b, now()).unwrap());

        assert!(matches!(
            reopen(&state, p),
            Err(EngineError::Precondition(_))
        ));
    }

    #[test]
    fn test_reopen_leaf_passes_vacuously() {
        let (index, _, a, _) = family();
        let state = index.with_changes(&resolve(&index, a, now()).unwrap());
        let changes = reopen(&state, a).unwrap();
        let after = state.with_changes(&changes);
        assert_eq!(after.get(a).unwrap().status, Status::Open);
    }

    #[test]
    fn test_resolve_cascades_down_through_descendants() {
        let project = ProjectId::new();
        let mut root = Issue::new(project, "root");
        let mut mid = Issue::new(project, "mid");
        let mut leaf = Issue::new(project, "leaf");
        mid.parent = Some(root.id);
        leaf.parent = Some(mid.id);
        root.children = vec![mid.id];
        mid.children = vec![leaf.id];
        let (r, m, l) = (root.id, mid.id, leaf.id);
        let index = ForestIndex::build(vec![root, mid, leaf]);

        let stamp = now();
        let changes = resolve(&index, r, stamp).unwrap();
        let after = index.with_changes(&changes);
        for id in [r, m, l] {
            let issue = after.get(id).unwrap();
            assert_eq!(issue.status, Status::Resolved);
            assert_eq!(issue.closed_at, Some(stamp));
        }
    }

    #[test]
    fn test_resolve_is_noop_on_closed_issue() {
        let (index, _, a, _) = family();
        let state = index.with_changes(&resolve(&index, a, now()).unwrap());
        assert!(resolve(&state, a, now()).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_preserves_existing_in_progress_from() {
        let (index, _, a, _) = family();
        let started = now();
        let state = index.with_changes(&set_in_progress(&index, a, started).unwrap());

        let closed = now();
        let after = state.with_changes(&resolve(&state, a, closed).unwrap());
        assert_eq!(after.get(a).unwrap().in_progress_from, Some(started));
        assert_eq!(after.get(a).unwrap().closed_at, Some(closed));
    }

    #[test]
    fn test_set_in_progress_propagates_upward_only() {
        let (index, p, a, b) = family();
        let changes = set_in_progress(&index, a, now()).unwrap();
        let after = index.with_changes(&changes);
        assert_eq!(after.get(a).unwrap().status, Status::InProgress);
        assert_eq!(after.get(p).unwrap().status, Status::InProgress);
        assert_eq!(after.get(b).unwrap().status, Status::Open);
    }

    #[test]
    fn test_set_in_progress_on_closed_is_rejected() {
        let (index, _, a, _) = family();
        let state = index.with_changes(&resolve(&index, a, now()).unwrap());
        assert!(matches!(
            set_in_progress(&state, a, now()),
            Err(EngineError::Precondition(_))
        ));
    }

    #[test]
    fn test_abandoned_counts_as_closed_for_cascade() {
        let (index, p, a, b) = family();
        let mut abandoned = index.get(a).unwrap().clone();
        abandoned.status = Status::Abandoned;
        let mut seed = ChangeSet::new();
        seed.upsert(abandoned);
        let state = index.with_changes(&seed);

        // b is now the last active child: resolving it completes the parent.
        let after = state.with_changes(&resolve(&state, b, now()).unwrap());
        assert_eq!(after.get(p).unwrap().status, Status::Resolved);
    }

    #[test]
    fn test_reconcile_completes_left_behind_parent() {
        let (index, p, a, b) = family();
        // a resolved, b moved away: p's remaining children are all closed.
        let mut state = index.with_changes(&resolve(&index, a, now()).unwrap());
        state = state.with_changes(
            &crate::ordering::remove_from_parent(&state, b).unwrap(),
        );

        let changes = reconcile_after_move(&state, b, Some(p), now()).unwrap();
        let after = state.with_changes(&changes);
        assert_eq!(after.get(p).unwrap().status, Status::Resolved);
    }

    #[test]
    fn test_reconcile_reopens_closed_ancestors_of_active_issue() {
        let project = ProjectId::new();
        let mut host = Issue::new(project, "host");
        host.status = Status::Resolved;
        host.closed_at = Some(now());
        let guest = Issue::new(project, "guest");
        let (h, g) = (host.id, guest.id);
        let index = ForestIndex::build(vec![host, guest]);

        let moved = crate::ordering::reparent(&index, g, Some(h)).unwrap();
        let state = index.with_changes(&moved);
        let changes = reconcile_after_move(&state, g, None, now()).unwrap();
        let after = state.with_changes(&changes);
        assert_eq!(after.get(h).unwrap().status, Status::Open);
    }
}
