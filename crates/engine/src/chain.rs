//! Sibling chain codec.
//!
//! Converts between the explicit order of an ordered sibling group and the
//! persisted pairwise `after`/`before` pointer representation. Traversal is
//! bounded: a corrupted chain is reported, never looped on.

use std::collections::HashMap;

use thicket_core::{EngineError, EngineResult, Issue, IssueId};

/// Reconstruct the explicit order of one ordered sibling group from its
/// pointers.
///
/// The walk starts at the head (`after == None`) and follows `before`
/// pointers, bounded by the group size. A group with no head, a pointer
/// leaving the group, a cycle, or a chain that does not cover every member
/// is a detectable corruption and comes back as an invariant violation.
pub fn to_array<'a>(group: &[&'a Issue]) -> EngineResult<Vec<&'a Issue>> {
    if group.is_empty() {
        return Ok(Vec::new());
    }

    let by_id: HashMap<IssueId, &Issue> = group.iter().map(|i| (i.id, *i)).collect();
    let Some(head) = group.iter().copied().find(|i| i.after.is_none()) else {
        return Err(EngineError::Invariant(
            "ordered sibling group has no head".to_string(),
        ));
    };

    let mut out = Vec::with_capacity(group.len());
    let mut cursor = Some(head);
    while let Some(issue) = cursor {
        if out.len() == group.len() {
            return Err(EngineError::Invariant(
                "cycle in ordered sibling chain".to_string(),
            ));
        }
        out.push(issue);
        cursor = match issue.before {
            None => None,
            Some(next) => match by_id.get(&next) {
                Some(n) => Some(*n),
                None => {
                    return Err(EngineError::Invariant(format!(
                        "sibling chain points at {next} outside the group"
                    )));
                }
            },
        };
    }

    if out.len() != group.len() {
        // More than one head, or members unreachable from the head.
        return Err(EngineError::Invariant(
            "ordered sibling chain does not cover the group".to_string(),
        ));
    }
    Ok(out)
}

/// Reassign the pairwise pointers for an explicitly ordered run of siblings.
///
/// This is the single place pointers are recomputed; every mutation that
/// changes order routes its result through here. The first ordered issue
/// gets `after = None`, the last gets `before = None`, interior issues point
/// at their immediate neighbors. Unordered entries pass through untouched.
pub fn to_pointers(mut run: Vec<Issue>) -> Vec<Issue> {
    let ids: Vec<IssueId> = run.iter().filter(|i| i.ordered).map(|i| i.id).collect();
    let mut slot = 0;
    for issue in run.iter_mut().filter(|i| i.ordered) {
        issue.after = if slot == 0 { None } else { Some(ids[slot - 1]) };
        issue.before = if slot + 1 < ids.len() {
            Some(ids[slot + 1])
        } else {
            None
        };
        slot += 1;
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket_core::ProjectId;

    fn ordered_issue(title: &str) -> Issue {
        let mut issue = Issue::new(ProjectId::new(), title);
        issue.ordered = true;
        issue
    }

    #[test]
    fn test_round_trip_preserves_order() {
        for n in [0usize, 1, 2, 5] {
            let run: Vec<Issue> = (0..n).map(|i| ordered_issue(&format!("i{i}"))).collect();
            let encoded = to_pointers(run.clone());
            let refs: Vec<&Issue> = encoded.iter().collect();
            let decoded = to_array(&refs).unwrap();
            assert_eq!(
                decoded.iter().map(|i| i.id).collect::<Vec<_>>(),
                run.iter().map(|i| i.id).collect::<Vec<_>>(),
            );
        }
    }

    #[test]
    fn test_pointer_well_formedness() {
        let run = to_pointers(vec![
            ordered_issue("a"),
            ordered_issue("b"),
            ordered_issue("c"),
        ]);
        assert_eq!(run.iter().filter(|i| i.after.is_none()).count(), 1);
        assert_eq!(run.iter().filter(|i| i.before.is_none()).count(), 1);
        assert_eq!(run[0].before, Some(run[1].id));
        assert_eq!(run[1].after, Some(run[0].id));
        assert_eq!(run[1].before, Some(run[2].id));
        assert_eq!(run[2].after, Some(run[1].id));
    }

    #[test]
    fn test_unordered_entries_pass_through() {
        let mut plain = Issue::new(ProjectId::new(), "plain");
        plain.after = None;
        plain.before = None;
        let run = to_pointers(vec![ordered_issue("a"), plain.clone(), ordered_issue("b")]);
        assert_eq!(run[1], plain);
        // The ordered pair links across the unordered entry.
        assert_eq!(run[0].before, Some(run[2].id));
        assert_eq!(run[2].after, Some(run[0].id));
    }

    #[test]
    fn test_headless_group_is_reported() {
        let mut a = ordered_issue("a");
        let mut b = ordered_issue("b");
        // Both claim a predecessor: no head anywhere.
        a.after = Some(b.id);
        b.after = Some(a.id);
        a.before = Some(b.id);
        b.before = None;
        let group = [&a, &b];
        assert!(matches!(
            to_array(&group),
            Err(EngineError::Invariant(_))
        ));
    }

    #[test]
    fn test_cycle_terminates_with_error() {
        let mut a = ordered_issue("a");
        let mut b = ordered_issue("b");
        let mut c = ordered_issue("c");
        a.after = None;
        a.before = Some(b.id);
        b.after = Some(a.id);
        b.before = Some(c.id);
        c.after = Some(b.id);
        c.before = Some(b.id); // loops back instead of terminating
        let group = [&a, &b, &c];
        assert!(matches!(to_array(&group), Err(EngineError::Invariant(_))));
    }

    #[test]
    fn test_orphan_pointer_is_reported() {
        let stranger = ordered_issue("not in group");
        let mut a = ordered_issue("a");
        a.before = Some(stranger.id);
        let group = [&a];
        assert!(matches!(to_array(&group), Err(EngineError::Invariant(_))));
    }

    #[test]
    fn test_two_heads_do_not_cover_group() {
        let mut a = ordered_issue("a");
        let mut b = ordered_issue("b");
        a.after = None;
        a.before = None;
        b.after = None;
        b.before = None;
        let group = [&a, &b];
        assert!(matches!(to_array(&group), Err(EngineError::Invariant(_))));
    }
}
