//! Forest index - the in-memory view of one project's issues.
//!
//! Built wholesale from the flat issue collection and rebuilt (never
//! patched) whenever the collection changes. Pointer fields stay plain id
//! lookups through this index; no cross-issue object references exist.

use std::collections::{HashMap, HashSet};

use thicket_core::{rank, ChangeSet, EngineError, EngineResult, Issue, IssueId};

/// Read-only arena of issues keyed by id.
pub struct ForestIndex {
    issues: HashMap<IssueId, Issue>,

    /// Ids in build order, for deterministic iteration and root listing.
    order: Vec<IssueId>,
}

impl ForestIndex {
    /// Build the index from a flat issue collection.
    pub fn build(issues: Vec<Issue>) -> Self {
        let order: Vec<IssueId> = issues.iter().map(|i| i.id).collect();
        let issues = issues.into_iter().map(|i| (i.id, i)).collect();
        Self { issues, order }
    }

    /// Number of issues in the index.
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Whether the index holds no issues.
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Look up an issue by id.
    pub fn get(&self, id: IssueId) -> Option<&Issue> {
        self.issues.get(&id)
    }

    /// Look up an issue by id, reporting a missing one as an error.
    pub fn require(&self, id: IssueId) -> EngineResult<&Issue> {
        self.get(id).ok_or(EngineError::NotFound(id))
    }

    /// All issues, in build order.
    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.order.iter().filter_map(|id| self.issues.get(id))
    }

    /// The sibling group below a parent: an issue's `children` resolved to
    /// issues, or every root-level issue for `None`.
    pub fn children_of(&self, parent: Option<IssueId>) -> Vec<&Issue> {
        match parent {
            Some(id) => match self.issues.get(&id) {
                Some(issue) => issue
                    .children
                    .iter()
                    .filter_map(|c| self.issues.get(c))
                    .collect(),
                None => Vec::new(),
            },
            None => self.iter().filter(|i| i.parent.is_none()).collect(),
        }
    }

    /// Walk `parent` links up to the root. Nearest-first: the issue's own
    /// parent comes first, the root last. The walk is capped at the total
    /// issue count so a corrupted `parent` cycle cannot hang it.
    pub fn ancestors_of(&self, id: IssueId) -> Vec<&Issue> {
        let mut out = Vec::new();
        let mut cursor = self.issues.get(&id).and_then(|i| i.parent);
        while let Some(pid) = cursor {
            if out.len() >= self.issues.len() {
                tracing::warn!(%id, "parent chain does not terminate, truncating walk");
                break;
            }
            match self.issues.get(&pid) {
                Some(parent) => {
                    out.push(parent);
                    cursor = parent.parent;
                }
                None => break,
            }
        }
        out
    }

    /// Every issue below this one, depth-first through `children`. Guarded
    /// by a visited set against corrupted child links.
    pub fn descendants_of(&self, id: IssueId) -> Vec<&Issue> {
        let mut out = Vec::new();
        let mut seen: HashSet<IssueId> = HashSet::new();
        seen.insert(id);
        let mut stack: Vec<IssueId> = match self.issues.get(&id) {
            Some(issue) => issue.children.iter().rev().copied().collect(),
            None => Vec::new(),
        };
        while let Some(cid) = stack.pop() {
            if !seen.insert(cid) {
                tracing::warn!(issue = %cid, "issue reachable twice, skipping repeat visit");
                continue;
            }
            if let Some(child) = self.issues.get(&cid) {
                out.push(child);
                stack.extend(child.children.iter().rev().copied());
            }
        }
        out
    }

    /// The ordered partition of a sibling group, in chain order.
    ///
    /// A malformed chain is logged and degraded to rank order for reading;
    /// no repair is written back.
    pub fn ordered_children(&self, parent: Option<IssueId>) -> Vec<&Issue> {
        let mut group: Vec<&Issue> = self
            .children_of(parent)
            .into_iter()
            .filter(|i| i.ordered)
            .collect();
        match crate::chain::to_array(&group) {
            Ok(run) => run,
            Err(err) => {
                tracing::warn!(%err, "malformed sibling chain, falling back to rank order");
                group.sort_by(|a, b| rank::compare(a, b));
                group
            }
        }
    }

    /// The unordered partition of a sibling group, highest rank first.
    pub fn unordered_children(&self, parent: Option<IssueId>) -> Vec<&Issue> {
        let mut group: Vec<&Issue> = self
            .children_of(parent)
            .into_iter()
            .filter(|i| !i.ordered)
            .collect();
        group.sort_by(|a, b| rank::compare(a, b));
        group
    }

    /// A copy of this index with a change set applied, for evaluating
    /// follow-up cascades before anything is committed.
    pub fn with_changes(&self, changes: &ChangeSet) -> ForestIndex {
        let mut issues: Vec<Issue> = self.iter().cloned().collect();
        changes.apply_to(&mut issues);
        Self::build(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket_core::{Importance, ProjectId};

    fn forest() -> (ForestIndex, IssueId, IssueId, IssueId, IssueId) {
        let project = ProjectId::new();
        let mut root = Issue::new(project, "root");
        let mut mid = Issue::new(project, "mid");
        let leaf_a = {
            let mut i = Issue::new(project, "leaf a");
            i.parent = Some(mid.id);
            i
        };
        let leaf_b = {
            let mut i = Issue::new(project, "leaf b");
            i.parent = Some(mid.id);
            i
        };
        mid.parent = Some(root.id);
        mid.children = vec![leaf_a.id, leaf_b.id];
        root.children = vec![mid.id];
        let ids = (root.id, mid.id, leaf_a.id, leaf_b.id);
        let index = ForestIndex::build(vec![root, mid, leaf_a, leaf_b]);
        (index, ids.0, ids.1, ids.2, ids.3)
    }

    #[test]
    fn test_children_of_root_level() {
        let (index, root, ..) = forest();
        let roots = index.children_of(None);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, root);
    }

    #[test]
    fn test_ancestors_nearest_first() {
        let (index, root, mid, leaf_a, _) = forest();
        let ancestors: Vec<IssueId> = index.ancestors_of(leaf_a).iter().map(|i| i.id).collect();
        assert_eq!(ancestors, vec![mid, root]);
    }

    #[test]
    fn test_descendants_depth_first() {
        let (index, root, mid, leaf_a, leaf_b) = forest();
        let descendants: Vec<IssueId> = index.descendants_of(root).iter().map(|i| i.id).collect();
        assert_eq!(descendants, vec![mid, leaf_a, leaf_b]);
    }

    #[test]
    fn test_ancestor_walk_survives_parent_cycle() {
        let project = ProjectId::new();
        let mut a = Issue::new(project, "a");
        let mut b = Issue::new(project, "b");
        a.parent = Some(b.id);
        b.parent = Some(a.id);
        let a_id = a.id;
        let index = ForestIndex::build(vec![a, b]);
        // Terminates despite the cycle.
        let walked = index.ancestors_of(a_id);
        assert!(walked.len() <= index.len());
    }

    #[test]
    fn test_unordered_children_sorted_by_rank() {
        let project = ProjectId::new();
        let minor = Issue::new(project, "minor");
        let mut major = Issue::new(project, "major");
        major.importance = Some(Importance::High);
        let major_id = major.id;
        let index = ForestIndex::build(vec![minor, major]);
        let unordered = index.unordered_children(None);
        assert_eq!(unordered[0].id, major_id);
    }

    #[test]
    fn test_malformed_chain_degrades_to_rank_order() {
        let project = ProjectId::new();
        let mut a = Issue::new(project, "a");
        let mut b = Issue::new(project, "b");
        a.ordered = true;
        b.ordered = true;
        // Two heads: no coherent chain.
        let index = ForestIndex::build(vec![a.clone(), b.clone()]);
        let shown = index.ordered_children(None);
        assert_eq!(shown.len(), 2);
        // And the degradation is read-only: nothing changed in the index.
        assert_eq!(index.get(a.id).unwrap(), &a);
        assert_eq!(index.get(b.id).unwrap(), &b);
    }

    #[test]
    fn test_with_changes_is_a_copy() {
        let (index, _, _, leaf_a, _) = forest();
        let mut changes = ChangeSet::new();
        changes.delete(leaf_a);
        let overlay = index.with_changes(&changes);
        assert!(overlay.get(leaf_a).is_none());
        assert!(index.get(leaf_a).is_some());
    }
}
