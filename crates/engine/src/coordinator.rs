//! Mutation coordinator - the public facade over one project's forest.
//!
//! Accepts user intents, delegates to the ordering and cascade engines
//! against the current snapshot, merges their change sets, stamps every
//! touched entity, and commits the result through the storage backend as
//! one atomic call. The in-memory index is rebuilt only from confirmed
//! subscription snapshots, never optimistically.

use thicket_core::{
    ChangeSet, Difficulty, Effort, EngineError, EngineResult, Importance, Issue, IssueId,
    IssuePatch, Kind, ProjectId, Urgency,
};
use thicket_storage::Storage;
use tokio::sync::watch;

use crate::index::ForestIndex;
use crate::ordering::Direction;
use crate::{cascade, ordering};

/// Specification for creating an issue.
#[derive(Debug, Clone, Default)]
pub struct NewIssue {
    /// Issue title (required)
    pub title: String,

    /// Free-form notes
    pub notes: String,

    /// Containing issue, `None` for root level
    pub parent: Option<IssueId>,

    /// What kind of issue this is
    pub kind: Option<Kind>,

    /// How important the issue is
    pub importance: Option<Importance>,

    /// How urgent the issue is
    pub urgency: Option<Urgency>,

    /// How hard the issue is expected to be
    pub difficulty: Option<Difficulty>,

    /// Expected effort to finish the issue
    pub effort: Option<Effort>,
}

/// Serialized mutation front end for one project scope.
///
/// Operations take `&mut self`, so only one change set is ever in flight
/// per coordinator, which is what keeps the pointer chain free of
/// lost-update races.
pub struct MutationCoordinator<S: Storage> {
    storage: S,
    project: ProjectId,
    index: ForestIndex,
    updates: watch::Receiver<Vec<Issue>>,
}

impl<S: Storage> MutationCoordinator<S> {
    /// Open a coordinator over one project scope, loading the current
    /// snapshot and subscribing to confirmed changes.
    pub async fn open(storage: S, project: ProjectId) -> EngineResult<Self> {
        let updates = storage.subscribe(project).await.map_err(persistence)?;
        let issues = storage.load_all(project).await.map_err(persistence)?;
        Ok(Self {
            storage,
            project,
            index: ForestIndex::build(issues),
            updates,
        })
    }

    /// The project scope this coordinator serves.
    pub fn project(&self) -> ProjectId {
        self.project
    }

    /// Read access to the current confirmed snapshot.
    pub fn index(&self) -> &ForestIndex {
        &self.index
    }

    /// Create a new issue, optionally under a parent.
    pub async fn create_issue(&mut self, spec: NewIssue) -> EngineResult<Issue> {
        let draft = self.draft_from(spec)?;
        let id = draft.id;

        let mut changes = ChangeSet::new();
        changes.upsert(draft.clone());
        if let Some(pid) = draft.parent {
            let mut parent = self.index.require(pid)?.clone();
            parent.children.push(id);
            changes.upsert(parent);
        }
        self.with_move_cascade(&mut changes, id, None)?;
        self.apply(changes).await?;
        self.committed(id)
    }

    /// Create a new issue directly at an explicit position in its sibling
    /// ordered list.
    pub async fn insert_ordered(
        &mut self,
        spec: NewIssue,
        after: Option<IssueId>,
        before: Option<IssueId>,
    ) -> EngineResult<Issue> {
        let draft = self.draft_from(spec)?;
        let id = draft.id;

        let mut changes = ordering::insert_ordered(&self.index, draft, after, before)?;
        self.with_move_cascade(&mut changes, id, None)?;
        self.apply(changes).await?;
        self.committed(id)
    }

    /// Edit an issue's descriptive and ordinal fields.
    pub async fn update_issue(&mut self, id: IssueId, patch: IssuePatch) -> EngineResult<Issue> {
        if let Some(title) = &patch.title {
            if title.trim().is_empty() {
                return Err(EngineError::Validation("a title is required".to_string()));
            }
        }
        let mut issue = self.index.require(id)?.clone();
        patch.apply(&mut issue);

        let mut changes = ChangeSet::new();
        if &issue != self.index.require(id)? {
            changes.upsert(issue);
        }
        self.apply(changes).await?;
        self.committed(id)
    }

    /// Resolve an issue, cascading per the forest rules.
    pub async fn resolve(&mut self, id: IssueId) -> EngineResult<()> {
        let changes = cascade::resolve(&self.index, id, chrono::Utc::now())?;
        self.apply(changes).await
    }

    /// Reopen a resolved issue and its resolved ancestors.
    pub async fn reopen(&mut self, id: IssueId) -> EngineResult<()> {
        let changes = cascade::reopen(&self.index, id)?;
        self.apply(changes).await
    }

    /// Mark an issue (and its ancestors) as in progress.
    pub async fn set_in_progress(&mut self, id: IssueId) -> EngineResult<()> {
        let changes = cascade::set_in_progress(&self.index, id, chrono::Utc::now())?;
        self.apply(changes).await
    }

    /// Swap an ordered issue with the sibling above it.
    pub async fn move_up(&mut self, id: IssueId) -> EngineResult<()> {
        let changes = ordering::move_up(&self.index, id)?;
        self.apply(changes).await
    }

    /// Swap an ordered issue with the sibling below it.
    pub async fn move_down(&mut self, id: IssueId) -> EngineResult<()> {
        let changes = ordering::move_down(&self.index, id)?;
        self.apply(changes).await
    }

    /// Give an unordered issue an explicit position at the tail of its
    /// sibling ordered list.
    pub async fn convert_to_ordered(&mut self, id: IssueId) -> EngineResult<()> {
        let changes = ordering::convert_to_ordered(&self.index, id)?;
        self.apply(changes).await
    }

    /// Return an ordered issue to rank-derived positioning.
    pub async fn convert_to_unordered(&mut self, id: IssueId) -> EngineResult<()> {
        let changes = ordering::convert_to_unordered(&self.index, id)?;
        self.apply(changes).await
    }

    /// Reposition a dragged issue relative to a hover target.
    pub async fn reorder(
        &mut self,
        source: IssueId,
        target: IssueId,
        direction: Direction,
    ) -> EngineResult<()> {
        let changes = ordering::reorder(&self.index, source, target, direction)?;
        self.apply(changes).await
    }

    /// Move an issue under a new parent, cascading status on the chains it
    /// leaves and joins.
    pub async fn reparent(&mut self, id: IssueId, new_parent: Option<IssueId>) -> EngineResult<()> {
        let old_parent = self.index.require(id)?.parent;
        let mut changes = ordering::reparent(&self.index, id, new_parent)?;
        if changes.is_empty() {
            return Ok(());
        }
        self.with_move_cascade(&mut changes, id, old_parent)?;
        self.apply(changes).await
    }

    /// Detach an open issue from its parent, making it root-level.
    pub async fn remove_from_parent(&mut self, id: IssueId) -> EngineResult<()> {
        let old_parent = self.index.require(id)?.parent;
        let mut changes = ordering::remove_from_parent(&self.index, id)?;
        if changes.is_empty() {
            return Ok(());
        }
        self.with_move_cascade(&mut changes, id, old_parent)?;
        self.apply(changes).await
    }

    /// Delete an issue and its whole subtree.
    pub async fn delete(&mut self, id: IssueId) -> EngineResult<()> {
        let old_parent = self.index.require(id)?.parent;
        let mut changes = ordering::delete(&self.index, id)?;
        self.with_move_cascade(&mut changes, id, old_parent)?;
        self.apply(changes).await
    }

    fn draft_from(&self, spec: NewIssue) -> EngineResult<Issue> {
        if spec.title.trim().is_empty() {
            return Err(EngineError::Validation("a title is required".to_string()));
        }
        if let Some(pid) = spec.parent {
            self.index.require(pid)?;
        }
        let mut issue = Issue::new(self.project, spec.title);
        issue.notes = spec.notes;
        issue.parent = spec.parent;
        issue.kind = spec.kind;
        issue.importance = spec.importance;
        issue.urgency = spec.urgency;
        issue.difficulty = spec.difficulty;
        issue.effort = spec.effort;
        Ok(issue)
    }

    /// Merge the status cascade an ordering change may have triggered,
    /// evaluated against the post-change state.
    fn with_move_cascade(
        &self,
        changes: &mut ChangeSet,
        moved: IssueId,
        old_parent: Option<IssueId>,
    ) -> EngineResult<()> {
        let preview = self.index.with_changes(changes);
        let follow_up =
            cascade::reconcile_after_move(&preview, moved, old_parent, chrono::Utc::now())?;
        changes.merge(follow_up);
        Ok(())
    }

    /// Commit one change set atomically and refresh the snapshot from the
    /// confirmed subscription. A failed commit leaves the index untouched.
    async fn apply(&mut self, mut changes: ChangeSet) -> EngineResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        changes.stamp(chrono::Utc::now());
        self.storage
            .commit(self.project, &changes)
            .await
            .map_err(persistence)?;
        self.refresh();
        Ok(())
    }

    /// Rebuild the index from the latest confirmed snapshot, if one has
    /// arrived since the last look.
    fn refresh(&mut self) {
        if self.updates.has_changed().unwrap_or(false) {
            let snapshot = self.updates.borrow_and_update().clone();
            self.index = ForestIndex::build(snapshot);
        }
    }

    /// The committed version of an issue, read back from the refreshed
    /// snapshot.
    fn committed(&self, id: IssueId) -> EngineResult<Issue> {
        Ok(self.index.require(id)?.clone())
    }
}

fn persistence(err: thicket_storage::StorageError) -> EngineError {
    EngineError::Persistence(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket_core::Status;
    use thicket_storage::MemoryStorage;

    async fn coordinator() -> MutationCoordinator<MemoryStorage> {
        MutationCoordinator::open(MemoryStorage::new(), ProjectId::new())
            .await
            .unwrap()
    }

    fn spec(title: &str) -> NewIssue {
        NewIssue {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn child_spec(title: &str, parent: IssueId) -> NewIssue {
        NewIssue {
            title: title.to_string(),
            parent: Some(parent),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_issue_commits_and_refreshes() {
        let mut coord = coordinator().await;
        let issue = coord.create_issue(spec("hello")).await.unwrap();
        assert_eq!(coord.index().len(), 1);
        assert_eq!(coord.index().get(issue.id).unwrap().title, "hello");
    }

    #[tokio::test]
    async fn test_create_issue_requires_title() {
        let mut coord = coordinator().await;
        let result = coord.create_issue(spec("  ")).await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert!(coord.index().is_empty());
    }

    #[tokio::test]
    async fn test_create_child_updates_parent_children() {
        let mut coord = coordinator().await;
        let parent = coord.create_issue(spec("parent")).await.unwrap();
        let child = coord.create_issue(child_spec("child", parent.id)).await.unwrap();
        assert_eq!(
            coord.index().get(parent.id).unwrap().children,
            vec![child.id]
        );
        assert_eq!(coord.index().get(child.id).unwrap().parent, Some(parent.id));
    }

    #[tokio::test]
    async fn test_resolve_and_reopen_end_to_end() {
        let mut coord = coordinator().await;
        let parent = coord.create_issue(spec("parent")).await.unwrap();
        let a = coord.create_issue(child_spec("a", parent.id)).await.unwrap();
        let b = coord.create_issue(child_spec("b", parent.id)).await.unwrap();

        coord.resolve(a.id).await.unwrap();
        coord.resolve(b.id).await.unwrap();
        assert_eq!(
            coord.index().get(parent.id).unwrap().status,
            Status::Resolved
        );

        coord.reopen(b.id).await.unwrap();
        assert_eq!(coord.index().get(parent.id).unwrap().status, Status::Open);
        assert_eq!(coord.index().get(a.id).unwrap().status, Status::Resolved);
    }

    #[tokio::test]
    async fn test_ordering_end_to_end() {
        let mut coord = coordinator().await;
        let a = coord.create_issue(spec("a")).await.unwrap();
        let b = coord.create_issue(spec("b")).await.unwrap();

        coord.convert_to_ordered(a.id).await.unwrap();
        coord.convert_to_ordered(b.id).await.unwrap();
        let order: Vec<IssueId> = coord
            .index()
            .ordered_children(None)
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(order, vec![a.id, b.id]);

        coord.move_down(a.id).await.unwrap();
        let order: Vec<IssueId> = coord
            .index()
            .ordered_children(None)
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(order, vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_reparent_resolves_emptied_parent() {
        let mut coord = coordinator().await;
        let old = coord.create_issue(spec("old")).await.unwrap();
        let done = coord.create_issue(child_spec("done", old.id)).await.unwrap();
        let moving = coord.create_issue(child_spec("moving", old.id)).await.unwrap();
        let target = coord.create_issue(spec("target")).await.unwrap();

        coord.resolve(done.id).await.unwrap();
        coord.reparent(moving.id, Some(target.id)).await.unwrap();

        // The old parent's remaining children are all resolved.
        assert_eq!(coord.index().get(old.id).unwrap().status, Status::Resolved);
        assert_eq!(
            coord.index().get(moving.id).unwrap().parent,
            Some(target.id)
        );
    }

    #[tokio::test]
    async fn test_delete_removes_subtree() {
        let mut coord = coordinator().await;
        let root = coord.create_issue(spec("root")).await.unwrap();
        let child = coord.create_issue(child_spec("child", root.id)).await.unwrap();
        let grandchild = coord
            .create_issue(child_spec("grandchild", child.id))
            .await
            .unwrap();

        coord.delete(child.id).await.unwrap();
        assert!(coord.index().get(child.id).is_none());
        assert!(coord.index().get(grandchild.id).is_none());
        assert!(coord.index().get(root.id).unwrap().children.is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_index_untouched() {
        struct FailingStorage(MemoryStorage);

        #[async_trait::async_trait]
        impl Storage for FailingStorage {
            async fn load_all(
                &self,
                project: ProjectId,
            ) -> thicket_storage::Result<Vec<Issue>> {
                self.0.load_all(project).await
            }

            async fn commit(
                &mut self,
                _project: ProjectId,
                _changes: &ChangeSet,
            ) -> thicket_storage::Result<()> {
                Err(thicket_storage::StorageError::Other(
                    "disk on fire".to_string(),
                ))
            }

            async fn subscribe(
                &self,
                project: ProjectId,
            ) -> thicket_storage::Result<watch::Receiver<Vec<Issue>>> {
                self.0.subscribe(project).await
            }

            async fn create_project(
                &mut self,
                name: &str,
            ) -> thicket_storage::Result<thicket_core::Project> {
                self.0.create_project(name).await
            }

            async fn list_projects(&self) -> thicket_storage::Result<Vec<thicket_core::Project>> {
                self.0.list_projects().await
            }
        }

        let mut coord =
            MutationCoordinator::open(FailingStorage(MemoryStorage::new()), ProjectId::new())
                .await
                .unwrap();
        let result = coord.create_issue(spec("never lands")).await;
        assert!(matches!(result, Err(EngineError::Persistence(_))));
        assert!(coord.index().is_empty());
    }

    #[tokio::test]
    async fn test_update_issue_changes_rank() {
        let mut coord = coordinator().await;
        let issue = coord.create_issue(spec("tune me")).await.unwrap();
        assert_eq!(issue.rank(), 0);

        let patch = IssuePatch {
            importance: thicket_core::Patch::Set(Importance::High),
            ..Default::default()
        };
        let updated = coord.update_issue(issue.id, patch).await.unwrap();
        assert_eq!(updated.rank(), 12);
    }
}
