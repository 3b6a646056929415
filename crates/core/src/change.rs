//! Change sets - the atomic output of every mutation.
//!
//! Engines never touch storage. Each operation computes the full set of
//! entities to upsert and delete, and the coordinator hands that set to the
//! persistence layer as one atomic call.

use crate::id::IssueId;
use crate::issue::{Difficulty, Effort, Importance, Issue, Kind, Urgency};
use crate::Time;

/// The atomic bundle of entity writes produced by one logical operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Issues to create or replace, whole-entity
    pub upserts: Vec<Issue>,

    /// Issues to remove
    pub deletes: Vec<IssueId>,
}

impl ChangeSet {
    /// An empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this change set writes nothing.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Add or replace an upsert for the same issue id.
    pub fn upsert(&mut self, issue: Issue) {
        if let Some(existing) = self.upserts.iter_mut().find(|i| i.id == issue.id) {
            *existing = issue;
        } else {
            self.upserts.push(issue);
        }
    }

    /// Mark an issue for deletion. Drops any pending upsert for the same id.
    pub fn delete(&mut self, id: IssueId) {
        self.upserts.retain(|i| i.id != id);
        if !self.deletes.contains(&id) {
            self.deletes.push(id);
        }
    }

    /// Look up a pending upsert by id.
    pub fn upserted(&self, id: IssueId) -> Option<&Issue> {
        self.upserts.iter().find(|i| i.id == id)
    }

    /// Fold another change set into this one. Later writes win per id.
    pub fn merge(&mut self, other: ChangeSet) {
        for issue in other.upserts {
            if self.deletes.contains(&issue.id) {
                continue;
            }
            self.upsert(issue);
        }
        for id in other.deletes {
            self.delete(id);
        }
    }

    /// Stamp every touched entity with the write time.
    pub fn stamp(&mut self, now: Time) {
        for issue in &mut self.upserts {
            issue.updated_at = now;
        }
    }

    /// Apply this change set to a flat issue collection: upserts replace or
    /// append whole entities, deletes remove them.
    pub fn apply_to(&self, issues: &mut Vec<Issue>) {
        for up in &self.upserts {
            match issues.iter_mut().find(|i| i.id == up.id) {
                Some(slot) => *slot = up.clone(),
                None => issues.push(up.clone()),
            }
        }
        issues.retain(|i| !self.deletes.contains(&i.id));
    }
}

/// A field edit: keep the current value, set a new one, or clear it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Patch<T> {
    /// Leave the field as it is
    #[default]
    Keep,
    /// Replace the field value
    Set(T),
    /// Unset the field
    Clear,
}

impl<T> Patch<T> {
    /// Apply this edit to an optional field.
    pub fn apply(self, field: &mut Option<T>) {
        match self {
            Self::Keep => {}
            Self::Set(value) => *field = Some(value),
            Self::Clear => *field = None,
        }
    }
}

/// A partial edit of an issue's descriptive and ordinal fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePatch {
    /// New title, if any
    pub title: Option<String>,

    /// New notes, if any
    pub notes: Option<String>,

    /// Kind edit
    pub kind: Patch<Kind>,

    /// Importance edit
    pub importance: Patch<Importance>,

    /// Urgency edit
    pub urgency: Patch<Urgency>,

    /// Difficulty edit
    pub difficulty: Patch<Difficulty>,

    /// Effort edit
    pub effort: Patch<Effort>,
}

impl IssuePatch {
    /// Whether the patch edits nothing.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the patch to an issue in place.
    pub fn apply(&self, issue: &mut Issue) {
        if let Some(title) = &self.title {
            issue.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            issue.notes = notes.clone();
        }
        self.kind.apply(&mut issue.kind);
        self.importance.apply(&mut issue.importance);
        self.urgency.apply(&mut issue.urgency);
        self.difficulty.apply(&mut issue.difficulty);
        self.effort.apply(&mut issue.effort);
    }
}
