//! Issue model - the core unit of tracking in Thicket.

use serde::{Deserialize, Serialize};

use crate::id::{IssueId, ProjectId};
use crate::Time;

/// An issue in the forest.
///
/// Issues nest freely under one another. Within a sibling group an issue is
/// either *ordered* (its position fixed by the `after`/`before` pointers) or
/// *unordered* (its position derived from its computed rank).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// Unique identifier
    pub id: IssueId,

    /// Project this issue belongs to
    pub project: ProjectId,

    /// Issue title
    pub title: String,

    /// Free-form notes
    pub notes: String,

    /// Containing issue, `None` at root level
    pub parent: Option<IssueId>,

    /// Ids of child issues one level down. Must always equal the set of
    /// issues whose `parent` is this issue.
    pub children: Vec<IssueId>,

    /// Whether this issue holds an explicit position among its siblings
    pub ordered: bool,

    /// Id of the previous sibling in the ordered sublist, `None` at the head.
    /// Meaningful only when `ordered` is true.
    pub after: Option<IssueId>,

    /// Id of the next sibling in the ordered sublist, `None` at the tail.
    /// Meaningful only when `ordered` is true.
    pub before: Option<IssueId>,

    /// Current status
    pub status: Status,

    /// When the issue was closed
    pub closed_at: Option<Time>,

    /// When work on the issue started
    pub in_progress_from: Option<Time>,

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

    /// When created
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,
}

impl Issue {
    /// Create a new open, unordered, childless issue.
    pub fn new(project: ProjectId, title: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: IssueId::new(),
            project,
            title: title.into(),
            notes: String::new(),
            parent: None,
            children: Vec::new(),
            ordered: false,
            after: None,
            before: None,
            status: Status::Open,
            closed_at: None,
            in_progress_from: None,
            kind: None,
            importance: None,
            urgency: None,
            difficulty: None,
            effort: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived priority rank. Recomputed from the ordinal attributes on
    /// every call; never a source of truth for ordered siblings.
    pub fn rank(&self) -> u32 {
        crate::rank::score(self)
    }
}

/// Issue status.
///
/// Forward transitions are `Open -> InProgress -> Resolved`; `Resolved ->
/// Open` (reopen) is the only reverse transition. `Abandoned` and `WontFix`
/// are alternate terminal states reachable from any non-resolved state and
/// behave like `Resolved` for cascade purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Not yet started
    Open,
    /// Being worked on
    InProgress,
    /// Finished
    Resolved,
    /// Given up on
    Abandoned,
    /// Deliberately not done
    WontFix,
}

impl Status {
    /// Whether this status counts as closed for cascade purposes.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Resolved | Self::Abandoned | Self::WontFix)
    }

    /// Whether the issue is still being tracked (open or in progress).
    pub fn is_active(self) -> bool {
        !self.is_closed()
    }
}

/// What kind of issue this is. Variants are listed least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Kind {
    /// Something to maybe do one day
    Idea,
    /// Routine upkeep
    Chore,
    /// New functionality
    Feature,
    /// Something is broken
    Defect,
}

impl Kind {
    /// 1-based position in the allowed-values list, most severe highest.
    pub fn scale_index(self) -> u32 {
        match self {
            Self::Idea => 1,
            Self::Chore => 2,
            Self::Feature => 3,
            Self::Defect => 4,
        }
    }
}

/// How important an issue is. Variants are listed least important first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Importance {
    /// Nice to have
    Low,
    /// Should be done
    Medium,
    /// Must be done
    High,
}

impl Importance {
    /// 1-based position in the allowed-values list.
    pub fn scale_index(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// How urgent an issue is. Variants are listed least urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    /// Whenever
    Low,
    /// Soon
    Medium,
    /// Now
    High,
}

impl Urgency {
    /// 1-based position in the allowed-values list.
    pub fn scale_index(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

/// How hard an issue is expected to be. Variants are listed easiest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    /// Straightforward
    Easy,
    /// Takes some thought
    Medium,
    /// Genuinely hard
    Hard,
}

impl Difficulty {
    /// Position in the allowed-values list, taken directly (easier ranks
    /// lower, starting at zero).
    pub fn scale_index(self) -> u32 {
        match self {
            Self::Easy => 0,
            Self::Medium => 1,
            Self::Hard => 2,
        }
    }
}

/// Expected effort to finish an issue. Variants are listed shortest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effort {
    /// Done in one sitting
    Minutes,
    /// Done within a day
    Hours,
    /// A few days of work
    Days,
    /// A sustained stretch of work
    Weeks,
}

impl Effort {
    /// Position in the allowed-values list, taken directly (shorter ranks
    /// lower, starting at zero).
    pub fn scale_index(self) -> u32 {
        match self {
            Self::Minutes => 0,
            Self::Hours => 1,
            Self::Days => 2,
            Self::Weeks => 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_issue_lifecycle_defaults() {
        let issue = Issue::new(ProjectId::new(), "fix the roof");
        assert_eq!(issue.status, Status::Open);
        assert!(issue.children.is_empty());
        assert!(issue.parent.is_none());
        assert!(!issue.ordered);
        assert!(issue.after.is_none());
        assert!(issue.before.is_none());
        assert!(issue.closed_at.is_none());
        assert!(issue.in_progress_from.is_none());
        assert_eq!(issue.created_at, issue.updated_at);
    }

    #[test]
    fn test_status_closed_classification() {
        assert!(!Status::Open.is_closed());
        assert!(!Status::InProgress.is_closed());
        assert!(Status::Resolved.is_closed());
        assert!(Status::Abandoned.is_closed());
        assert!(Status::WontFix.is_closed());
    }

    #[test]
    fn test_issue_serde_round_trip() {
        let issue = Issue::new(ProjectId::new(), "serialize me");
        let json = serde_json::to_string(&issue).unwrap();
        let back: Issue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, issue);
    }
}
