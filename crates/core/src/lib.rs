//! Thicket core data models.
//!
//! This crate defines the issue forest: the `Issue` model with its explicit
//! sibling ordering pointers, the derived priority rank, and the change sets
//! that every mutation produces for atomic persistence.

#![warn(missing_docs)]

// Core identities
mod id;

// Issue forest
mod issue;
mod project;

// Derived ordering
pub mod rank;

// Mutation output
mod change;
mod error;

// Re-exports
pub use id::{IssueId, ProjectId};

pub use issue::{Difficulty, Effort, Importance, Issue, Kind, Status, Urgency};
pub use project::Project;

pub use change::{ChangeSet, IssuePatch, Patch};
pub use error::{EngineError, EngineResult};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
