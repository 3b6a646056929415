//! Storage trait abstraction.

use async_trait::async_trait;
use thicket_core::{ChangeSet, Issue, Project, ProjectId};
use tokio::sync::watch;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for issue forests.
///
/// A backend only has to support whole-entity upserts and deletes; the
/// engine never asks for relational transactions. The one hard requirement
/// is that `commit` applies a whole change set atomically: all upserts and
/// deletes land together or not at all.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load every issue in a project scope.
    async fn load_all(&self, project: ProjectId) -> Result<Vec<Issue>>;

    /// Atomically apply one change set to a project scope.
    ///
    /// On success, subscribers of the scope receive the new confirmed
    /// snapshot before this call returns.
    async fn commit(&mut self, project: ProjectId, changes: &ChangeSet) -> Result<()>;

    /// Subscribe to confirmed snapshots of a project scope.
    ///
    /// The receiver starts out holding the current snapshot and is updated
    /// after every successful commit.
    async fn subscribe(&self, project: ProjectId) -> Result<watch::Receiver<Vec<Issue>>>;

    // === Project registry ===

    /// Create a project.
    async fn create_project(&mut self, name: &str) -> Result<Project>;

    /// List all projects.
    async fn list_projects(&self) -> Result<Vec<Project>>;
}
