//! In-memory storage backend.
//!
//! Ephemeral implementation suitable for tests, embedding, and short-lived
//! sessions. Same commit/notify semantics as the JSON backend, no disk.

use std::collections::HashMap;

use thicket_core::{ChangeSet, Issue, Project, ProjectId};
use tokio::sync::{watch, Mutex};

use crate::feed::SnapshotFeed;
use crate::trait_::{Result, Storage, StorageError};

/// Inner storage structure (guarded by the outer mutex).
#[derive(Default)]
struct MemoryStorageInner {
    /// Issue forests keyed by project scope
    issues: HashMap<ProjectId, Vec<Issue>>,

    /// Project registry
    projects: Vec<Project>,
}

/// In-memory storage backend.
pub struct MemoryStorage {
    inner: Mutex<MemoryStorageInner>,
    feed: SnapshotFeed,
}

impl MemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryStorageInner::default()),
            feed: SnapshotFeed::new(),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn load_all(&self, project: ProjectId) -> Result<Vec<Issue>> {
        let inner = self.inner.lock().await;
        Ok(inner.issues.get(&project).cloned().unwrap_or_default())
    }

    async fn commit(&mut self, project: ProjectId, changes: &ChangeSet) -> Result<()> {
        let snapshot = {
            let mut inner = self.inner.lock().await;
            let issues = inner.issues.entry(project).or_default();
            changes.apply_to(issues);
            issues.clone()
        };
        self.feed.publish(project, snapshot).await;
        Ok(())
    }

    async fn subscribe(&self, project: ProjectId) -> Result<watch::Receiver<Vec<Issue>>> {
        let current = {
            let inner = self.inner.lock().await;
            inner.issues.get(&project).cloned().unwrap_or_default()
        };
        Ok(self.feed.subscribe(project, current).await)
    }

    async fn create_project(&mut self, name: &str) -> Result<Project> {
        let mut inner = self.inner.lock().await;
        if inner.projects.iter().any(|p| p.name == name) {
            return Err(StorageError::Other(format!(
                "project already exists: {name}"
            )));
        }
        let project = Project::new(name);
        inner.projects.push(project.clone());
        Ok(project)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let inner = self.inner.lock().await;
        Ok(inner.projects.clone())
    }
}
