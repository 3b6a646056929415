//! JSON file storage implementation.
//!
//! Stores each project's issue forest as a single JSON document under a
//! `.thicket` root, plus a small project registry. A commit rewrites the
//! whole document through a temp-file rename, which is what makes the
//! multi-entity change set atomic on disk.

use std::path::{Path, PathBuf};

use thicket_core::{ChangeSet, Issue, Project, ProjectId};
use tokio::fs;
use tokio::sync::watch;

use crate::feed::SnapshotFeed;
use crate::trait_::{Result, Storage, StorageError};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    feed: SnapshotFeed,
}

impl JsonStorage {
    /// Create storage rooted at the given directory. This creates the
    /// `issues/` subdirectory; it does not touch anything else in the root.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("issues")).await?;

        Ok(Self {
            root,
            feed: SnapshotFeed::new(),
        })
    }

    fn issues_path(&self, project: ProjectId) -> PathBuf {
        self.root.join("issues").join(format!("{}.json", project))
    }

    fn projects_path(&self) -> PathBuf {
        self.root.join("projects.json")
    }

    async fn read_issues(&self, project: ProjectId) -> Result<Vec<Issue>> {
        Ok(read_json(&self.issues_path(project)).await?.unwrap_or_default())
    }

    async fn read_projects(&self) -> Result<Vec<Project>> {
        Ok(read_json(&self.projects_path()).await?.unwrap_or_default())
    }

    /// Write `value` as pretty JSON through a temp file in the same
    /// directory, then rename over the target. Readers either see the old
    /// document or the new one, never a half-written file.
    async fn write_atomic<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn load_all(&self, project: ProjectId) -> Result<Vec<Issue>> {
        self.read_issues(project).await
    }

    async fn commit(&mut self, project: ProjectId, changes: &ChangeSet) -> Result<()> {
        let mut issues = self.read_issues(project).await?;
        changes.apply_to(&mut issues);
        self.write_atomic(&self.issues_path(project), &issues).await?;

        tracing::debug!(
            %project,
            upserts = changes.upserts.len(),
            deletes = changes.deletes.len(),
            "committed change set"
        );
        self.feed.publish(project, issues).await;
        Ok(())
    }

    async fn subscribe(&self, project: ProjectId) -> Result<watch::Receiver<Vec<Issue>>> {
        let current = self.read_issues(project).await?;
        Ok(self.feed.subscribe(project, current).await)
    }

    async fn create_project(&mut self, name: &str) -> Result<Project> {
        let mut projects = self.read_projects().await?;
        if projects.iter().any(|p| p.name == name) {
            return Err(StorageError::Other(format!(
                "project already exists: {name}"
            )));
        }
        let project = Project::new(name);
        projects.push(project.clone());
        self.write_atomic(&self.projects_path(), &projects).await?;
        Ok(project)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.read_projects().await
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
