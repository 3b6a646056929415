//! Project model - a named scope for one issue forest.

use serde::{Deserialize, Serialize};

use crate::id::ProjectId;
use crate::Time;

/// A project groups one forest of issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,

    /// Project name
    pub name: String,

    /// When created
    pub created_at: Time,
}

impl Project {
    /// Create a new project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ProjectId::new(),
            name: name.into(),
            created_at: chrono::Utc::now(),
        }
    }
}
