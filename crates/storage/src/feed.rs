//! Per-scope change notification channels shared by the backends.

use std::collections::HashMap;

use thicket_core::{Issue, ProjectId};
use tokio::sync::{watch, Mutex};

/// One watch channel per project scope, created lazily on first subscribe.
/// The sender always holds the latest confirmed snapshot.
pub(crate) struct SnapshotFeed {
    senders: Mutex<HashMap<ProjectId, watch::Sender<Vec<Issue>>>>,
}

impl SnapshotFeed {
    pub(crate) fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a scope. `current` seeds the channel if this is the
    /// first subscriber; an existing channel already holds the latest
    /// confirmed snapshot and keeps it.
    pub(crate) async fn subscribe(
        &self,
        project: ProjectId,
        current: Vec<Issue>,
    ) -> watch::Receiver<Vec<Issue>> {
        let mut senders = self.senders.lock().await;
        senders
            .entry(project)
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    /// Publish a confirmed snapshot to the scope's subscribers, if any.
    pub(crate) async fn publish(&self, project: ProjectId, snapshot: Vec<Issue>) {
        let senders = self.senders.lock().await;
        if let Some(sender) = senders.get(&project) {
            let _ = sender.send(snapshot);
        }
    }
}
