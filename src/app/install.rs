use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    Accepted,
    Dismissed,
}

/// A deferred install prompt offered by the host. Consumed by exactly one user action.
#[derive(Debug, PartialEq, Eq)]
pub struct InstallPrompt {
    id: uuid::Uuid,
    offered_at: DateTime<Utc>,
}

impl InstallPrompt {
    pub fn offered() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            offered_at: Utc::now(),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn offered_at(&self) -> DateTime<Utc> {
        self.offered_at
    }

    pub fn resolve(self, accepted: bool) -> InstallOutcome {
        let waited_ms = (Utc::now() - self.offered_at).num_milliseconds();
        tracing::info!(prompt = %self.id, accepted, waited_ms, "install prompt resolved");
        if accepted {
            InstallOutcome::Accepted
        } else {
            InstallOutcome::Dismissed
        }
    }
}

/// Holds at most one pending prompt; a newer offer replaces an unconsumed one.
#[derive(Debug, Default)]
pub struct InstallPromptSlot {
    pending: Mutex<Option<InstallPrompt>>,
}

impl InstallPromptSlot {
    pub fn offer(&self, prompt: InstallPrompt) -> uuid::Uuid {
        let id = prompt.id();
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *pending = Some(prompt);
        id
    }

    pub fn take(&self) -> Option<InstallPrompt> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}
