//! Domain models for generation jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One generation request as it moves through the workflow. Owned
/// exclusively by the engine execution driving it; once terminal it no
/// longer changes.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub prompt: String,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatus,
    pub result_path: Option<PathBuf>,
    pub failure_reason: Option<String>,
}

impl GenerationJob {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            submitted_at: Utc::now(),
            status: JobStatus::Pending,
            result_path: None,
            failure_reason: None,
        }
    }

    pub fn mark_running(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Running;
        }
    }

    pub fn succeed(&mut self, path: PathBuf) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Succeeded;
        self.result_path = Some(path);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.failure_reason = Some(reason.into());
    }
}
