//! Scrape job lifecycle records managed by the agent coordinator.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of a coordinator-managed scrape job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Stable string form used for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(anyhow!("invalid job status: {other}")),
        }
    }
}

/// One bounded unit of coordinator-managed work: a single scrape run for a
/// single store, with its bookkeeping counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentJob {
    pub id: String,
    pub agent_name: String,
    pub target_store: String,
    pub operation_type: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub items_processed: u32,
    pub items_updated: u32,
    pub items_new: u32,
    pub error_message: Option<String>,
}

impl AgentJob {
    /// Create a freshly started scrape job in `Running` state.
    pub fn start(agent_name: &str, target_store: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            agent_name: agent_name.to_string(),
            target_store: target_store.to_string(),
            operation_type: "scrape".to_string(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            items_processed: 0,
            items_updated: 0,
            items_new: 0,
            error_message: None,
        }
    }

    pub fn complete(&mut self, processed: u32, updated: u32, new: u32) {
        self.status = JobStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.items_processed = processed;
        self.items_updated = updated;
        self.items_new = new;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(message.into());
    }

    /// Wall-clock duration, up to now for jobs still running.
    pub fn duration_ms(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}
