use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one edit job. Transitions only move forward:
/// Queued -> Running -> Succeeded | Failed. A job that will never be
/// claimed by a worker (admission rejected its enqueue) fails straight
/// from Queued.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

/// Parameters the submitter supplied (or defaulted) at admission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub guidance_scale: f32,
    pub seed: Option<u64>,
    /// Number of source images attached at admission (1..=3).
    pub image_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// 0..=100, non-decreasing while running.
    pub progress: f32,
    pub params: JobParams,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
    /// Artifact reference (file name in the result store), set on success.
    pub result: Option<String>,
}

impl Job {
    pub fn new(params: JobParams) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            status: JobStatus::Queued,
            progress: 0.0,
            params,
            created_at: Utc::now(),
            error: None,
            result: None,
        }
    }

    /// Merge a partial update. Status only ever advances; an update
    /// carrying an illegal transition is dropped whole, so a stale writer
    /// can't leave fields like `error` on a record whose status it failed
    /// to move. Success forces progress to 100, failure leaves it at the
    /// last reported value.
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(next) = update.status {
            if !self.status.can_advance_to(next) {
                return;
            }
            self.status = next;
        }
        if let Some(progress) = update.progress {
            if progress >= self.progress {
                self.progress = progress;
            }
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        if self.status == JobStatus::Succeeded {
            self.progress = 100.0;
        }
    }
}

/// Partial field merge for [`Job::apply`]; unset fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<f32>,
    pub error: Option<String>,
    pub result: Option<String>,
}

impl JobUpdate {
    pub fn running() -> Self {
        Self {
            status: Some(JobStatus::Running),
            progress: Some(0.0),
            ..Self::default()
        }
    }

    pub fn progress(progress: f32) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn succeeded(result: String) -> Self {
        Self {
            status: Some(JobStatus::Succeeded),
            progress: Some(100.0),
            result: Some(result),
            ..Self::default()
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error),
            ..Self::default()
        }
    }
}
