use chrono::{DateTime, Utc};
use dr_core::{Job, JobStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResponse {
    pub id: String,
    pub status: JobStatus,
    pub progress: f32,
    pub prompt: String,
    pub steps: u32,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
    /// Public URL of the artifact once it exists; internal paths are never
    /// exposed.
    pub result_url: Option<String>,
}

impl JobResponse {
    pub fn from_job(job: &Job, result_url: Option<String>) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            prompt: job.params.prompt.clone(),
            steps: job.params.steps,
            created_at: job.created_at,
            error: job.error.clone(),
            result_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
    pub model: String,
    pub model_loaded: bool,
    pub timeout_minutes: f64,
    pub minutes_since_last_request: f64,
    pub minutes_until_unload: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnloadResponse {
    pub previously_loaded: bool,
}
