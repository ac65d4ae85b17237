use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::status::JobStatus;

/// Response returned by `POST /api/v1/<job_type>/jobs`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn pending(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            result_url: None,
            error: None,
        }
    }
}

/// Response returned by `GET /api/v1/jobs/{job_id}`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

/// Shape we accept for `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub components: HealthComponents,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthComponents {
    pub registry: &'static str,
    pub queue: &'static str,
    pub host: &'static str,
}
