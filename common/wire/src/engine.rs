use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The inference engine's reply to a submit call: `POST <submit_url>` with
/// `request_body` verbatim as the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSubmitResponse {
    pub job_id: String,
    pub status: EngineStatus,
}

/// The inference engine's reply to `GET <status_url>/<engine_job_id>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatusResponse {
    pub status: EngineStatus,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EngineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineStatus::Completed | EngineStatus::Failed)
    }
}

/// Where to send `request_body` and where to poll for a given job type. One pair per
/// `JobType` variant, read from configuration rather than hardcoded, since each
/// deployment points at its own inference host.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineRoute {
    pub submit_url: String,
    pub status_url: String,
}

pub type EngineRequestBody = Value;
