use chrono::{DateTime, Utc};
use dispatch_wire::JobStatus;
use serde_json::Value;
use uuid::Uuid;

/// The durable, single-source-of-truth job record (C1). Mutated only by the
/// orchestrator's initial write and the worker's processing/terminal writes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub job_type: String,
    pub request_body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result_uri: Option<String>,
    pub error: Option<String>,
    pub worker_job_id: Option<String>,
    pub attempts: i32,
    pub ttl: Option<DateTime<Utc>>,
}

/// A message pulled off the queue (C2). `receive_count` is the number of times this
/// row has been handed to a worker, including this delivery; it is what `MAX_RECEIVES`
/// is compared against.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceivedMessage {
    pub id: i64,
    pub job_id: Uuid,
    pub job_type: String,
    pub request_body: Value,
    pub receive_count: i32,
}

/// Host control plane state (C3). Only `Stopped` is a valid precondition for `start`;
/// only `Running` for `stop`. All other transitions are no-ops. Not persisted - this
/// is fetched live from the host control plane on every `describe()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HostState::Stopped => "stopped",
            HostState::Starting => "starting",
            HostState::Running => "running",
            HostState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}
