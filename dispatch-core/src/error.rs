use thiserror::Error;
use uuid::Uuid;

/// Errors from the Postgres-backed registry and queue. These are the `Transient` kind
/// in the broader error taxonomy: callers retry (worker: next delivery; orchestrator:
/// surface 503) rather than treat them as permanent.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to (de)serialize job payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no job record found for {0}")]
    UnknownJob(Uuid),

    #[error("no queue message found with id {0}")]
    UnknownMessage(i64),

    #[error("host control request failed: {0}")]
    HostControl(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
