use thiserror::Error;

/// Errors from calling the inference engine's submit/status endpoints. Both are the
/// `Transient` kind in spec.md §7's taxonomy: the run loop absorbs them by not
/// acknowledging the message, letting the queue redeliver.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("no engine route configured for job_type {0}")]
    UnknownRoute(String),
}
