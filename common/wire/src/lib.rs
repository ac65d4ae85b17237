//! Wire types shared by the orchestrator, worker and idle detector: the HTTP envelopes
//! clients see, the inference engine contract, and the small enums (`JobType`,
//! `JobStatus`) that travel through all of them.

mod api;
mod engine;
mod job_type;
mod status;

pub use api::{ErrorBody, HealthComponents, HealthResponse, StatusResponse, SubmitResponse};
pub use engine::{EngineRequestBody, EngineRoute, EngineStatus, EngineStatusResponse, EngineSubmitResponse};
pub use job_type::{JobType, ParseJobTypeError};
pub use status::{JobStatus, ParseJobStatusError};
