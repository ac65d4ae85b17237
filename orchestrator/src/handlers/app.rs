use axum::routing::{get, post};
use axum::Router;

use crate::app_context::AppContext;

use super::{health, jobs};

pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/api/v1/:job_type/jobs", post(jobs::submit))
        .route("/api/v1/jobs/:job_id", get(jobs::get_status))
        .route("/health", get(health::health))
        .with_state(ctx)
}
