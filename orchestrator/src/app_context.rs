use std::sync::Arc;

use dispatch_core::{HostController, HttpHostController, JobRegistry, WorkQueue};
use sqlx::PgPool;

use crate::config::Config;

/// Everything a handler needs, constructed once in `main` and injected via axum
/// `State` - there is no global registry/queue/host singleton anywhere in this
/// binary, per spec.md §9's re-architecture note.
#[derive(Clone)]
pub struct AppContext {
    pub pool: PgPool,
    pub registry: JobRegistry,
    pub queue: WorkQueue,
    pub host: Arc<dyn HostController>,
    pub job_ttl_seconds: Option<i64>,
}

impl AppContext {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let registry = JobRegistry::new(pool.clone());
        let queue = WorkQueue::new(
            pool.clone(),
            config.queue_name.clone(),
            config.visibility_timeout(),
            config.max_receives,
        );
        let host: Arc<dyn HostController> = Arc::new(HttpHostController::new(
            config.host_control_url.clone(),
            config.host_id.clone(),
            config.host_control_timeout(),
        ));

        Self {
            pool,
            registry,
            queue,
            host,
            job_ttl_seconds: config.job_ttl_seconds,
        }
    }
}
