use std::collections::HashMap;
use std::time::Duration;

use dispatch_wire::EngineRoute;
use envconfig::Envconfig;

/// The worker adapter's configuration surface. Field names track spec.md §6; W/P/D/R
/// are the long-poll wait, poll interval, per-job deadline and max-receives spec.md
/// defines. `ENGINE_ROUTES` is additive: the inference engine's URLs are an external
/// fact this deployment must supply, spec.md only describes their shape (§6).
#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8081")]
    pub port: u16,

    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "QUEUE_NAME", default = "default")]
    pub queue_name: String,

    /// V: visibility lease duration.
    #[envconfig(from = "VISIBILITY_TIMEOUT", default = "300")]
    pub visibility_timeout_seconds: i64,

    /// W: long-poll wait between empty receive attempts.
    #[envconfig(from = "RECEIVE_WAIT", default = "20")]
    pub receive_wait_seconds: u64,

    /// P: engine status poll interval.
    #[envconfig(from = "POLL_INTERVAL", default = "2")]
    pub poll_interval_seconds: u64,

    /// D: local deadline for one job's worker-side effort.
    #[envconfig(from = "JOB_DEADLINE", default = "600")]
    pub job_deadline_seconds: i64,

    /// R: deliveries before a message is dead-lettered.
    #[envconfig(from = "MAX_RECEIVES", default = "3")]
    pub max_receives: i32,

    #[envconfig(from = "ENGINE_REQUEST_TIMEOUT_SECONDS", default = "30")]
    pub engine_request_timeout_seconds: u64,

    /// JSON map of job_type -> {submit_url, status_url}.
    #[envconfig(from = "ENGINE_ROUTES")]
    pub engine_routes_json: String,

    #[envconfig(from = "MAX_PG_CONNECTIONS", default = "5")]
    pub max_pg_connections: u32,
}

impl Config {
    pub fn visibility_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.visibility_timeout_seconds)
    }

    pub fn receive_wait(&self) -> Duration {
        Duration::from_secs(self.receive_wait_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn job_deadline(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.job_deadline_seconds)
    }

    pub fn engine_request_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_request_timeout_seconds)
    }

    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pool_config(&self) -> dispatch_core::PoolConfig {
        let mut pool_config = dispatch_core::PoolConfig::new(self.database_url.clone());
        pool_config.max_connections = Some(self.max_pg_connections);
        pool_config
    }

    pub fn parse_engine_routes(&self) -> HashMap<String, EngineRoute> {
        serde_json::from_str(&self.engine_routes_json)
            .expect("ENGINE_ROUTES must be a JSON object of job_type -> {submit_url, status_url}")
    }
}
