use std::time::Duration;

use envconfig::Envconfig;

/// The orchestrator's configuration surface, collected once at startup into a single
/// immutable structure per spec.md §9. Field names track spec.md §6's enumerated
/// environment keys; `DATABASE_URL`/`QUEUE_NAME` are the concrete Postgres-backed
/// stand-in for the abstract `QUEUE_URL`/`REGISTRY_TABLE` contract (see
/// SPEC_FULL.md's "Persistence backend" section and DESIGN.md).
#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8080")]
    pub port: u16,

    #[envconfig(from = "DATABASE_URL")]
    pub database_url: String,

    #[envconfig(from = "QUEUE_NAME", default = "default")]
    pub queue_name: String,

    #[envconfig(from = "HOST_ID")]
    pub host_id: String,

    #[envconfig(from = "HOST_CONTROL_URL")]
    pub host_control_url: String,

    #[envconfig(from = "HOST_CONTROL_TIMEOUT_SECONDS", default = "10")]
    pub host_control_timeout_seconds: u64,

    /// V: the visibility lease duration queue messages are checked out with.
    #[envconfig(from = "VISIBILITY_TIMEOUT", default = "300")]
    pub visibility_timeout_seconds: i64,

    /// R: deliveries before a message is dead-lettered.
    #[envconfig(from = "MAX_RECEIVES", default = "3")]
    pub max_receives: i32,

    /// Records are given no TTL by default; set to opt every record into reaping.
    #[envconfig(from = "JOB_TTL_SECONDS")]
    pub job_ttl_seconds: Option<i64>,

    #[envconfig(from = "MAX_PG_CONNECTIONS", default = "10")]
    pub max_pg_connections: u32,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn pool_config(&self) -> dispatch_core::PoolConfig {
        let mut pool_config = dispatch_core::PoolConfig::new(self.database_url.clone());
        pool_config.max_connections = Some(self.max_pg_connections);
        pool_config
    }

    pub fn host_control_timeout(&self) -> Duration {
        Duration::from_secs(self.host_control_timeout_seconds)
    }

    pub fn visibility_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.visibility_timeout_seconds)
    }
}
