use std::time::Duration;

use envconfig::Envconfig;

/// The idle detector's configuration surface. `IDLE_SAMPLE`/`IDLE_PERIODS` are
/// spec.md §6's T_sample/N; `DATABASE_URL`/`QUEUE_NAME`/`HOST_ID`/`HOST_CONTROL_URL`
/// mirror the orchestrator's concrete Postgres-backed stand-in for the abstract
/// `QUEUE_URL`/`REGISTRY_TABLE` keys (see SPEC_FULL.md).
#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "8082")]
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

    /// V: needed to construct the shared `WorkQueue` handle; the detector never
    /// leases messages itself, only reads the visible-depth gauge.
    #[envconfig(from = "VISIBILITY_TIMEOUT", default = "300")]
    pub visibility_timeout_seconds: i64,

    #[envconfig(from = "MAX_RECEIVES", default = "3")]
    pub max_receives: i32,

    /// T_sample: how often the depth gauge is sampled.
    #[envconfig(from = "IDLE_SAMPLE", default = "300")]
    pub idle_sample_seconds: u64,

    /// N: consecutive samples at or below the threshold required to fire.
    #[envconfig(from = "IDLE_PERIODS", default = "6")]
    pub idle_periods: usize,

    /// theta: the depth threshold a sample must be at or under to count.
    #[envconfig(from = "IDLE_THRESHOLD", default = "0")]
    pub idle_threshold: i64,

    #[envconfig(from = "MAX_PG_CONNECTIONS", default = "2")]
    pub max_pg_connections: u32,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn host_control_timeout(&self) -> Duration {
        Duration::from_secs(self.host_control_timeout_seconds)
    }

    pub fn visibility_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.visibility_timeout_seconds)
    }

    pub fn idle_sample_interval(&self) -> Duration {
        Duration::from_secs(self.idle_sample_seconds)
    }

    pub fn pool_config(&self) -> dispatch_core::PoolConfig {
        let mut pool_config = dispatch_core::PoolConfig::new(self.database_url.clone());
        pool_config.max_connections = Some(self.max_pg_connections);
        pool_config
    }
}
