//! Core dispatch primitives shared by the orchestrator, worker adapter and idle
//! detector binaries: C1 (`JobRegistry`), C2 (`WorkQueue`) and C3
//! (`HostController`), plus the Postgres schema that backs C1/C2.
//!
//! Nothing in this crate runs an HTTP server or a loop; it is a library of
//! injectable clients, per spec.md §9's "avoid global singletons" rule.

mod ops;

mod config;
pub use config::PoolConfig;

mod error;
pub use error::{DispatchError, Result};

mod types;
pub use types::{HostState, JobRecord, ReceivedMessage};

mod registry;
pub use registry::JobRegistry;

mod queue;
pub use queue::WorkQueue;

mod host;
pub use host::{HostController, HttpHostController};

use sqlx::PgPool;

/// Applies the latest schema migrations. Failure to migrate is purposefully fatal -
/// every binary calls this once at startup and panics if it errors, the same
/// contract `cyclotron_core::ops::meta::run_migrations` makes.
pub async fn run_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .expect("failed to run dispatch-core migrations");
}
