use chrono::Duration;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::ops::queue;
use crate::types::ReceivedMessage;

/// C2: at-least-once message delivery with a per-message visibility lease and a
/// dead-letter sink, backed by `queue_messages`/`dead_letter_messages`.
///
/// The queue preserves neither ordering nor uniqueness (spec.md §3); nothing in this
/// type assumes otherwise.
#[derive(Clone)]
pub struct WorkQueue {
    pool: PgPool,
    queue_name: String,
    visibility_timeout: Duration,
    max_receives: i32,
}

impl WorkQueue {
    pub fn new(
        pool: PgPool,
        queue_name: impl Into<String>,
        visibility_timeout: Duration,
        max_receives: i32,
    ) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
            visibility_timeout,
            max_receives,
        }
    }

    pub async fn enqueue(&self, job_id: Uuid, job_type: &str, request_body: &Value) -> Result<()> {
        queue::enqueue(&self.pool, &self.queue_name, job_id, job_type, request_body).await
    }

    /// Sweeps exhausted messages to the dead-letter sink, then tries to claim one
    /// visible message. Returns `None` if nothing is claimable right now; the caller
    /// (the worker run loop) is responsible for the long-poll wait between calls.
    pub async fn receive(&self) -> Result<Option<ReceivedMessage>> {
        queue::sweep_dead_letters(&self.pool, &self.queue_name, self.max_receives).await?;
        queue::try_receive(&self.pool, &self.queue_name, self.visibility_timeout).await
    }

    pub async fn extend_visibility(&self, message_id: i64, extra: Duration) -> Result<()> {
        queue::extend_visibility(&self.pool, message_id, extra).await
    }

    /// Acknowledge (delete) a message. Idempotent - deleting an already-gone id is a
    /// no-op, since duplicate deliveries may race to ack the same row.
    pub async fn ack(&self, message_id: i64) -> Result<()> {
        queue::delete(&self.pool, message_id).await
    }

    /// The gauge the idle detector samples: messages that are not currently held
    /// under an unexpired lease.
    pub async fn visible_depth(&self) -> Result<i64> {
        queue::visible_depth(&self.pool, &self.queue_name).await
    }

    pub async fn dead_letter_depth(&self) -> Result<i64> {
        queue::dead_letter_depth(&self.pool, &self.queue_name).await
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }
}
