use chrono::Duration;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::ReceivedMessage;

/// Append `{job_id, job_type, request_body}` to the named virtual queue. The queue
/// preserves neither ordering nor uniqueness across enqueues, so this is a bare insert.
pub async fn enqueue(
    pool: &PgPool,
    queue_name: &str,
    job_id: Uuid,
    job_type: &str,
    request_body: &Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO queue_messages (job_id, job_type, request_body, queue_name, enqueued_at, receive_count)
        VALUES ($1, $2, $3, $4, NOW(), 0)
        "#,
    )
    .bind(job_id)
    .bind(job_type)
    .bind(request_body)
    .bind(queue_name)
    .execute(pool)
    .await?;

    Ok(())
}

/// Move any message whose lease has lapsed `max_receives` times or more to the
/// dead-letter sink, so it is never handed out again. Cheap no-op when nothing
/// qualifies; called at the top of every receive attempt.
pub async fn sweep_dead_letters(pool: &PgPool, queue_name: &str, max_receives: i32) -> Result<u64> {
    let result = sqlx::query(
        r#"
        WITH moved AS (
            DELETE FROM queue_messages
            WHERE queue_name = $1
              AND lease_expires_at IS NOT NULL
              AND lease_expires_at <= NOW()
              AND receive_count >= $2
            RETURNING job_id, job_type, request_body, queue_name, enqueued_at, receive_count
        )
        INSERT INTO dead_letter_messages
            (job_id, job_type, request_body, queue_name, enqueued_at, receive_count, reason, dead_lettered_at)
        SELECT job_id, job_type, request_body, queue_name, enqueued_at, receive_count,
               'exceeded max receives', NOW()
        FROM moved
        "#,
    )
    .bind(queue_name)
    .bind(max_receives)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Try to claim a single visible message: either never-delivered, or whose visibility
/// lease has lapsed. Returns `None` immediately if nothing is claimable right now -
/// the caller (the worker's run loop) is responsible for the long-poll wait between
/// calls.
pub async fn try_receive(
    pool: &PgPool,
    queue_name: &str,
    visibility_timeout: Duration,
) -> Result<Option<ReceivedMessage>> {
    let row = sqlx::query_as::<_, ReceivedMessage>(
        r#"
        WITH candidate AS (
            SELECT id FROM queue_messages
            WHERE queue_name = $1
              AND (lease_expires_at IS NULL OR lease_expires_at <= NOW())
            ORDER BY enqueued_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE queue_messages
        SET lease_expires_at = NOW() + $2::interval, receive_count = receive_count + 1
        FROM candidate
        WHERE queue_messages.id = candidate.id
        RETURNING queue_messages.id, job_id, job_type, request_body, receive_count
        "#,
    )
    .bind(queue_name)
    .bind(visibility_timeout)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Push a message's visibility lease further into the future without changing its
/// receive count. Used when the adapter expects the engine call to run long past V.
pub async fn extend_visibility(pool: &PgPool, message_id: i64, extra: Duration) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE queue_messages
        SET lease_expires_at = lease_expires_at + $2::interval
        WHERE id = $1 AND lease_expires_at IS NOT NULL
        "#,
    )
    .bind(message_id)
    .bind(extra)
    .execute(pool)
    .await?;

    Ok(())
}

/// Acknowledge (delete) a message. Idempotent: deleting an already-gone id is a no-op,
/// which matters because duplicate deliveries may race to ack the same row.
pub async fn delete(pool: &PgPool, message_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM queue_messages WHERE id = $1")
        .bind(message_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Approximate visible depth: messages that are not currently held under an
/// unexpired lease. This is exactly the gauge the idle detector samples - in-flight
/// work never counts towards it.
pub async fn visible_depth(pool: &PgPool, queue_name: &str) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM queue_messages
        WHERE queue_name = $1 AND (lease_expires_at IS NULL OR lease_expires_at <= NOW())
        "#,
    )
    .bind(queue_name)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn dead_letter_depth(pool: &PgPool, queue_name: &str) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM dead_letter_messages WHERE queue_name = $1")
            .bind(queue_name)
            .fetch_one(pool)
            .await?;

    Ok(count)
}
