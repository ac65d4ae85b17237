use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::JobRecord;
use dispatch_wire::JobStatus;

/// Insert a fresh record in `Pending` state. Called once, by the orchestrator, before
/// the matching queue message is ever emitted.
pub async fn create_pending(
    pool: &PgPool,
    job_id: Uuid,
    job_type: &str,
    request_body: &Value,
    ttl: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO job_records
            (job_id, status, job_type, request_body, created_at, updated_at, ttl)
        VALUES
            ($1, 'pending', $2, $3, NOW(), NOW(), $4)
        "#,
    )
    .bind(job_id)
    .bind(job_type)
    .bind(request_body)
    .bind(ttl)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &PgPool, job_id: Uuid) -> Result<Option<JobRecord>> {
    let record = sqlx::query_as::<_, JobRecord>("SELECT * FROM job_records WHERE job_id = $1")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    Ok(record)
}

/// Unconditionally fail a record that was just written but never successfully queued.
/// This is the orchestrator's "don't leak a pending-but-unqueued record" guard; it is
/// still written as a conditional update so a pathological race with a worker that
/// somehow already completed the job can't be clobbered.
pub async fn fail_unqueued(pool: &PgPool, job_id: Uuid, error: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE job_records
        SET status = 'failed', error = $2, updated_at = NOW()
        WHERE job_id = $1 AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}

/// The worker's claim step: conditionally transition to `Processing` iff the record is
/// still `Pending` or `Processing`, bumping `attempts` and clearing any stale
/// `worker_job_id` from a previous delivery. Returns `None` if the record is already
/// terminal or missing, which the caller treats as an idempotent skip.
pub async fn claim(pool: &PgPool, job_id: Uuid) -> Result<Option<i32>> {
    let row: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE job_records
        SET status = 'processing', worker_job_id = NULL, attempts = attempts + 1, updated_at = NOW()
        WHERE job_id = $1 AND status IN ('pending', 'processing')
        RETURNING attempts
        "#,
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(attempts,)| attempts))
}

pub async fn set_worker_job_id(pool: &PgPool, job_id: Uuid, worker_job_id: &str) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE job_records
        SET worker_job_id = $2, updated_at = NOW()
        WHERE job_id = $1 AND status = 'processing'
        "#,
    )
    .bind(job_id)
    .bind(worker_job_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Commit a terminal state. The `status NOT IN (...)` guard is what makes this safe
/// under at-least-once delivery: whichever delivery commits first wins, and a later,
/// slower duplicate's commit is silently dropped rather than overwriting the result.
/// Returns whether this call was the one that actually committed.
pub async fn commit_completed(pool: &PgPool, job_id: Uuid, result_uri: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE job_records
        SET status = 'completed', result_uri = $2, error = NULL, updated_at = NOW()
        WHERE job_id = $1 AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(job_id)
    .bind(result_uri)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn commit_failed(pool: &PgPool, job_id: Uuid, error: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE job_records
        SET status = 'failed', error = $2, result_uri = NULL, updated_at = NOW()
        WHERE job_id = $1 AND status NOT IN ('completed', 'failed')
        "#,
    )
    .bind(job_id)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Administrative scan by `(status, created_at)`, backed by the secondary index
/// described in the persisted state layout. Not used by the hot path.
pub async fn scan_by_status(
    pool: &PgPool,
    status: JobStatus,
    limit: i64,
) -> Result<Vec<JobRecord>> {
    let records = sqlx::query_as::<_, JobRecord>(
        "SELECT * FROM job_records WHERE status = $1 ORDER BY created_at ASC LIMIT $2",
    )
    .bind(status)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

/// Reap records well past their TTL. Run out-of-band (see the idle detector binary);
/// never touches a record's client-visible status.
pub async fn reap_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM job_records WHERE ttl IS NOT NULL AND ttl <= NOW()")
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
