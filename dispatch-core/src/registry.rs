use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::ops::registry;
use crate::types::JobRecord;
use dispatch_wire::JobStatus;

/// C1: the durable, single-source-of-truth mapping from `job_id` to status record.
///
/// Constructed once per process from a `PgPool` and handed to the orchestrator's
/// handlers and the worker adapter's run loop as an explicit dependency, per the
/// "inject clients as constructor parameters" rule - there is no global registry
/// singleton anywhere in this workspace.
#[derive(Clone)]
pub struct JobRegistry {
    pool: PgPool,
}

impl JobRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Written once by the orchestrator, before the matching queue message exists.
    pub async fn create_pending(
        &self,
        job_id: Uuid,
        job_type: &str,
        request_body: &Value,
        ttl: Option<DateTime<Utc>>,
    ) -> Result<()> {
        registry::create_pending(&self.pool, job_id, job_type, request_body, ttl).await
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<JobRecord>> {
        registry::get(&self.pool, job_id).await
    }

    /// The orchestrator's "don't leak a pending-but-unqueued record" guard: called when
    /// the record write succeeded but the enqueue afterwards failed.
    pub async fn fail_unqueued(&self, job_id: Uuid, error: &str) -> Result<()> {
        registry::fail_unqueued(&self.pool, job_id, error).await
    }

    /// The worker's claim step. Returns the post-increment `attempts` count, or `None`
    /// if the record is already terminal or missing (an idempotent skip).
    pub async fn claim(&self, job_id: Uuid) -> Result<Option<i32>> {
        registry::claim(&self.pool, job_id).await
    }

    pub async fn set_worker_job_id(&self, job_id: Uuid, worker_job_id: &str) -> Result<()> {
        registry::set_worker_job_id(&self.pool, job_id, worker_job_id).await
    }

    /// Returns whether this call was the one that actually committed - `false` means a
    /// prior delivery already terminated the record and this write was a no-op.
    pub async fn commit_completed(&self, job_id: Uuid, result_uri: &str) -> Result<bool> {
        registry::commit_completed(&self.pool, job_id, result_uri).await
    }

    pub async fn commit_failed(&self, job_id: Uuid, error: &str) -> Result<bool> {
        registry::commit_failed(&self.pool, job_id, error).await
    }

    pub async fn scan_by_status(&self, status: JobStatus, limit: i64) -> Result<Vec<JobRecord>> {
        registry::scan_by_status(&self.pool, status, limit).await
    }

    /// Reaps records well past their TTL. Called from the idle detector's sampling
    /// loop rather than as a separate process (see SPEC_FULL.md).
    pub async fn reap_expired(&self) -> Result<u64> {
        registry::reap_expired(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[sqlx::test(migrations = "./migrations")]
    async fn create_then_get_round_trips(pool: PgPool) {
        let registry = JobRegistry::new(pool);
        let job_id = Uuid::now_v7();
        let body = json!({"image_url": "s3://b/in.jpg"});

        registry
            .create_pending(job_id, "camera-angle", &body, None)
            .await
            .unwrap();

        let record = registry.get(job_id).await.unwrap().unwrap();
        assert_eq!(record.job_id, job_id);
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.attempts, 0);
        assert!(record.result_uri.is_none());
        assert!(record.error.is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_job_is_none(pool: PgPool) {
        let registry = JobRegistry::new(pool);
        assert!(registry.get(Uuid::now_v7()).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn claim_then_commit_then_claim_again_is_noop(pool: PgPool) {
        let registry = JobRegistry::new(pool);
        let job_id = Uuid::now_v7();
        registry
            .create_pending(job_id, "camera-angle", &json!({}), None)
            .await
            .unwrap();

        let attempts = registry.claim(job_id).await.unwrap().unwrap();
        assert_eq!(attempts, 1);

        let committed = registry
            .commit_completed(job_id, "s3://b/out.jpg")
            .await
            .unwrap();
        assert!(committed);

        // A terminal record can never be re-claimed or re-committed.
        assert!(registry.claim(job_id).await.unwrap().is_none());
        let second_commit = registry.commit_failed(job_id, "late duplicate").await.unwrap();
        assert!(!second_commit);

        let record = registry.get(job_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result_uri.as_deref(), Some("s3://b/out.jpg"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn redelivery_bumps_attempts_monotonically(pool: PgPool) {
        let registry = JobRegistry::new(pool);
        let job_id = Uuid::now_v7();
        registry
            .create_pending(job_id, "camera-angle", &json!({}), None)
            .await
            .unwrap();

        let first = registry.claim(job_id).await.unwrap().unwrap();
        let second = registry.claim(job_id).await.unwrap().unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn fail_unqueued_does_not_clobber_a_terminal_record(pool: PgPool) {
        let registry = JobRegistry::new(pool);
        let job_id = Uuid::now_v7();
        registry
            .create_pending(job_id, "camera-angle", &json!({}), None)
            .await
            .unwrap();
        registry.claim(job_id).await.unwrap();
        registry
            .commit_completed(job_id, "s3://b/out.jpg")
            .await
            .unwrap();

        // A pathological race: something calls fail_unqueued after the job finished.
        registry.fail_unqueued(job_id, "enqueue failed").await.unwrap();

        let record = registry.get(job_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn scan_by_status_filters_orders_by_created_at_and_respects_limit(pool: PgPool) {
        let registry = JobRegistry::new(pool);

        let pending_a = Uuid::now_v7();
        let completed_id = Uuid::now_v7();
        let pending_b = Uuid::now_v7();
        let failed_id = Uuid::now_v7();

        registry.create_pending(pending_a, "camera-angle", &json!({}), None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.create_pending(completed_id, "camera-angle", &json!({}), None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.create_pending(pending_b, "camera-angle", &json!({}), None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        registry.create_pending(failed_id, "camera-angle", &json!({}), None).await.unwrap();

        registry.claim(completed_id).await.unwrap();
        registry.commit_completed(completed_id, "s3://b/out.jpg").await.unwrap();
        registry.claim(failed_id).await.unwrap();
        registry.commit_failed(failed_id, "OOM").await.unwrap();

        let pending = registry.scan_by_status(JobStatus::Pending, 10).await.unwrap();
        assert_eq!(
            pending.iter().map(|r| r.job_id).collect::<Vec<_>>(),
            vec![pending_a, pending_b]
        );

        let completed = registry.scan_by_status(JobStatus::Completed, 10).await.unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].job_id, completed_id);

        let failed = registry.scan_by_status(JobStatus::Failed, 10).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].job_id, failed_id);

        let limited = registry.scan_by_status(JobStatus::Pending, 1).await.unwrap();
        assert_eq!(
            limited.iter().map(|r| r.job_id).collect::<Vec<_>>(),
            vec![pending_a]
        );
    }
}
