use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use dispatch_core::{JobRegistry, WorkQueue};
use dispatch_wire::{EngineStatus, JobType};
use tracing::{error, info, warn};

use crate::engine_client::EngineClient;

/// C5: pulls jobs, dispatches them to the local inference endpoint, and reconciles
/// the registry with at-least-once, idempotent semantics (spec.md §4.2). One process,
/// one in-flight message at a time - parallelism degree 1, per spec.md §5.
pub struct WorkerAdapter {
    queue: WorkQueue,
    registry: JobRegistry,
    engine: EngineClient,
    poll_interval: Duration,
    job_deadline: chrono::Duration,
    visibility_step: chrono::Duration,
}

impl WorkerAdapter {
    pub fn new(
        queue: WorkQueue,
        registry: JobRegistry,
        engine: EngineClient,
        poll_interval: Duration,
        job_deadline: chrono::Duration,
    ) -> Self {
        let visibility_step = queue.visibility_timeout() / 2;
        Self {
            queue,
            registry,
            engine,
            poll_interval,
            job_deadline,
            visibility_step,
        }
    }

    /// One iteration of the run loop: receive, and process if anything was there.
    /// Returns whether a message was actually handled, so the caller knows whether to
    /// sleep before the next long-poll attempt.
    pub async fn run_once(&self) -> bool {
        let message = match self.queue.receive().await {
            Ok(Some(message)) => message,
            Ok(None) => return false,
            Err(e) => {
                error!(error = %e, "failed to receive from queue");
                return false;
            }
        };

        self.process(message).await;
        true
    }

    async fn process(&self, message: dispatch_core::ReceivedMessage) {
        let job_id = message.job_id;

        // Validate: malformed messages (unrecognized job_type) are deleted and logged.
        let Ok(job_type) = JobType::from_str(&message.job_type) else {
            warn!(%job_id, job_type = %message.job_type, "dropping message with unknown job_type");
            self.ack(message.id).await;
            return;
        };

        // Lookup: absent or already-terminal records are an idempotent skip.
        let record = match self.registry.get(job_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                info!(%job_id, "no record for job, dropping message");
                self.ack(message.id).await;
                return;
            }
            Err(e) => {
                error!(%job_id, error = %e, "registry unreachable during lookup, leaving for redelivery");
                return;
            }
        };

        if record.status.is_terminal() {
            info!(%job_id, status = %record.status, "record already terminal, idempotent skip");
            self.ack(message.id).await;
            return;
        }

        // Claim: conditional transition to Processing.
        let attempts = match self.registry.claim(job_id).await {
            Ok(Some(attempts)) => attempts,
            Ok(None) => {
                info!(%job_id, "record became terminal before claim, idempotent skip");
                self.ack(message.id).await;
                return;
            }
            Err(e) => {
                error!(%job_id, error = %e, "registry unreachable during claim, leaving for redelivery");
                return;
            }
        };
        info!(%job_id, attempts, "claimed job");

        // Submit to engine.
        let engine_job_id = match self.engine.submit(job_type.as_route(), &record.request_body).await {
            Ok(response) => response.job_id,
            Err(e) => {
                warn!(%job_id, error = %e, "engine submit failed, leaving for redelivery");
                return;
            }
        };

        if let Err(e) = self.registry.set_worker_job_id(job_id, &engine_job_id).await {
            error!(%job_id, error = %e, "failed to persist worker_job_id, leaving for redelivery");
            return;
        }

        // Poll until terminal or the local deadline elapses, extending the message's
        // visibility lease in the background so a slow job doesn't get redelivered
        // out from under itself.
        let extend_handle = tokio::spawn(extend_visibility_loop(
            self.queue.clone(),
            message.id,
            self.visibility_step,
        ));

        let outcome = self.poll_until_terminal(&job_type, &engine_job_id).await;
        extend_handle.abort();

        let committed = match outcome {
            PollOutcome::Completed { result_url } => {
                self.registry.commit_completed(job_id, &result_url).await
            }
            PollOutcome::Failed { error } => self.registry.commit_failed(job_id, &error).await,
            PollOutcome::TimedOut => {
                self.registry.commit_failed(job_id, "deadline exceeded").await
            }
        };

        match committed {
            Ok(true) => info!(%job_id, "committed terminal state"),
            Ok(false) => info!(%job_id, "terminal commit lost the race to an earlier delivery"),
            Err(e) => {
                error!(%job_id, error = %e, "failed to commit terminal state, leaving for redelivery");
                return;
            }
        }

        self.ack(message.id).await;
    }

    async fn poll_until_terminal(&self, job_type: &JobType, engine_job_id: &str) -> PollOutcome {
        let deadline = Utc::now() + self.job_deadline;

        loop {
            if Utc::now() >= deadline {
                return PollOutcome::TimedOut;
            }

            match self.engine.poll(job_type.as_route(), engine_job_id).await {
                Ok(status) if status.status == EngineStatus::Completed => {
                    return PollOutcome::Completed {
                        result_url: status.result_url.unwrap_or_default(),
                    };
                }
                Ok(status) if status.status == EngineStatus::Failed => {
                    return PollOutcome::Failed {
                        error: status.error.unwrap_or_else(|| "engine reported failure".to_string()),
                    };
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "transient error polling engine status"),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn ack(&self, message_id: i64) {
        if let Err(e) = self.queue.ack(message_id).await {
            error!(error = %e, "failed to acknowledge message");
        }
    }
}

enum PollOutcome {
    Completed { result_url: String },
    Failed { error: String },
    TimedOut,
}

async fn extend_visibility_loop(queue: WorkQueue, message_id: i64, step: chrono::Duration) {
    let sleep_duration = step.to_std().unwrap_or(Duration::from_secs(1));
    loop {
        tokio::time::sleep(sleep_duration).await;
        if let Err(e) = queue.extend_visibility(message_id, step).await {
            warn!(error = %e, "failed to extend message visibility");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::WorkQueue;
    use dispatch_wire::EngineRoute;
    use httpmock::MockServer;
    use serde_json::json;
    use sqlx::PgPool;
    use std::collections::HashMap;

    fn adapter(pool: PgPool, server: &MockServer) -> WorkerAdapter {
        let queue = WorkQueue::new(pool.clone(), "default", chrono::Duration::seconds(300), 3);
        let registry = JobRegistry::new(pool);
        let mut routes = HashMap::new();
        routes.insert(
            "camera-angle".to_string(),
            EngineRoute {
                submit_url: format!("{}/submit", server.base_url()),
                status_url: format!("{}/status", server.base_url()),
            },
        );
        let engine = EngineClient::new(routes, Duration::from_secs(5));
        WorkerAdapter::new(
            queue,
            registry,
            engine,
            Duration::from_millis(10),
            chrono::Duration::seconds(5),
        )
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn happy_path_commits_completed_and_acks(pool: PgPool) {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/submit");
            then.status(200)
                .json_body(json!({"job_id": "engine-1", "status": "pending"}));
        });
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/status/engine-1");
            then.status(200)
                .json_body(json!({"status": "completed", "result_url": "s3://b/out.jpg"}));
        });

        let worker = adapter(pool.clone(), &server);
        let job_id = uuid::Uuid::now_v7();
        let registry = JobRegistry::new(pool.clone());
        registry
            .create_pending(job_id, "camera-angle", &json!({"prompt": "x"}), None)
            .await
            .unwrap();
        let queue = WorkQueue::new(pool.clone(), "default", chrono::Duration::seconds(300), 3);
        queue
            .enqueue(job_id, "camera-angle", &json!({"prompt": "x"}))
            .await
            .unwrap();

        assert!(worker.run_once().await);

        let record = registry.get(job_id).await.unwrap().unwrap();
        assert_eq!(record.status, dispatch_wire::JobStatus::Completed);
        assert_eq!(record.result_uri.as_deref(), Some("s3://b/out.jpg"));
        assert_eq!(queue.visible_depth().await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn engine_failure_commits_failed(pool: PgPool) {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/submit");
            then.status(200)
                .json_body(json!({"job_id": "engine-2", "status": "pending"}));
        });
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/status/engine-2");
            then.status(200)
                .json_body(json!({"status": "failed", "error": "OOM"}));
        });

        let worker = adapter(pool.clone(), &server);
        let job_id = uuid::Uuid::now_v7();
        let registry = JobRegistry::new(pool.clone());
        registry
            .create_pending(job_id, "camera-angle", &json!({}), None)
            .await
            .unwrap();
        let queue = WorkQueue::new(pool.clone(), "default", chrono::Duration::seconds(300), 3);
        queue.enqueue(job_id, "camera-angle", &json!({})).await.unwrap();

        assert!(worker.run_once().await);

        let record = registry.get(job_id).await.unwrap().unwrap();
        assert_eq!(record.status, dispatch_wire::JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("OOM"));
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn unknown_job_type_is_dropped(pool: PgPool) {
        let server = MockServer::start();
        let worker = adapter(pool.clone(), &server);
        let queue = WorkQueue::new(pool.clone(), "default", chrono::Duration::seconds(300), 3);
        queue
            .enqueue(uuid::Uuid::now_v7(), "not-a-real-type", &json!({}))
            .await
            .unwrap();

        assert!(worker.run_once().await);
        assert_eq!(queue.visible_depth().await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn redelivery_of_already_terminal_record_is_idempotent_skip(pool: PgPool) {
        let server = MockServer::start();
        let worker = adapter(pool.clone(), &server);
        let registry = JobRegistry::new(pool.clone());
        let job_id = uuid::Uuid::now_v7();
        registry
            .create_pending(job_id, "camera-angle", &json!({}), None)
            .await
            .unwrap();
        registry.claim(job_id).await.unwrap();
        registry.commit_completed(job_id, "s3://b/out.jpg").await.unwrap();

        let queue = WorkQueue::new(pool.clone(), "default", chrono::Duration::seconds(300), 3);
        queue.enqueue(job_id, "camera-angle", &json!({})).await.unwrap();

        assert!(worker.run_once().await);
        // No engine calls were registered as mocks, so a non-skip path would have
        // failed the request; reaching here proves the skip path was taken.
        let record = registry.get(job_id).await.unwrap().unwrap();
        assert_eq!(record.attempts, 0);
    }
}
