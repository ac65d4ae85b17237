use std::str::FromStr;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use dispatch_wire::{ErrorBody, JobType, StatusResponse, SubmitResponse};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app_context::AppContext;

type ApiError = (StatusCode, Json<ErrorBody>);

fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(msg)))
}

fn service_unavailable(msg: impl Into<String>) -> ApiError {
    (StatusCode::SERVICE_UNAVAILABLE, Json(ErrorBody::new(msg)))
}

/// `POST /api/v1/<job_type>/jobs`. Implements the submit algorithm in spec.md §4.1:
/// write the record before enqueuing, enqueue before waking the host, and never
/// reply 202 with a record that has no matching queue message.
pub async fn submit(
    State(ctx): State<AppContext>,
    Path(job_type_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let start = Instant::now();

    let job_type = JobType::from_str(&job_type_segment)
        .map_err(|_| bad_request(format!("unknown job_type: {job_type_segment}")))?;

    validate_envelope(&job_type, &body)?;

    let job_id = Uuid::new_v4();
    let ttl = ctx
        .job_ttl_seconds
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

    // 2. Write PENDING. No queue message is emitted if this fails.
    if let Err(e) = ctx
        .registry
        .create_pending(job_id, job_type.as_route(), &body, ttl)
        .await
    {
        error!(%job_id, error = %e, "failed to write pending job record");
        return Err(service_unavailable("registry unavailable"));
    }

    // 3. Enqueue. A failure here must not leak a pending-but-unqueued record.
    if let Err(e) = ctx.queue.enqueue(job_id, job_type.as_route(), &body).await {
        error!(%job_id, error = %e, "failed to enqueue job, failing record");
        if let Err(fail_err) = ctx
            .registry
            .fail_unqueued(job_id, "enqueue failed")
            .await
        {
            error!(%job_id, error = %fail_err, "failed to mark unqueued job failed");
        }
        return Err(service_unavailable("queue unavailable"));
    }

    // 4. Best-effort wake, asynchronous w.r.t. the client reply. `start()` is
    // idempotent: it no-ops unless the host is currently stopped.
    let host = ctx.host.clone();
    tokio::spawn(async move {
        if let Err(e) = host.start().await {
            warn!(error = %e, "failed to wake host after submission");
        }
    });

    common_metrics::histogram(
        "job_submit_seconds",
        &[("job_type".to_string(), job_type.as_route().to_string())],
        start.elapsed().as_secs_f64(),
    );
    info!(%job_id, job_type = job_type.as_route(), "accepted job submission");

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse::pending(job_id))))
}

/// Only the envelope is validated: presence of the job type's required top-level
/// fields. Values are never interpreted - the inference engine owns that.
fn validate_envelope(job_type: &JobType, body: &Value) -> Result<(), ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| bad_request("request body must be a JSON object"))?;

    let missing: Vec<&str> = job_type
        .required_envelope_fields()
        .iter()
        .filter(|field| !object.contains_key(**field))
        .copied()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(bad_request(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

/// `GET /api/v1/jobs/{job_id}`.
pub async fn get_status(
    State(ctx): State<AppContext>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let record = ctx
        .registry
        .get(job_id)
        .await
        .map_err(|e| {
            error!(%job_id, error = %e, "failed to read job record");
            service_unavailable("registry unavailable")
        })?
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(ErrorBody::new("unknown job_id"))))?;

    Ok(Json(StatusResponse {
        job_id: record.job_id,
        status: record.status,
        result_url: record.result_uri,
        error: record.error,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use http_body_util::BodyExt;
    use sqlx::PgPool;
    use tower::ServiceExt;

    use crate::handlers::app;

    async fn test_app(pool: PgPool) -> Router {
        let config = crate::config::Config {
            host: "0.0.0.0".into(),
            port: 0,
            database_url: String::new(),
            queue_name: "default".into(),
            host_id: "gpu-host-1".into(),
            host_control_url: "http://127.0.0.1:1".into(),
            host_control_timeout_seconds: 1,
            visibility_timeout_seconds: 300,
            max_receives: 3,
            job_ttl_seconds: None,
            max_pg_connections: 10,
        };
        let ctx = AppContext::new(pool, &config);
        app::router(ctx)
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn submit_accepts_valid_body(pool: PgPool) {
        let app = test_app(pool).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/camera-angle/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"image_url": "s3://b/in.jpg", "prompt": "top-down"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let parsed: SubmitResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.status, dispatch_wire::JobStatus::Pending);
        assert!(parsed.result_url.is_none());
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn submit_rejects_unknown_job_type(pool: PgPool) {
        let app = test_app(pool).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/upscale/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn submit_rejects_missing_envelope_field(pool: PgPool) {
        let app = test_app(pool).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/camera-angle/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({"prompt": "top-down"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn submitting_identical_bodies_yields_distinct_ids(pool: PgPool) {
        let app = test_app(pool).await;
        let body = serde_json::json!({"image_url": "s3://b/in.jpg", "prompt": "x"}).to_string();

        let mut ids = std::collections::HashSet::new();
        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/v1/camera-angle/jobs")
                        .header("content-type", "application/json")
                        .body(Body::from(body.clone()))
                        .unwrap(),
                )
                .await
                .unwrap();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let parsed: SubmitResponse = serde_json::from_slice(&bytes).unwrap();
            ids.insert(parsed.job_id);
        }

        assert_eq!(ids.len(), 3);
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn get_status_unknown_job_is_404(pool: PgPool) {
        let app = test_app(pool).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/jobs/{}", Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[sqlx::test(migrations = "../dispatch-core/migrations")]
    async fn get_status_round_trips_after_submit(pool: PgPool) {
        let app = test_app(pool).await;

        let submit_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/face-mask/jobs")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({"image_url": "s3://b/in.jpg"}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = submit_response.into_body().collect().await.unwrap().to_bytes();
        let submitted: SubmitResponse = serde_json::from_slice(&bytes).unwrap();

        let status_response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/jobs/{}", submitted.job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(status_response.status(), StatusCode::OK);
        let bytes = status_response.into_body().collect().await.unwrap().to_bytes();
        let parsed: StatusResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.job_id, submitted.job_id);
        assert_eq!(parsed.status, dispatch_wire::JobStatus::Pending);
    }
}
