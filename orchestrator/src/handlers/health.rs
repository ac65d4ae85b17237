use axum::extract::State;
use axum::Json;
use dispatch_wire::{HealthComponents, HealthResponse};
use tracing::warn;

use crate::app_context::AppContext;

/// `GET /health`: liveness plus reachability of C1, C2, C3 (spec.md §4.1). Checked
/// fresh on every request rather than self-reported on a timer, since that's the
/// contract the operation actually describes.
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    // C1 and C2 share one pool in this deployment, so one ping covers both.
    let db_reachable = sqlx::query("SELECT 1").execute(&ctx.pool).await.is_ok();

    let host_status = match ctx.host.describe().await {
        Ok(_) => "ok",
        Err(e) => {
            warn!(error = %e, "host control plane unreachable for health check");
            "unknown"
        }
    };

    let registry_status = if db_reachable { "ok" } else { "error" };
    let queue_status = registry_status;

    Json(HealthResponse {
        status: if db_reachable { "healthy" } else { "unhealthy" },
        components: HealthComponents {
            registry: registry_status,
            queue: queue_status,
            host: host_status,
        },
    })
}
