use std::future::ready;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use common_metrics::setup_metrics_routes;
use dispatch_core::{HostController, HttpHostController, JobRegistry, WorkQueue};
use envconfig::Envconfig;
use eyre::Result;
use health::{HealthHandle, HealthRegistry};
use tracing::{error, info};

mod config;
mod detector;

use config::Config;
use detector::IdleDetector;

common_alloc::used!();

async fn sample_loop(mut detector: IdleDetector, liveness: HealthHandle, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        if let Err(e) = detector.sample_once().await {
            error!("idle detector sample failed: {}", e);
        } else {
            liveness.report_healthy().await;
        }
    }
}

async fn listen(app: Router, bind: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn app(liveness: HealthRegistry) -> Router {
    Router::new().route("/_liveness", get(move || ready(liveness.get_status())))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().expect("failed to load configuration from env");

    let pool = config.pool_config().connect().await?;

    dispatch_core::run_migrations(&pool).await;

    let registry = JobRegistry::new(pool.clone());
    let queue = WorkQueue::new(
        pool,
        config.queue_name.clone(),
        config.visibility_timeout(),
        config.max_receives,
    );
    let host: Arc<dyn HostController> = Arc::new(HttpHostController::new(
        config.host_control_url.clone(),
        config.host_id.clone(),
        config.host_control_timeout(),
    ));

    let detector = IdleDetector::new(
        queue,
        registry,
        host,
        config.idle_threshold,
        config.idle_periods,
    );

    let liveness = HealthRegistry::new("liveness");
    let sample_liveness = liveness
        .register(
            "sample_loop".to_string(),
            config.idle_sample_interval() * 4,
        )
        .await;

    info!(
        "starting idle detector, queue={}, T_sample={}s, N={}",
        config.queue_name, config.idle_sample_seconds, config.idle_periods
    );

    let sample_interval = config.idle_sample_interval();
    let sample_loop_handle = tokio::spawn(sample_loop(detector, sample_liveness, sample_interval));

    let http_app = setup_metrics_routes(app(liveness));
    let http_server = tokio::spawn(listen(http_app, config.bind()));

    tokio::select! {
        res = sample_loop_handle => {
            error!("idle detector sample loop exited");
            if let Err(e) = res {
                error!("sample loop failed: {}", e);
            }
        }
        res = http_server => {
            error!("http server exited");
            if let Err(e) = res {
                error!("http server failed: {}", e);
            }
        }
    }

    info!("exiting");
    Ok(())
}
