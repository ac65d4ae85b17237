use std::future::ready;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use common_metrics::setup_metrics_routes;
use dispatch_core::{JobRegistry, WorkQueue};
use envconfig::Envconfig;
use eyre::Result;
use health::{HealthHandle, HealthRegistry};
use tracing::{error, info};

mod config;
mod engine_client;
mod error;
mod worker;

use config::Config;
use engine_client::EngineClient;
use worker::WorkerAdapter;

common_alloc::used!();

async fn run_loop(worker: WorkerAdapter, liveness: HealthHandle, receive_wait: Duration) -> Result<()> {
    loop {
        let processed = worker.run_once().await;
        liveness.report_healthy().await;

        if !processed {
            tokio::time::sleep(receive_wait).await;
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
    let engine = EngineClient::new(config.parse_engine_routes(), config.engine_request_timeout());

    let worker = WorkerAdapter::new(
        queue,
        registry,
        engine,
        config.poll_interval(),
        config.job_deadline(),
    );

    let liveness = HealthRegistry::new("liveness");
    let worker_liveness = liveness
        .register(
            "run_loop".to_string(),
            config.receive_wait() * 4 + Duration::from_secs(config.poll_interval_seconds * 4),
        )
        .await;

    info!("starting worker adapter, queue={}", config.queue_name);

    let receive_wait = config.receive_wait();
    let run_loop_handle = tokio::spawn(run_loop(worker, worker_liveness, receive_wait));

    let http_app = setup_metrics_routes(app(liveness));
    let http_server = tokio::spawn(listen(http_app, config.bind()));

    tokio::select! {
        res = run_loop_handle => {
            error!("worker run loop exited");
            if let Err(e) = res {
                error!("run loop failed: {}", e);
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
