use envconfig::Envconfig;
use tracing::info;

mod app_context;
mod config;
mod handlers;

common_alloc::used!();

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config::Config::init_from_env().expect("failed to load configuration from env");

    let pool = config
        .pool_config()
        .connect()
        .await
        .expect("failed to connect to database");

    dispatch_core::run_migrations(&pool).await;

    let ctx = app_context::AppContext::new(pool, &config);
    let app = common_metrics::setup_metrics_routes(handlers::app::router(ctx));

    let bind = config.bind();
    info!("orchestrator listening on {bind}");
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
