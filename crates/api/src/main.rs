//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use inventory::{
    AllocationSweeper, InMemoryInventoryRepository, InventoryRepository, LoggingSink,
    OutboxDispatcher, PostgresInventoryRepository,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Serves the API over `repo` with the expiry sweeper and outbox dispatcher
/// running beside it, then stops both once the server has drained.
async fn serve<R: InventoryRepository>(
    repo: Arc<R>,
    config: Config,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(Arc::clone(&repo), config.inventory.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = AllocationSweeper::new(state.allocations.clone(), &config.inventory);
    let sweeper_task = tokio::spawn(sweeper.run(shutdown_rx.clone()));
    let dispatcher = OutboxDispatcher::new(repo, LoggingSink, &config.inventory);
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_rx));

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let (sweeper_result, dispatcher_result) = tokio::join!(sweeper_task, dispatcher_task);
    if let Err(e) = sweeper_result {
        tracing::error!(error = %e, "allocation sweeper task failed");
    }
    if let Err(e) = dispatcher_result {
        tracing::error!(error = %e, "outbox dispatcher task failed");
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    api::routes::metrics::describe();

    // 3. Pick the storage backend and serve
    match config.database_url.clone() {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&url)
                .await
                .expect("failed to connect to PostgreSQL");
            let repo = PostgresInventoryRepository::new(pool);
            repo.run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL storage");
            serve(Arc::new(repo), config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage");
            serve(
                Arc::new(InMemoryInventoryRepository::new()),
                config,
                metrics_handle,
            )
            .await;
        }
    }

    tracing::info!("server shut down gracefully");
}
