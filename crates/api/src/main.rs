//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::jobs::{BatchConfig, BatchRunner, ContractStatusJob, JobLocks, spawn_periodic};
use domain::Cancellation;
use event_store::InMemoryEventStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Create event store and application state
    let state = api::create_default_state(InMemoryEventStore::new(), &config);

    // 4. Background work: event buffer and the contract status job
    state.event_buffer.start().await;
    let jobs_cancel = Cancellation::new();
    let runner = Arc::new(BatchRunner::new(
        Arc::new(JobLocks::new()),
        BatchConfig::default(),
    ));
    let contract_job = spawn_periodic(
        runner,
        Arc::new(ContractStatusJob::new(Arc::clone(&state))),
        config.contract_status_job_interval,
        jobs_cancel.clone(),
    );

    // 5. Build the application and start serving
    let app = api::create_app(Arc::clone(&state), metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // 6. Wind down background work before exiting
    state.shutdown.cancel();
    jobs_cancel.cancel();
    state.event_buffer.stop().await;
    if let Err(err) = contract_job.await {
        tracing::error!(error = %err, "contract status job ended abnormally");
    }

    served?;
    tracing::info!("server shut down gracefully");
    Ok(())
}
