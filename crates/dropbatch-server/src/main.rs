//! Dropbatch Server - Main entry point

use anyhow::Result;
use dropbatch_common::logging::{init_logging, LogConfig};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use dropbatch_server::{
    config::Config,
    db,
    pipeline::{ChunkedPipeline, DiscountAuditListener, PgDiscountSink, PipelineLauncher},
    watch::WatchService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Environment variables take precedence over these defaults
    let log_config = LogConfig::builder()
        .log_file_prefix("dropbatch-server")
        .filter_directives("dropbatch_server=debug,dropbatch_common=info,sqlx=warn")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting Dropbatch Server");

    let config = Config::load()?;
    info!(
        watch_path = %config.watch.path.display(),
        quiet_interval_ms = config.watch.quiet_interval_ms,
        chunk_size = config.pipeline.chunk_size,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database).await?;
    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    info!("Database migrations completed");

    // Fired by the watch service if a run outlasts the shutdown grace period
    let run_cancel = CancellationToken::new();

    let pipeline = ChunkedPipeline::new(
        Arc::new(PgDiscountSink::new(pool.clone(), config.pipeline.created_by.clone())),
        Arc::new(DiscountAuditListener::new(
            pool.clone(),
            config.pipeline.created_by.clone(),
        )),
        config.pipeline.chunk_size,
    )
    .with_cancellation(run_cancel.child_token());
    let launcher = Arc::new(PipelineLauncher::new(pipeline));

    let running = WatchService::new(config.watch, launcher)
        .with_run_cancellation(run_cancel)
        .start()?;

    shutdown_signal().await;

    running.stop().await;
    pool.close().await;

    info!("Server shut down gracefully");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
