use anyhow::Context;
use convoy_core::telemetry::init_tracing;
use convoy_core::WorkerConfig;
use convoy_queue::create_queue;
use convoy_storage::create_storage;
use convoy_worker::{ConversionWorker, FfmpegConverter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = WorkerConfig::from_env()?;
    init_tracing(config.base.log_format, "convoy_worker");

    config
        .validate()
        .context("Configuration validation failed")?;

    let storage = create_storage(&config.base.storage)
        .await
        .context("Failed to initialize storage")?;
    let queue = create_queue(&config.base.queue)
        .await
        .context("Failed to initialize task queue")?;
    let converter = FfmpegConverter::new(config.ffmpeg_path.clone());

    // Startup checks are fatal
    convoy_storage::with_timeout(
        config.base.storage.timeout,
        "health_check",
        storage.health_check(),
    )
    .await
    .context("Storage health check failed")?;
    convoy_queue::with_timeout(
        config.base.queue.timeout,
        "health_check",
        queue.health_check(),
    )
    .await
    .context("Queue health check failed")?;
    converter
        .verify()
        .await
        .context("ffmpeg is not usable")?;

    tracing::info!(
        storage_backend = %storage.backend_type(),
        queue_backend = %queue.backend_type(),
        ffmpeg_path = %config.ffmpeg_path,
        "Dependencies healthy"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let worker = Arc::new(ConversionWorker::new(
        config,
        storage,
        queue,
        Arc::new(converter),
    ));
    worker.run(shutdown).await?;

    Ok(())
}

/// Resolves on Ctrl+C (SIGINT) or SIGTERM.
///
/// # Panics
/// - Panics if a signal handler cannot be installed (unrecoverable system error)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
