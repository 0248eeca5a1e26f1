use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal;

use notification_delivery_core::config::Settings;
use notification_delivery_core::service::AppState;
use notification_delivery_core::telemetry::init_telemetry;
use notification_delivery_core::triggers::RedisTriggerSubscriber;

const CONNECTION_CLEANUP_INTERVAL_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (and OpenTelemetry when enabled)
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone()).await?;
    tracing::info!(
        channels = ?state.registry.channel_ids(),
        batch_size = state.trigger.batch_size(),
        "Application state initialized"
    );

    // Start Redis trigger subscriber in background
    let subscriber = Arc::new(RedisTriggerSubscriber::new(
        settings.redis.clone(),
        state.trigger.clone(),
    ));
    let shutdown_tx = subscriber.shutdown_signal();

    let subscriber_task = subscriber.clone();
    let subscriber_handle = tokio::spawn(async move {
        if let Err(e) = subscriber_task.start().await {
            tracing::error!(error = %e, "Redis trigger subscriber failed");
        }
    });

    // Periodically drop socket connections whose client went away
    let connection_manager = state.connection_manager.clone();
    let mut cleanup_shutdown = shutdown_tx.subscribe();
    let cleanup_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(CONNECTION_CLEANUP_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = cleanup_shutdown.recv() => break,
                _ = interval.tick() => {
                    let pruned = connection_manager.prune_closed();
                    if pruned > 0 {
                        tracing::debug!(pruned = pruned, "Pruned closed connections");
                    }
                }
            }
        }
    });

    shutdown_signal_handler().await;
    let _ = shutdown_tx.send(());

    tracing::info!("Waiting for background tasks to finish...");
    let _ = tokio::join!(subscriber_handle, cleanup_handle);

    let stats = state.dispatcher.stats();
    tracing::info!(
        dispatches = stats.total_dispatches,
        channel_attempts = stats.channel_attempts,
        channel_failures = stats.channel_failures,
        "Dispatcher totals at shutdown"
    );

    state.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
