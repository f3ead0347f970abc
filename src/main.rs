use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use unigo_notification_service::config::Settings;
use unigo_notification_service::server::{create_app, AppState};
use unigo_notification_service::tasks::ReminderTask;
use unigo_notification_service::telemetry::init_telemetry;
use unigo_notification_service::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;

    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    let state = AppState::from_settings(settings.clone())?;
    tracing::info!("Application state initialized");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut handles = Vec::new();

    // Document events over Redis pub/sub, when channels are configured
    if !settings.redis.channels.is_empty() {
        let subscriber = Arc::new(RedisSubscriber::new(
            settings.redis.clone(),
            state.triggers.clone(),
        ));
        let subscriber_shutdown = subscriber.shutdown_signal();
        let mut shutdown_rx = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            let _ = subscriber_shutdown.send(());
        }));
        handles.push(tokio::spawn(async move {
            if let Err(e) = subscriber.start().await {
                tracing::error!(error = %e, "Redis subscriber failed");
            }
        }));
    } else {
        tracing::info!("No Redis channels configured, document events arrive over HTTP only");
    }

    let reminders = ReminderTask::new(
        settings.reminders.clone(),
        state.triggers.clone(),
        shutdown_tx.subscribe(),
    );
    handles.push(tokio::spawn(reminders.run()));

    let app = create_app(state);

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    tracing::info!("Waiting for background tasks to finish...");
    futures::future::join_all(handles).await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
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

    let _ = shutdown_tx.send(());
}
