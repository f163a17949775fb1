use std::sync::Arc;

use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use gameboost_api::{
    app_router,
    config::{init_tracing, load_config},
    db,
    events::{process_events, EventSender},
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_tracing(config.log_level(), config.log_json);
    info!(
        environment = %config.environment,
        "starting gameboost-api v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = db::establish_connection_from_app_config(&config).await?;
    if config.auto_migrate {
        db::ensure_schema(&pool).await?;
    } else if let Err(e) = db::check_connection(&pool).await {
        error!(error = %e, "database is unreachable at startup");
        return Err(e.into());
    }
    let pool = Arc::new(pool);

    let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
    let event_task = tokio::spawn(process_events(event_rx));
    let event_sender = EventSender::new(event_tx);

    let state = AppState::new(pool, config.clone(), Some(event_sender))?;
    let app = app_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Dropping the router dropped the last sender; the drain task ends on
    // its own once the channel is empty.
    if let Err(e) = event_task.await {
        warn!(error = %e, "event drain task did not shut down cleanly");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        term.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
