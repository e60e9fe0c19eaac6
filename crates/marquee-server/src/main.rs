use clap::Parser;
use marquee_control::spawn_sweeper;
use marquee_server::cli::Cli;
use marquee_server::{AppState, LogMailer, router};
use marquee_store_pg::PgStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let store = Arc::new(PgStore::connect(&config.database).await?);
    store.migrate().await?;

    let mailer = Arc::new(LogMailer::new(config.mailer.sender.clone()));
    let state = AppState::new(config.clone(), store, mailer)?;

    let sweeper = config
        .limiter
        .enabled
        .then(|| spawn_sweeper(Arc::clone(state.access().limiter())));

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, env = %config.server.env, "starting server");

    axum::serve(
        listener,
        router(state.clone()).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    tracing::info!(
        in_flight = state.tasks().in_flight(),
        "completing background tasks"
    );
    state
        .tasks()
        .shutdown(config.server.shutdown_timeout)
        .await?;

    tracing::info!(addr = %addr, "stopped server");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal, "shutting down server");
}
