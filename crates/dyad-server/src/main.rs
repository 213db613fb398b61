//! dyad server
//!
//! - WebSocket stream channel: /ws
//! - HTTP facade: /api/{health,settings,apps,chats}
//! - Config: $DYAD_CONFIG (default dyad.yaml), $PORT overrides the port

use tracing_subscriber::{fmt, EnvFilter};

use dyad_server::{app_state, config, router};

#[tokio::main]
async fn main() -> dyad_core::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::var(config::CONFIG_ENV).unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.into());
    let cfg = config::load_or_default(&path)?;
    let port = std::env::var("PORT").ok();
    let listen = cfg.server.listen_addr(port.as_deref())?;

    let state = app_state::AppState::new(cfg)?;
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    tracing::info!(%listen, "dyad server listening (ws at /ws)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
