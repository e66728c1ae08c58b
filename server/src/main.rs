use anyhow::Result;
use server::settings::DEFAULT_LOG_FILTER;
use server::{build_router, AppState, Settings, StopOutcome};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let settings = Settings::from_env();
    let state = AppState::new(&settings);

    // router HTTP + websocket
    let app = build_router(state.clone());

    let listener = TcpListener::bind(&settings.listen_addr).await?;
    info!(
        "servidor de simulación escuchando en {} (tick={:?}, escala={})",
        listener.local_addr()?,
        settings.engine.tick,
        settings.engine.time_scale
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // si quedó una corrida viva la cortamos antes de salir
    if let StopOutcome::Stopped(stats) = state.engine.stop() {
        info!(
            "corrida detenida al apagar (completados={})",
            stats.completed
        );
    }
    info!("servidor apagado");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("no se pudo escuchar ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}
