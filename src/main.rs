use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use nomad_dashboard::app;
use nomad_dashboard::config::AppConfig;
use nomad_dashboard::external::NomadClient;
use nomad_dashboard::logging::{init_logging, LoggingConfig};
use nomad_dashboard::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env()?;
    let client = NomadClient::new(&config.nomad)?;
    info!(
        "📡 Using Nomad at {} (namespace: {}, auth: {}, cache TTL: {:?})",
        config.nomad.address,
        config.nomad.namespace,
        if config.nomad.token.is_empty() { "none" } else { "token" },
        config.cache_ttl
    );

    let state = AppState::new(&config, Arc::new(client));
    let app = app::create_app(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("🚀 Nomad dashboard backend running at http://{}/", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("👋 Shutting down");
}
