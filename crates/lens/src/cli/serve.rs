//! The `lens serve` command.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Args;
use lens_core::{Analyzer, Capability, Config, ModelRegistry};

use crate::server::{self, AppState};

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(long, env = "LENS_HOST")]
    pub host: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "LENS_PORT")]
    pub port: Option<u16>,
}

/// Load models, then serve until Ctrl-C.
pub async fn execute(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Loading models from {}", config.model_dir().display());
    let load_config = config.clone();
    let models = tokio::task::spawn_blocking(move || ModelRegistry::load(&load_config)).await?;
    for capability in Capability::ALL {
        tracing::info!(%capability, status = %models.status(capability), "Model status");
    }

    let analyzer = Analyzer::new(&config, Arc::new(models));
    tracing::info!(
        search = analyzer.search().mode(),
        summary = analyzer.summary().mode(),
        "Enrichment clients ready"
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = server::router(AppState::new(config, analyzer));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
