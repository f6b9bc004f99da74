use axum::Router;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use nl_query_backend::api;
use nl_query_backend::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging; RUST_LOG directives take precedence over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_ansi(config.logging.style != "never")
        .init();

    info!("Starting server on {}", config.server_address());

    let app: Router = api::routes::create_router(config.clone());

    // Start server
    let addr: SocketAddr = config.server_address().parse().map_err(|e| {
        error!("Invalid server address {}: {}", config.server_address(), e);
        e
    })?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
