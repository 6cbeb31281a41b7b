//! Parley chat server entry point.
//!
//! Usage: `parley-server [config.toml]`. Without a file the defaults
//! apply. `RUST_LOG` overrides the configured log filter.

use parley::{ParleyError, ParleyServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ParleyError> {
    let config_path = std::env::args().nth(1);
    let config = match &config_path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_target(true)
        .init();

    if let Some(path) = &config_path {
        tracing::info!(path = %path, "configuration loaded");
    }

    let server = ParleyServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
