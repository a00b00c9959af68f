//! dspy-channel: control-channel server for display and render drivers
//!
//! Viewers connect over TCP, open a sub-protocol with
//! `UtTcpOpen -proto <id>`, and then send null-terminated command lines
//! that start, refine, or stop renders and select objects or surfaces.
//!
//! Features:
//! - Lenient command tokenizer with `{...}` and `"..."` quoted values
//! - Protocol registry selected by handshake (`it` built in)
//! - One task per connection; sessions never share state
//! - Configuration via CLI arguments or TOML file

mod command;
mod config;
mod dispatcher;
mod error;
mod protocols;
mod server;
mod session;

use config::Config;
use protocols::Registry;
use server::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        workers = ?config.workers,
        max_connections = config.max_connections,
        "Starting dspy-channel server"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.enable_all().build()?;

    runtime.block_on(serve(config))?;
    info!("Server stopped");
    Ok(())
}

async fn serve(config: Config) -> std::io::Result<()> {
    let server = Server::bind(&config, Registry::builtin())?;
    info!(address = %server.local_addr()?, "Bound control channel");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await
}
