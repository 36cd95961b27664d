use executors::K6Runner;
use rmcp::{ServiceExt, transport::stdio};
use server::{config::ServerConfig, mcp::load_test_server::LoadTestServer};
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::sentry::{init_once, sentry_layer};

fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let _guard = init_once(config.sentry_dsn.as_deref(), "mcp");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            // stdout carries the protocol, so every log line goes to stderr
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(EnvFilter::new(&config.log_filter)),
                )
                .with(config.sentry_dsn.is_some().then(sentry_layer))
                .init();

            let version = env!("CARGO_PKG_VERSION");
            tracing::debug!("[MCP] Starting k6 MCP server version {version}...");
            if !config.dotenv.is_empty() {
                tracing::info!(
                    "[MCP] Passing {} variable(s) from .env to k6",
                    config.dotenv.len()
                );
            }

            let service = LoadTestServer::new(K6Runner::new(config.runner()))
                .serve(stdio())
                .await
                .inspect_err(|e| {
                    tracing::error!("serving error: {:?}", e);
                    sentry::capture_error(e);
                })?;

            service.waiting().await?;
            Ok(())
        })
}
