mod cli;
mod config;
mod logging;
mod routes;

use crate::cli::Args;
use crate::config::ServerConfig;
use crate::logging::init_tracing;
use anyhow::Context;
use clap::Parser;
use script_runner::ScriptRunner;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_tracing(args.log_dir.as_deref(), args.log_to_stderr)?;

    let config = ServerConfig::load_or_default(args.config.as_deref())?;
    info!(
        listen_addr = %args.listen_addr,
        config = ?args.config,
        interpreter = %config.interpreter.program,
        timeout = %humantime::format_duration(config.limits.timeout()),
        max_output_chars = config.limits.max_output_chars,
        "exec server starting"
    );

    let runner = Arc::new(ScriptRunner::new(config.interpreter, config.limits));
    let app = routes::router(runner, config.server.max_request_bytes);

    let listener = TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    info!(addr = %args.listen_addr, "exec server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;
    info!("exec server shutting down");
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
