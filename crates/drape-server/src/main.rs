//! drape-server: serve the compositor over HTTP.
//!
//! ```text
//! drape-server [--bind 127.0.0.1:3000] [--max-body-mb 20] [--max-concurrent 4] [--blend-alpha 0.8] ...
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use clap::Parser;
use drape_server::{AppState, Cli, ServerConfig, ServerError, build_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Cli::parse().into_config();
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ServerConfig) -> Result<(), ServerError> {
    config.composite.validate()?;
    let bind = config.bind;
    tracing::info!(
        max_body_mb = config.max_body_mb(),
        max_concurrent = config.max_concurrent,
        max_pixels = config.composite.max_pixels,
        blend_alpha = config.composite.blend_alpha,
        resize_filter = %config.composite.resize_filter,
        "starting"
    );

    let state = AppState::new(config)?;
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
