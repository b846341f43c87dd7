//! creditflow CLI and REST API entry point.
//!
//! Binary name: `creditflow`
//!
//! Parses CLI arguments, loads configuration, then dispatches to the
//! requested command or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;

use cli::{Cli, Commands};
use creditflow_infra::config::{load_global_config, resolve_data_dir};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    creditflow_observe::tracing_setup::init_tracing(cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let data_dir = resolve_data_dir(cli.data_dir.as_deref());
    let mut config = load_global_config(&data_dir).await;

    let outcome = match cli.command {
        Commands::Validate { file } => {
            let valid = cli::validate::validate_file(&file, cli.json)?;
            if !valid {
                creditflow_observe::tracing_setup::shutdown_tracing();
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::CheckConfig => cli::config::check_config(&data_dir, &config, cli.json),

        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(data_dir, config).await
        }
    };

    creditflow_observe::tracing_setup::shutdown_tracing();
    outcome
}

async fn serve(data_dir: std::path::PathBuf, config: creditflow_types::config::GlobalConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::init(data_dir, config).await?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} creditflow API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());
    tracing::info!(addr = addr.as_str(), "server started");

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
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
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
}
