//! CLI command definitions for the `creditflow` binary.
//!
//! Uses clap derive macros for argument parsing. `serve` runs the REST API;
//! the other commands work offline against files and configuration.

pub mod config;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Credit-decision workflow engine.
#[derive(Debug, Parser)]
#[command(name = "creditflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding config.toml and the SQLite database.
    #[arg(long, global = true, env = "CREDITFLOW_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Bind address; overrides `server.host` from config.toml.
        #[arg(long)]
        host: Option<String>,

        /// Port; overrides `server.port` from config.toml.
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Validate a workflow definition file (JSON or YAML).
    Validate {
        /// Path to the definition file.
        file: PathBuf,
    },

    /// Print the effective configuration.
    #[command(name = "check-config")]
    CheckConfig,
}
