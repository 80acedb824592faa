//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Inference gateway - policy filtering, retry-hardened upstream calls,
/// response normalization
#[derive(Parser, Debug)]
#[command(name = "infergate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "INFERGATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "INFERGATE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "INFERGATE_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "INFERGATE_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "INFERGATE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default)
    Serve,

    /// Load and validate the configuration, then print the effective
    /// values (the API token is redacted)
    Check,
}
