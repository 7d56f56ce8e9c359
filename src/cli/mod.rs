//! Command-line interface.
//!
//! Unified CLI for running and configuring the aggregate manager.

pub mod commands;

use clap::{Parser, Subcommand};

/// GENI AM API v3 reference aggregate manager.
#[derive(Parser, Debug)]
#[command(name = "geni-am")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Listener bind address, overriding the configuration file.
    #[arg(long, global = true)]
    pub bind: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the aggregate manager.
    Start(commands::StartArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
    /// Keys, signed credentials and signed requests.
    Credential(commands::CredentialArgs),
}
