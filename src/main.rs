//! geni-am - unified CLI entrypoint.
//!
//! Usage:
//!   geni-am start --config config/geni-am.toml
//!   geni-am start --bind 127.0.0.1:9001 --log-level debug
//!   geni-am config validate --config config/geni-am.toml
//!   geni-am config generate --output config/geni-am.toml
//!   geni-am credential --issuer <urn> --owner <urn> [--target <slice-urn>]

use anyhow::Result;
use clap::Parser;
use geni_am::cli::commands::{run_config, run_credential, run_start};
use geni_am::cli::{Cli, Commands};
use geni_am::config::ConfigOverrides;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Determine config path - use global --config or default
    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/geni-am.toml"));
    let overrides = ConfigOverrides {
        log_level: cli.log_level,
        bind: cli.bind,
    };

    match cli.command {
        Commands::Start(args) => run_start(args, &config_path, explicit, &overrides).await,
        Commands::Config(args) => run_config(args),
        Commands::Credential(args) => run_credential(args),
    }
}
