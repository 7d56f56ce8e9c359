//! Config command implementation.

use crate::core::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate configuration file.
    Validate {
        /// Config file path.
        #[arg(short, long, default_value = "config/geni-am.toml")]
        config: PathBuf,
    },
    /// Print configuration with defaults filled in.
    Show {
        /// Config file path.
        #[arg(short, long, default_value = "config/geni-am.toml")]
        config: PathBuf,
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Generate a configuration template.
    Generate {
        /// Output file path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the config command.
pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Validate { config } => validate_config(&config),
        ConfigCommand::Show { config, format } => show_config(&config, &format),
        ConfigCommand::Generate { output } => generate_config(output.as_deref()),
    }
}

fn validate_config(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }
    let config = Config::from_file(path)?;
    println!("✓ Config file is valid");

    if config.credentials.trusted_issuers.is_empty()
        && config.credentials.trust_roots_dir.is_none()
    {
        println!("  ⚠ Warning: no trusted issuers configured; all credentials will be rejected");
    }
    if !config.listener.insecure {
        println!("  ⚠ Warning: listener.insecure is false; `start` will refuse to serve");
    }
    println!(
        "  aggregate: {} ({} x {})",
        config.aggregate.authority, config.catalog.size, config.catalog.resource_type
    );
    println!("  listener:  {} -> {}", config.listener.bind, config.url());
    Ok(())
}

fn show_config(path: &Path, format: &str) -> Result<()> {
    let config = Config::from_file(path)?;
    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&config)
                .with_context(|| "failed to render config as JSON")?;
            println!("{}", json);
        }
        _ => {
            println!("{}", config.to_toml()?);
        }
    }
    Ok(())
}

fn generate_config(output: Option<&Path>) -> Result<()> {
    let template = generate_template();
    match output {
        Some(path) => {
            std::fs::write(path, &template)
                .with_context(|| format!("failed to write {:?}", path))?;
            println!("Generated config template: {:?}", path);
        }
        None => {
            println!("{}", template);
        }
    }
    Ok(())
}

fn generate_template() -> String {
    r#"# GENI aggregate manager configuration

[aggregate]
authority = "geni//gpo//gcf"
am_type = "gcf"
# url = "https://am.example.net:8001/"

[catalog]
size = 3
resource_type = "fakevm"

[leases]
allocation_window_seconds = 600
max_lease_days = 365

[listener]
bind = "127.0.0.1:8001"
# Plaintext only; put a TLS terminator in front of this listener.
insecure = true
max_connections = 1024
max_frame_bytes = 1048576

[credentials]
# Lines of `<issuer-urn> <base64-public-key>`.
# trust_roots_dir = "/etc/geni-am/trusted_roots"

# Issuer URN to base64 Ed25519 public key, as printed by `credential keygen`.
[credentials.trusted_issuers]
"urn:publicid:IDN+geni:gpo:gcf+authority+sa" = "iojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w="

[telemetry]
log_level = "info"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_template_is_valid() {
        let config = Config::from_toml(&generate_template()).unwrap();
        assert!(config.listener.insecure);
        assert_eq!(config.credentials.trusted_issuers.len(), 1);
        assert_eq!(config.catalog.size, 3);
    }

    #[test]
    fn test_generate_to_file_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geni-am.toml");
        generate_config(Some(&path)).unwrap();
        validate_config(&path).unwrap();
        show_config(&path, "json").unwrap();
    }

    #[test]
    fn test_validate_missing_file() {
        assert!(validate_config(Path::new("/nonexistent/geni-am.toml")).is_err());
    }
}
