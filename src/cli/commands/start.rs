//! Start command implementation.

use crate::core::config::{Config, ConfigOverrides};
use crate::core::runtime::Runtime;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

/// Start the aggregate manager.
#[derive(Args, Debug)]
pub struct StartArgs {
    // No additional arguments - config is handled globally
}

/// Initialize tracing subscriber if the telemetry feature is enabled.
///
/// `RUST_LOG` takes precedence over `level`.
#[cfg(feature = "telemetry")]
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing(_level: &str) {}

/// Load the configuration, falling back to defaults when no file exists at
/// the default location.
pub fn load_config(
    config_path: &Path,
    explicit: bool,
    overrides: &ConfigOverrides,
) -> Result<Config> {
    let mut config = if explicit || config_path.exists() {
        Config::from_file(config_path)
            .with_context(|| format!("failed to load config from {:?}", config_path))?
    } else {
        Config::default()
    };
    config.apply_overrides(overrides);
    config.validate().context("invalid configuration after overrides")?;
    Ok(config)
}

/// Run the start command.
pub async fn run_start(
    _args: StartArgs,
    config_path: &Path,
    explicit: bool,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let config = load_config(config_path, explicit, overrides)?;
    init_tracing(&config.telemetry.log_level);

    if !explicit && !config_path.exists() {
        tracing::info!(path = %config_path.display(), "no config file found; using defaults");
    }

    let mut runtime = Runtime::new(config)?;
    runtime.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_default_config_uses_defaults() {
        let config = load_config(
            Path::new("/nonexistent/geni-am.toml"),
            false,
            &ConfigOverrides {
                log_level: None,
                bind: Some("127.0.0.1:9001".into()),
            },
        )
        .unwrap();
        assert_eq!(config.listener.bind, "127.0.0.1:9001");
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        assert!(load_config(
            Path::new("/nonexistent/geni-am.toml"),
            true,
            &ConfigOverrides::default()
        )
        .is_err());
    }

    #[test]
    fn test_overrides_are_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[catalog]\nsize = 5").unwrap();
        let overrides = ConfigOverrides {
            log_level: Some("chatty".into()),
            bind: None,
        };
        assert!(load_config(file.path(), true, &overrides).is_err());

        let config = load_config(file.path(), true, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.catalog.size, 5);
    }
}
