//! Configuration parsing and validation.
//!
//! Configuration is loaded from TOML files with CLI overrides. Every section
//! and field has a default, so an empty file is a valid configuration.

use crate::auth::keys::{self, VerifyingKey};
use crate::net::RpcServerConfig;
use crate::protocol::AggregateSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Aggregate identity.
    #[serde(default)]
    pub aggregate: AggregateConfig,

    /// Resource pool.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Lease limits.
    #[serde(default)]
    pub leases: LeaseConfig,

    /// RPC listener.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Credential trust.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Logging.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Aggregate identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Public identifier authority used to build URNs.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Implementation tag reported in result envelopes.
    #[serde(default = "default_am_type")]
    pub am_type: String,

    /// URL reported by GetVersion. Defaults to `https://<listener.bind>/`.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            am_type: default_am_type(),
            url: None,
        }
    }
}

/// Resource pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Number of resources, fixed for the life of the process.
    #[serde(default = "default_catalog_size")]
    pub size: usize,

    /// Resource type tag.
    #[serde(default = "default_resource_type")]
    pub resource_type: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            size: default_catalog_size(),
            resource_type: default_resource_type(),
        }
    }
}

/// Lease limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Lifetime of a fresh allocation, in seconds.
    #[serde(default = "default_allocation_window_seconds")]
    pub allocation_window_seconds: u64,

    /// Upper bound on any lease, in days from the time of the call.
    #[serde(default = "default_max_lease_days")]
    pub max_lease_days: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            allocation_window_seconds: default_allocation_window_seconds(),
            max_lease_days: default_max_lease_days(),
        }
    }
}

/// RPC listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Serve plaintext. Required: TLS is terminated in front of this listener.
    #[serde(default)]
    pub insecure: bool,

    /// Maximum concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum request line length in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            insecure: false,
            max_connections: default_max_connections(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Credential trust configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Issuer URN to base64 Ed25519 public key, for issuers whose signed
    /// credentials are accepted.
    #[serde(default)]
    pub trusted_issuers: BTreeMap<String, String>,

    /// Directory of files listing further trusted issuers, one
    /// `<issuer-urn> <base64-public-key>` pair per line.
    #[serde(default)]
    pub trust_roots_dir: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_authority() -> String {
    crate::protocol::handler::DEFAULT_AUTHORITY.to_string()
}

fn default_am_type() -> String {
    crate::protocol::handler::DEFAULT_AM_TYPE.to_string()
}

fn default_catalog_size() -> usize {
    crate::protocol::handler::DEFAULT_CATALOG_SIZE
}

fn default_resource_type() -> String {
    crate::protocol::handler::DEFAULT_RESOURCE_TYPE.to_string()
}

fn default_allocation_window_seconds() -> u64 {
    600
}

fn default_max_lease_days() -> u64 {
    365
}

fn default_bind() -> String {
    "127.0.0.1:8001".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

const SECONDS_PER_DAY: u64 = 86_400;

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to serialize config")
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref bind) = overrides.bind {
            self.listener.bind = bind.clone();
        }
    }

    /// URL reported by GetVersion.
    pub fn url(&self) -> String {
        self.aggregate
            .url
            .clone()
            .unwrap_or_else(|| format!("https://{}/", self.listener.bind))
    }

    /// Parsed listener address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.listener
            .bind
            .parse()
            .with_context(|| format!("listener.bind is not a socket address: {}", self.listener.bind))
    }

    /// Handler settings derived from this configuration.
    pub fn aggregate_settings(&self) -> AggregateSettings {
        AggregateSettings {
            authority: self.aggregate.authority.clone(),
            am_type: self.aggregate.am_type.clone(),
            url: self.url(),
            catalog_size: self.catalog.size,
            resource_type: self.catalog.resource_type.clone(),
            allocation_window: chrono::Duration::seconds(
                self.leases.allocation_window_seconds as i64,
            ),
            max_lease: chrono::Duration::days(self.leases.max_lease_days as i64),
        }
    }

    /// Server settings derived from this configuration.
    pub fn server_config(&self) -> Result<RpcServerConfig> {
        Ok(RpcServerConfig {
            bind_addr: self.bind_addr()?,
            max_connections: self.listener.max_connections,
            max_frame_bytes: self.listener.max_frame_bytes,
        })
    }

    /// Issuer keys configured inline.
    pub fn issuer_keys(&self) -> Result<Vec<(String, VerifyingKey)>> {
        self.credentials
            .trusted_issuers
            .iter()
            .map(|(issuer, key)| -> Result<(String, VerifyingKey)> {
                let key = keys::decode_public_key(key).with_context(|| {
                    format!("credentials.trusted_issuers has an invalid key for {}", issuer)
                })?;
                Ok((issuer.clone(), key))
            })
            .collect()
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_aggregate()?;
        self.validate_catalog()?;
        self.validate_leases()?;
        self.validate_listener()?;
        self.validate_credentials()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_aggregate(&self) -> Result<()> {
        if self.aggregate.authority.trim().is_empty() {
            anyhow::bail!("aggregate.authority must not be empty");
        }
        if self.aggregate.am_type.trim().is_empty() {
            anyhow::bail!("aggregate.am_type must not be empty");
        }
        Ok(())
    }

    fn validate_catalog(&self) -> Result<()> {
        if self.catalog.size == 0 {
            anyhow::bail!("catalog.size must be > 0");
        }
        let kind = &self.catalog.resource_type;
        if kind.is_empty() || kind.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "catalog.resource_type must be a non-empty word, got: {:?}",
                kind
            );
        }
        Ok(())
    }

    fn validate_leases(&self) -> Result<()> {
        if self.leases.allocation_window_seconds == 0 {
            anyhow::bail!("leases.allocation_window_seconds must be > 0");
        }
        if self.leases.max_lease_days == 0 {
            anyhow::bail!("leases.max_lease_days must be > 0");
        }
        // Keeps the chrono conversions in range.
        if self.leases.max_lease_days > 100 * 365 {
            anyhow::bail!("leases.max_lease_days must be at most 36500");
        }
        let max_lease_seconds = self.leases.max_lease_days * SECONDS_PER_DAY;
        if self.leases.allocation_window_seconds > max_lease_seconds {
            anyhow::bail!(
                "leases.allocation_window_seconds ({}) cannot exceed max_lease_days ({} days)",
                self.leases.allocation_window_seconds,
                self.leases.max_lease_days
            );
        }
        Ok(())
    }

    fn validate_listener(&self) -> Result<()> {
        self.bind_addr()?;
        if self.listener.max_connections == 0 {
            anyhow::bail!("listener.max_connections must be > 0");
        }
        if self.listener.max_frame_bytes == 0 {
            anyhow::bail!("listener.max_frame_bytes must be > 0");
        }
        Ok(())
    }

    fn validate_credentials(&self) -> Result<()> {
        if let Some(issuer) = self
            .credentials
            .trusted_issuers
            .keys()
            .find(|i| i.trim().is_empty())
        {
            anyhow::bail!("credentials.trusted_issuers contains an empty issuer: {:?}", issuer);
        }
        self.issuer_keys()?;

        if let Some(ref dir) = self.credentials.trust_roots_dir {
            // Only checked outside unit tests
            #[cfg(not(test))]
            {
                if !dir.is_dir() {
                    anyhow::bail!(
                        "credentials.trust_roots_dir is not a directory: {}",
                        dir.display()
                    );
                }
            }
            let _ = dir;
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override listener bind address.
    pub bind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.aggregate.authority, "geni//gpo//gcf");
        assert_eq!(config.aggregate.am_type, "gcf");
        assert_eq!(config.catalog.size, 3);
        assert_eq!(config.catalog.resource_type, "fakevm");
        assert_eq!(config.leases.allocation_window_seconds, 600);
        assert_eq!(config.leases.max_lease_days, 365);
        assert_eq!(config.listener.bind, "127.0.0.1:8001");
        assert!(!config.listener.insecure);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.url(), "https://127.0.0.1:8001/");
    }

    #[test]
    fn test_settings_conversion() {
        let config = Config::from_toml(
            r#"
            [aggregate]
            url = "https://am.example.net:5001/"

            [leases]
            allocation_window_seconds = 120
            max_lease_days = 2
            "#,
        )
        .unwrap();
        let settings = config.aggregate_settings();
        assert_eq!(settings.url, "https://am.example.net:5001/");
        assert_eq!(settings.allocation_window, chrono::Duration::seconds(120));
        assert_eq!(settings.max_lease, chrono::Duration::days(2));
    }

    #[test]
    fn test_invalid_values() {
        for bad in [
            "[catalog]\nsize = 0",
            "[catalog]\nresource_type = \"fake vm\"",
            "[leases]\nallocation_window_seconds = 0",
            "[leases]\nmax_lease_days = 1\nallocation_window_seconds = 86401",
            "[listener]\nbind = \"nowhere\"",
            "[listener]\nmax_frame_bytes = 0",
            "[telemetry]\nlog_level = \"loud\"",
            "[aggregate]\nauthority = \"  \"",
            "[credentials.trusted_issuers]\n\"\" = \"O2onvM62pC1io6jQKm8Nc2UyFXcd4kOmOsBIoYtZ2ik=\"",
            "[credentials.trusted_issuers]\n\"urn:publicid:IDN+ch+authority+sa\" = \"c2hvcnQ=\"",
        ] {
            assert!(Config::from_toml(bad).is_err(), "accepted: {}", bad);
        }
    }

    #[test]
    fn test_issuer_keys() {
        let key = crate::auth::SigningKey::from_bytes(&[1u8; 32]).verifying_key();
        let config = Config::from_toml(&format!(
            "[credentials.trusted_issuers]\n\"urn:publicid:IDN+ch+authority+sa\" = \"{}\"\n",
            keys::encode_public_key(&key)
        ))
        .unwrap();
        assert_eq!(
            config.issuer_keys().unwrap(),
            vec![("urn:publicid:IDN+ch+authority+sa".to_string(), key)]
        );
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(&ConfigOverrides {
            log_level: Some("debug".into()),
            bind: Some("0.0.0.0:9443".into()),
        });
        assert_eq!(config.telemetry.log_level, "debug");
        assert_eq!(config.bind_addr().unwrap().port(), 9443);
        assert_eq!(config.url(), "https://0.0.0.0:9443/");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let rendered = config.to_toml().unwrap();
        let back = Config::from_toml(&rendered).unwrap();
        assert_eq!(back.listener.bind, config.listener.bind);
        assert_eq!(back.catalog.size, config.catalog.size);
    }
}
