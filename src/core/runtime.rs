//! Main runtime orchestration.
//!
//! The runtime coordinates component lifecycle:
//! - Start order: credential trust → aggregate manager → listener
//! - Shutdown order: listener → aggregate manager

use crate::auth::keys::{self, VerifyingKey};
use crate::auth::StaticTrustVerifier;
use crate::core::config::Config;
use crate::core::time::{Clock, SystemClock};
use crate::net::{RpcServer, TransportError};
use crate::protocol::{AggregateManager, ReferenceAggregateManager};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Read trusted issuer keys from every regular file in `dir`.
///
/// Each line holds an issuer URN and its base64 Ed25519 public key,
/// separated by whitespace. Blank lines and lines starting with `#` are
/// ignored. Files are read in name order.
pub fn load_trust_roots(dir: &Path) -> Result<Vec<(String, VerifyingKey)>> {
    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read trust roots directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("failed to list trust roots directory: {}", dir.display()))?;
    paths.sort();

    let mut roots = Vec::new();
    for path in paths.iter().filter(|p| p.is_file()) {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trust root file: {}", path.display()))?;
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (issuer, key) = match (fields.next(), fields.next(), fields.next()) {
                (Some(issuer), Some(key), None) => (issuer, key),
                _ => anyhow::bail!(
                    "{}:{}: expected `<issuer-urn> <public-key>`",
                    path.display(),
                    index + 1
                ),
            };
            let key = keys::decode_public_key(key)
                .with_context(|| format!("{}:{}: invalid public key", path.display(), index + 1))?;
            roots.push((issuer.to_string(), key));
        }
    }
    Ok(roots)
}

/// Aggregate manager runtime holding all component handles.
pub struct Runtime {
    /// Configuration.
    config: Arc<Config>,

    /// Time source shared by the verifier and the aggregate.
    clock: Arc<dyn Clock>,

    /// Public aggregate manager (once started).
    manager: Option<AggregateManager>,

    /// Whether the runtime is running.
    running: Arc<AtomicBool>,

    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,

    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,

    /// RPC server task handle.
    server_handle: Option<JoinHandle<Result<(), TransportError>>>,
}

impl Runtime {
    /// Create a new runtime with the given configuration.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a runtime reading time from `clock`.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config: Arc::new(config),
            clock,
            manager: None,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            shutdown_rx,
            server_handle: None,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the aggregate manager (if started).
    pub fn manager(&self) -> Option<&AggregateManager> {
        self.manager.as_ref()
    }

    /// Check if the runtime is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get a shutdown receiver for graceful shutdown coordination.
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Initialize and start all runtime components.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(
            authority = %self.config.aggregate.authority,
            bind = %self.config.listener.bind,
            "starting aggregate manager runtime"
        );

        self.init_aggregate()?;
        self.start_listener().await?;

        self.running.store(true, Ordering::Release);
        tracing::info!("aggregate manager runtime started");
        Ok(())
    }

    /// Build the credential verifier and the aggregate manager.
    fn init_aggregate(&mut self) -> Result<()> {
        tracing::debug!("initializing aggregate manager");

        let mut issuers = self.config.issuer_keys()?;
        if let Some(ref dir) = self.config.credentials.trust_roots_dir {
            let loaded = load_trust_roots(dir)?;
            tracing::info!(
                dir = %dir.display(),
                count = loaded.len(),
                "loaded trust roots"
            );
            issuers.extend(loaded);
        }
        if issuers.is_empty() {
            tracing::warn!("no trusted issuers configured; every credential will be rejected");
        }

        let verifier = StaticTrustVerifier::new(issuers, Arc::clone(&self.clock));
        let delegate = ReferenceAggregateManager::new(
            self.config.aggregate_settings(),
            Arc::new(verifier),
            Arc::clone(&self.clock),
        );
        self.manager = Some(AggregateManager::new(Arc::new(delegate)));
        Ok(())
    }

    /// Start the RPC listener.
    async fn start_listener(&mut self) -> Result<()> {
        tracing::debug!("starting rpc listener");

        if !self.config.listener.insecure {
            anyhow::bail!(
                "the rpc listener serves plaintext only and requires listener.insecure=true. \
                Terminate TLS in front of it."
            );
        }
        let manager = self
            .manager
            .clone()
            .context("aggregate manager not initialized")?;

        let server_config = self.config.server_config()?;
        tracing::warn!(
            bind = %server_config.bind_addr,
            "starting rpc listener in INSECURE mode (no TLS)"
        );

        let server = Arc::new(RpcServer::new(
            server_config,
            manager,
            self.shutdown_rx.clone(),
        ));
        let listener = server.bind().await?;
        self.server_handle = Some(tokio::spawn(server.serve(listener)));
        Ok(())
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        tracing::info!("shutdown requested");
        let _ = self.shutdown_tx.send(true);
    }

    /// Run the runtime until shutdown.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        let mut shutdown_rx = self.shutdown_rx.clone();
        let shutdown_requested = async move {
            while !*shutdown_rx.borrow() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        };

        if let Some(handle) = self.server_handle.take() {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::warn!("shutdown signal received (SIGINT)");
                }
                _ = shutdown_requested => {
                    tracing::info!("shutdown requested by component");
                }
                result = handle => {
                    match result {
                        Ok(Ok(())) => tracing::info!("rpc server stopped normally"),
                        Ok(Err(e)) => tracing::error!(error = %e, "rpc server failed"),
                        Err(e) => tracing::error!(error = %e, "rpc server task panicked"),
                    }
                }
            }
        }

        self.stop().await
    }

    /// Stop all runtime components.
    pub async fn stop(&mut self) -> Result<()> {
        tracing::info!("stopping aggregate manager runtime");
        self.running.store(false, Ordering::Release);

        // Signal shutdown to all components
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.server_handle.take() {
            match tokio::time::timeout(std::time::Duration::from_secs(5), handle).await {
                Ok(Ok(Ok(()))) => tracing::info!("rpc server stopped"),
                Ok(Ok(Err(e))) => tracing::warn!(error = %e, "rpc server stopped with error"),
                Ok(Err(e)) => tracing::warn!(error = %e, "rpc server task panicked"),
                Err(_) => tracing::warn!("rpc server stop timed out"),
            }
        }

        if let Some(manager) = self.manager.take() {
            let slices = manager.delegate().with_state(|state| state.registry.len());
            tracing::info!(slices, "aggregate manager released");
        }

        tracing::info!("aggregate manager runtime stopped");
        Ok(())
    }

    /// Start the runtime for tests (without listener or signal handling).
    pub async fn start_for_tests(&mut self) -> Result<()> {
        self.init_aggregate()?;
        self.running.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("running", &self.is_running())
            .field("serving", &self.server_handle.is_some())
            .finish_non_exhaustive()
    }
}
