//! RPC server.
//!
//! Accept loop plus per-connection read/decode/dispatch/write loop. Each
//! connection runs on its own task holding one permit of the connection
//! limit; all of them share one [`AggregateManager`] and serialize on its
//! state lock.

use super::codec::{
    DecodeResult, EncodeResult, JsonLineCodec, ProtocolCodec, RpcCall, RpcRequest, RpcResponse,
};
use super::TransportError;
use crate::auth::CallerIdentity;
use crate::core::error::GeniCode;
use crate::protocol::{AggregateManager, ResultEnvelope};
use bytes::BytesMut;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Maximum request line length.
    pub max_frame_bytes: usize,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8001)),
            max_connections: 1024,
            max_frame_bytes: 1024 * 1024,
        }
    }
}

fn caller_of(request: &RpcRequest) -> CallerIdentity {
    match request.caller_identity() {
        Ok(caller) => caller,
        Err(message) => {
            tracing::warn!(
                method = %request.method,
                caller = request.caller.as_deref().unwrap_or("-"),
                error = %message,
                "caller proof rejected"
            );
            CallerIdentity::new(request.caller.clone().unwrap_or_default())
        }
    }
}

/// Run one decoded request against the aggregate manager.
pub fn dispatch(manager: &AggregateManager, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    let call = match RpcCall::from_request(&request) {
        Ok(call) => call,
        Err(message) => {
            tracing::warn!(method = %request.method, error = %message, "rejected request");
            return RpcResponse {
                id,
                result: ResultEnvelope::failure(
                    manager.delegate().am_type(),
                    GeniCode::BadArgs,
                    format!("Bad Arguments: {}", message),
                ),
            };
        }
    };
    let caller = caller_of(&request);
    tracing::debug!(
        method = call.method(),
        caller = %caller.subject,
        authenticated = caller.is_authenticated(),
        "dispatching call"
    );

    let result = match call {
        RpcCall::GetVersion(p) => manager.get_version(&p.options),
        RpcCall::ListResources(p) => manager.list_resources(&caller, &p.credentials, &p.options),
        RpcCall::Allocate(p) => {
            manager.allocate(&caller, &p.slice_urn, &p.credentials, &p.rspec, &p.options)
        }
        RpcCall::Delete(p) => manager.delete(&caller, &p.urns, &p.credentials, &p.options),
        RpcCall::DeleteSliver(p) => {
            manager.delete_sliver(&caller, &p.slice_urn, &p.credentials, &p.options)
        }
        RpcCall::SliverStatus(p) => {
            manager.sliver_status(&caller, &p.slice_urn, &p.credentials, &p.options)
        }
        RpcCall::RenewSliver(p) => manager.renew_sliver(
            &caller,
            &p.slice_urn,
            &p.credentials,
            &p.expiration_time,
            &p.options,
        ),
        RpcCall::Shutdown(p) => manager.shutdown(&caller, &p.slice_urn, &p.credentials, &p.options),
    };
    RpcResponse { id, result }
}

/// JSON-lines RPC server in front of an [`AggregateManager`].
pub struct RpcServer {
    config: RpcServerConfig,
    manager: AggregateManager,
    connections: Arc<Semaphore>,
    next_connection: AtomicU64,
    shutdown_rx: watch::Receiver<bool>,
}

impl RpcServer {
    /// Create a server; nothing is bound until [`RpcServer::bind`].
    pub fn new(
        config: RpcServerConfig,
        manager: AggregateManager,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let connections = Arc::new(Semaphore::new(config.max_connections));
        Self {
            config,
            manager,
            connections,
            next_connection: AtomicU64::new(1),
            shutdown_rx,
        }
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.config.max_connections - self.connections.available_permits()
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, TransportError> {
        let addr = self.config.bind_addr;
        TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })
    }

    /// Bind, then serve until shutdown.
    pub async fn run(self: Arc<Self>) -> Result<(), TransportError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound socket until shutdown.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<(), TransportError> {
        let local_addr = listener.local_addr().map_err(TransportError::Io)?;
        let protocol = JsonLineCodec::new(self.config.max_frame_bytes).protocol_name();
        tracing::info!(
            addr = %local_addr,
            protocol,
            max_connections = self.config.max_connections,
            "rpc listener started"
        );

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => self.admit(stream, remote),
                    Err(e) => tracing::warn!(error = %TransportError::Accept(e), "accept failed"),
                },
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!(addr = %local_addr, "rpc listener stopped");
        Ok(())
    }

    /// Hand an accepted stream to its own task, or drop it at the limit.
    fn admit(self: &Arc<Self>, stream: TcpStream, remote: SocketAddr) {
        let permit = match Arc::clone(&self.connections).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let limit = self.config.max_connections;
                tracing::warn!(
                    remote = %remote,
                    error = %TransportError::AtCapacity { limit },
                    "rejected connection"
                );
                return;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(remote = %remote, error = %e, "failed to set nodelay");
        }

        let conn = self.next_connection.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(conn, remote = %remote, "connection accepted");
        let server = Arc::clone(self);
        tokio::spawn(async move {
            server.handle_connection(stream, remote).await;
            drop(permit);
            tracing::debug!(conn, "connection closed");
        });
    }

    async fn handle_connection(&self, mut stream: TcpStream, remote: SocketAddr) {
        let codec = JsonLineCodec::new(self.config.max_frame_bytes);
        let mut buffer = BytesMut::with_capacity(4096);
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = stream.read_buf(&mut buffer) => {
                    match result {
                        Ok(0) => break,
                        Ok(_) => {
                            if !self.drain(&codec, &mut buffer, &mut stream, remote).await {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!(remote = %remote, error = %e, "read failed");
                            break;
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Answer every complete request in the buffer. Returns false when the
    /// connection should close.
    async fn drain(
        &self,
        codec: &JsonLineCodec,
        buffer: &mut BytesMut,
        stream: &mut TcpStream,
        remote: SocketAddr,
    ) -> bool {
        loop {
            let response = match codec.decode(buffer) {
                DecodeResult::Complete(request) => dispatch(&self.manager, request),
                DecodeResult::Incomplete => return true,
                DecodeResult::Invalid(message) => {
                    tracing::warn!(remote = %remote, error = %message, "malformed request");
                    RpcResponse {
                        id: Value::Null,
                        result: ResultEnvelope::failure(
                            self.manager.delegate().am_type(),
                            GeniCode::BadArgs,
                            format!("Bad Arguments: {}", message),
                        ),
                    }
                }
                DecodeResult::TooLarge(size) => {
                    tracing::warn!(
                        remote = %remote,
                        size,
                        limit = codec.max_frame_bytes(),
                        "request too large; closing connection"
                    );
                    return false;
                }
            };

            let bytes = match codec.encode(&response) {
                EncodeResult::Ok(bytes) => bytes,
                EncodeResult::Error(e) => {
                    tracing::error!(remote = %remote, error = %e, "failed to encode response");
                    return false;
                }
            };
            if let Err(e) = stream.write_all(&bytes).await {
                tracing::debug!(remote = %remote, error = %e, "write failed");
                return false;
            }
        }
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("config", &self.config)
            .field("active_connections", &self.active_connections())
            .finish_non_exhaustive()
    }
}
