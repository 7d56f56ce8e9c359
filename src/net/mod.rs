//! Networking.
//!
//! - [`codec`] - JSON-lines request/response codec and request signing
//! - [`server`] - Accept loop with a connection limit, and the connection
//!   loop dispatching to the aggregate manager
//!
//! The transport carries no TLS. It is meant for development, behind a
//! TLS-terminating front end, and only starts when explicitly marked
//! insecure in configuration.

pub mod codec;
pub mod server;

pub use codec::{JsonLineCodec, RpcCall, RpcRequest, RpcResponse};
pub use server::{dispatch, RpcServer, RpcServerConfig};

use std::net::SocketAddr;
use thiserror::Error;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not bind the listen address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    Accept(std::io::Error),

    /// A connection arrived while at the connection limit.
    #[error("connection limit of {limit} reached")]
    AtCapacity { limit: usize },

    /// Other socket failure.
    #[error("i/o error: {0}")]
    Io(std::io::Error),
}
