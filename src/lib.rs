//! geni-am - GENI AM API v3 reference aggregate manager.
//!
//! A reference aggregate manager leasing a fixed pool of abstract resources
//! to slices. Callers present credentials, request resources through RSpec
//! documents, and receive GENI result envelopes. No real resources are
//! provisioned; slivers exist only as state in memory.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   JSON-lines RPC (net::server)                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │               Public adapter (protocol::public)                 │
//! │          every outcome becomes a result envelope                │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │             Reference handler (protocol::handler)               │
//! │   credentials │ URNs │ RSpec │ lease policy │ expiry sweep      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                Aggregate state (aggregate::*)                   │
//! │          resource catalog │ slice registry │ sweeper            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Main runtime orchestration
//! - [`core::time`] - Clocks and timestamp formats
//! - [`core::error`] - Error taxonomy and GENI codes
//!
//! ## Aggregate
//! - [`aggregate::catalog`] - Fixed resource pool
//! - [`aggregate::registry`] - Slice records
//! - [`aggregate::sweeper`] - Expiration sweep
//!
//! ## Authorization
//! - [`auth::gateway`] - Privilege checks over a pluggable verifier
//! - [`auth::keys`] - Ed25519 keys and signatures
//! - [`auth::verifier`] - Signed credentials against trusted issuer keys
//!
//! ## Protocol
//! - [`protocol::handler`] - Reference semantics of each operation
//! - [`protocol::public`] - Envelope-only facade
//! - [`protocol::urn`] - Public identifier URNs
//!
//! ## RSpec
//! - [`rspec::parser`] - XML request parsing
//! - [`rspec::document`] - Advertisement and manifest rendering
//!
//! ## Networking
//! - [`net::codec`] - Request framing and caller signatures
//! - [`net::server`] - Accept loop, connection handling and dispatch
//!
//! # Key Invariants
//!
//! - A resource is bound to at most one slice, and only while that slice exists
//! - Allocation is all-or-nothing
//! - No slice outlives its expiration once any operation has run

// Core infrastructure
pub mod core;

// Resource pool and slice state
pub mod aggregate;

// Credentials and privileges
pub mod auth;

// AM API operations
pub mod protocol;

// RSpec documents
pub mod rspec;

// Networking
pub mod net;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime, time};
pub use protocol::{AggregateManager, ReferenceAggregateManager, ResultEnvelope};
