//! Aggregate state: resource pool, leases and expiry.
//!
//! - [`catalog`] - Fixed pool of resources and their allocation state
//! - [`slice`] - Lease records and status aggregation
//! - [`registry`] - Unique-key map from slice URN to lease
//! - [`state`] - Catalog and registry under one owner
//! - [`sweeper`] - Reclaims leases past expiration

pub mod catalog;
pub mod registry;
pub mod slice;
pub mod state;
pub mod sweeper;

pub use catalog::{AllocationState, Resource, ResourceCatalog, ResourceId, ResourceStatus};
pub use registry::SliceRegistry;
pub use slice::{aggregate_status, Slice, SliceStatus};
pub use state::AggregateState;
pub use sweeper::{ExpirationSweeper, SweepReport};
