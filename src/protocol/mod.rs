//! Aggregate manager protocol.
//!
//! - [`handler`] - Lifecycle operations over the aggregate state
//! - [`public`] - Outer adapter encoding faults into envelopes
//! - [`envelope`] - `{code, value, output}` result structure
//! - [`options`] - Operation options
//! - [`urn`] - Public identifier URNs
//! - [`version`] - GetVersion capability description

pub mod envelope;
pub mod handler;
pub mod options;
pub mod public;
pub mod urn;
pub mod version;

pub use envelope::{ResultCode, ResultEnvelope};
pub use handler::{AggregateSettings, ReferenceAggregateManager};
pub use options::{ListResourcesOptions, Options};
pub use public::AggregateManager;
pub use urn::{publicid_to_urn, Urn};
pub use version::VersionInfo;
