//! Public aggregate manager adapter.
//!
//! Outermost layer in front of the lifecycle handler. It always answers with
//! an envelope: faults the handler propagates are logged and encoded with the
//! generic failure code. It also carries the legacy `DeleteSliver` call.

use super::envelope::ResultEnvelope;
use super::handler::ReferenceAggregateManager;
use super::options::Options;
use crate::auth::CallerIdentity;
use crate::core::error::{AmResult, GeniCode};
use std::sync::Arc;

/// Fault-encoding front for a [`ReferenceAggregateManager`].
#[derive(Debug, Clone)]
pub struct AggregateManager {
    delegate: Arc<ReferenceAggregateManager>,
}

impl AggregateManager {
    /// Wrap a delegate.
    pub fn new(delegate: Arc<ReferenceAggregateManager>) -> Self {
        Self { delegate }
    }

    /// The wrapped delegate.
    pub fn delegate(&self) -> &Arc<ReferenceAggregateManager> {
        &self.delegate
    }

    fn encode(&self, operation: &str, result: AmResult<ResultEnvelope>) -> ResultEnvelope {
        match result {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(operation, error = %err, "operation faulted");
                ResultEnvelope::failure(
                    self.delegate.am_type(),
                    GeniCode::GenericFailure,
                    err.to_string(),
                )
            }
        }
    }

    /// Describe the aggregate and the API versions it speaks. Needs no credentials.
    pub fn get_version(&self, options: &Options) -> ResultEnvelope {
        self.encode("GetVersion", self.delegate.get_version(options))
    }

    /// Advertise the resource catalog.
    ///
    /// Requires a valid credential but no particular privilege. Slice-scoped
    /// listing is rejected with BadArgs.
    pub fn list_resources(
        &self,
        caller: &CallerIdentity,
        credentials: &[String],
        options: &Options,
    ) -> ResultEnvelope {
        self.encode(
            "ListResources",
            self.delegate.list_resources(caller, credentials, options),
        )
    }

    /// Bind free resources to a new slice and return its manifest.
    ///
    /// Needs `createsliver` over `slice_urn`. Fails with AlreadyExists for a
    /// live slice and Unavailable when the pool is short.
    pub fn allocate(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        rspec: &str,
        options: &Options,
    ) -> ResultEnvelope {
        self.encode(
            "Allocate",
            self.delegate
                .allocate(caller, slice_urn, credentials, rspec, options),
        )
    }

    /// Release every resource of the one slice named by `urns`.
    ///
    /// Needs `deleteslice`. Refused with Unavailable while the slice is shut
    /// down.
    pub fn delete(
        &self,
        caller: &CallerIdentity,
        urns: &[String],
        credentials: &[String],
        options: &Options,
    ) -> ResultEnvelope {
        self.encode(
            "Delete",
            self.delegate.delete(caller, urns, credentials, options),
        )
    }

    /// Legacy single-slice delete, served as `Delete([slice_urn])`.
    pub fn delete_sliver(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        options: &Options,
    ) -> ResultEnvelope {
        tracing::warn!(slice_urn = %slice_urn, "DeleteSliver is deprecated; serving it as Delete");
        self.delete(caller, &[slice_urn.to_string()], credentials, options)
    }

    /// Report the slice status and the status of each of its slivers.
    ///
    /// Needs `getsliceresources`.
    pub fn sliver_status(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        options: &Options,
    ) -> ResultEnvelope {
        self.encode(
            "SliverStatus",
            self.delegate
                .sliver_status(caller, slice_urn, credentials, options),
        )
    }

    /// Move the slice expiration to `expiration_time`.
    ///
    /// Needs `renewsliver`. The new time must be covered by a verified
    /// credential and fall within the lease bound. Refused with Unavailable
    /// while the slice is shut down.
    pub fn renew_sliver(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        expiration_time: &str,
        options: &Options,
    ) -> ResultEnvelope {
        self.encode(
            "RenewSliver",
            self.delegate
                .renew_sliver(caller, slice_urn, credentials, expiration_time, options),
        )
    }

    /// Operator stop of a slice: marks it shut down and keeps its resources.
    ///
    /// Needs `shutdown`.
    pub fn shutdown(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        options: &Options,
    ) -> ResultEnvelope {
        self.encode(
            "Shutdown",
            self.delegate.shutdown(caller, slice_urn, credentials, options),
        )
    }
}
