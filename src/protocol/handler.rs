//! Lifecycle protocol handler.
//!
//! The inner delegate implementing the aggregate manager operations. Each
//! operation takes the state lock, sweeps expired slices, authorizes the
//! caller, then validates and commits against the registry and catalog.
//!
//! Taxonomy failures are encoded into the returned envelope here. Faults
//! (authorization failures, internal errors) come back as `Err` and are
//! encoded by the public adapter.

use super::envelope::ResultEnvelope;
use super::options::{ListResourcesOptions, Options};
use super::urn::{publicid_to_urn, Urn};
use super::version::{VersionInfo, API_VERSION};
use crate::aggregate::{
    AggregateState, ExpirationSweeper, Resource, ResourceId, ResourceStatus, SliceStatus,
};
use crate::auth::{
    CallerIdentity, CredentialExpiry, CredentialGateway, CredentialVerifier, Privilege,
};
use crate::core::error::{AmError, AmResult};
use crate::core::time::{format_timestamp, parse_timestamp, Clock};
use crate::rspec::{self, AdvertisedNode, ManifestNode};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Default naming authority.
pub const DEFAULT_AUTHORITY: &str = "geni//gpo//gcf";

/// Default aggregate implementation tag.
pub const DEFAULT_AM_TYPE: &str = "gcf";

/// Default number of pooled resources.
pub const DEFAULT_CATALOG_SIZE: usize = 3;

/// Default resource type tag.
pub const DEFAULT_RESOURCE_TYPE: &str = "fakevm";

/// Default lifetime of a fresh allocation.
pub const DEFAULT_ALLOCATION_WINDOW_SECS: i64 = 600;

/// Default upper bound on any lease.
pub const DEFAULT_MAX_LEASE_DAYS: i64 = 365;

/// Handler settings.
#[derive(Debug, Clone)]
pub struct AggregateSettings {
    /// Public identifier authority, e.g. `geni//gpo//gcf`.
    pub authority: String,
    /// `am_type` reported in every envelope.
    pub am_type: String,
    /// URL reported by GetVersion.
    pub url: String,
    /// Resource pool size.
    pub catalog_size: usize,
    /// Resource type tag.
    pub resource_type: String,
    /// Lifetime of a fresh allocation.
    pub allocation_window: Duration,
    /// Upper bound on any lease, measured from the time of the call.
    pub max_lease: Duration,
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            am_type: DEFAULT_AM_TYPE.to_string(),
            url: "https://127.0.0.1:8001/".to_string(),
            catalog_size: DEFAULT_CATALOG_SIZE,
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            allocation_window: Duration::seconds(DEFAULT_ALLOCATION_WINDOW_SECS),
            max_lease: Duration::days(DEFAULT_MAX_LEASE_DAYS),
        }
    }
}

/// Reference aggregate manager over a fixed pool of abstract resources.
pub struct ReferenceAggregateManager {
    state: Mutex<AggregateState>,
    gateway: CredentialGateway,
    sweeper: ExpirationSweeper,
    clock: Arc<dyn Clock>,
    settings: AggregateSettings,
    am_urn: String,
}

impl ReferenceAggregateManager {
    /// Create a handler with a fresh resource pool.
    pub fn new(
        settings: AggregateSettings,
        verifier: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let am_urn = publicid_to_urn(&format!("{} authority am", settings.authority));
        tracing::info!(
            am_urn = %am_urn,
            resources = settings.catalog_size,
            resource_type = %settings.resource_type,
            "aggregate manager initialized"
        );
        Self {
            state: Mutex::new(AggregateState::new(
                settings.catalog_size,
                &settings.resource_type,
            )),
            gateway: CredentialGateway::new(verifier),
            sweeper: ExpirationSweeper::new(),
            clock,
            settings,
            am_urn,
        }
    }

    /// URN of this aggregate manager.
    pub fn am_urn(&self) -> &str {
        &self.am_urn
    }

    /// Reported `am_type`.
    pub fn am_type(&self) -> &str {
        &self.settings.am_type
    }

    /// Handler settings.
    pub fn settings(&self) -> &AggregateSettings {
        &self.settings
    }

    /// Run `f` against the current state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&AggregateState) -> R) -> R {
        f(&self.state.lock())
    }

    /// URN of a pooled resource.
    pub fn resource_urn(&self, resource: &Resource) -> String {
        publicid_to_urn(&format!(
            "{} {} {}",
            self.settings.authority, resource.kind, resource.id
        ))
    }

    /// URN of the sliver for a bound resource.
    pub fn sliver_urn(&self, id: ResourceId) -> String {
        publicid_to_urn(&format!("{} sliver {}", self.settings.authority, id))
    }

    fn sweep(&self, state: &mut AggregateState) {
        let report = self.sweeper.sweep(state, self.clock.now());
        if !report.is_empty() {
            tracing::info!(
                expired = report.expired_slices.len(),
                released = report.released_resources,
                "reclaimed expired slices"
            );
        }
    }

    /// Encode taxonomy errors; pass faults through.
    fn finish(&self, operation: &str, result: AmResult<Value>) -> AmResult<ResultEnvelope> {
        match result {
            Ok(value) => Ok(ResultEnvelope::success(&self.settings.am_type, value)),
            Err(err) if err.is_fault() => Err(err),
            Err(err) => {
                tracing::error!(operation, code = %err.geni_code(), error = %err, "operation failed");
                Ok(ResultEnvelope::from_error(&self.settings.am_type, &err))
            }
        }
    }

    /// Static capability description.
    pub fn get_version(&self, _options: &Options) -> AmResult<ResultEnvelope> {
        tracing::info!("GetVersion");
        self.sweep(&mut self.state.lock());

        let info = VersionInfo::new(&self.settings.url);
        let value = serde_json::to_value(info).map_err(|e| AmError::internal(e.to_string()))?;
        Ok(ResultEnvelope::success(&self.settings.am_type, value).with_geni_api(API_VERSION))
    }

    /// Advertise the resource pool.
    pub fn list_resources(
        &self,
        caller: &CallerIdentity,
        credentials: &[String],
        options: &Options,
    ) -> AmResult<ResultEnvelope> {
        tracing::info!(caller = %caller.subject, "ListResources");
        let mut state = self.state.lock();
        self.sweep(&mut state);
        self.gateway.authorize(caller, credentials, None, &[])?;

        let result = self.advertise(&state, options);
        self.finish("ListResources", result)
    }

    fn advertise(&self, state: &AggregateState, options: &Options) -> AmResult<Value> {
        let opts = ListResourcesOptions::from_options(options)?;
        let requested = &opts.rspec_version;
        if requested.kind != "geni" {
            return Err(AmError::bad_version(format!(
                "requested RSpec type {} is not a valid option.",
                requested.kind
            )));
        }
        if requested.version != "3" {
            return Err(AmError::bad_version(format!(
                "requested RSpec version {} is not a valid option.",
                requested.version
            )));
        }
        if opts.slice_urn.is_some() {
            return Err(AmError::bad_arguments(
                "option geni_slice_urn is no longer a supported option. Use SliverStatus instead.",
            ));
        }

        let nodes: Vec<AdvertisedNode> = state
            .catalog
            .all()
            .filter(|r| !opts.available_only || r.available)
            .map(|r| AdvertisedNode {
                component_id: self.resource_urn(r),
                component_name: r.id.to_string(),
                available: r.available,
            })
            .collect();
        let document = rspec::encode(&rspec::advertisement(&self.am_urn, &nodes));
        tracing::debug!(nodes = nodes.len(), bytes = document.len(), "advertisement built");

        if opts.compressed {
            let compressed = rspec::compress(&document).map_err(|e| {
                AmError::internal(format!("error compressing resource list: {}", e))
            })?;
            return Ok(Value::String(compressed));
        }
        Ok(Value::String(document))
    }

    /// Bind resources to a new slice.
    pub fn allocate(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        request: &str,
        _options: &Options,
    ) -> AmResult<ResultEnvelope> {
        tracing::info!(caller = %caller.subject, slice_urn = %slice_urn, "Allocate");
        let mut state = self.state.lock();
        self.sweep(&mut state);
        let expiries =
            self.gateway
                .authorize(caller, credentials, Some(slice_urn), &[Privilege::CreateSliver])?;

        let result = self.bind_slice(&mut state, slice_urn, request, &expiries);
        self.finish("Allocate", result)
    }

    fn bind_slice(
        &self,
        state: &mut AggregateState,
        slice_urn: &str,
        request: &str,
        expiries: &[CredentialExpiry],
    ) -> AmResult<Value> {
        if state.registry.contains(slice_urn) {
            return Err(AmError::DuplicateSlice {
                slice_urn: slice_urn.to_string(),
            });
        }

        let request = rspec::parse_request(request)
            .map_err(|e| AmError::bad_arguments(format!("RSpec is unparseable: {}", e)))?;

        let free: Vec<ResourceId> = state.catalog.available(true).map(|r| r.id).collect();
        if request.len() > free.len() {
            return Err(AmError::InsufficientResources {
                requested: request.len(),
                available: free.len(),
            });
        }

        let expiration = self.allocation_expiration(expiries);

        let members: Vec<ResourceId> = free.into_iter().take(request.len()).collect();

        // Validation is complete; commit.
        let slice = state.registry.create(slice_urn, expiration)?;
        for id in &members {
            slice.add_resource(*id);
        }
        for (node, id) in request.nodes.iter().zip(&members) {
            if !state.catalog.bind(*id, node.client_id.as_str()) {
                return Err(AmError::internal(format!("resource {} was not free", id)));
            }
            tracing::info!(resource = %id, slice_urn = %slice_urn, "allocated resource");
        }

        tracing::info!(
            slice_urn = %slice_urn,
            resources = members.len(),
            expires = %format_timestamp(&expiration),
            "allocated slice"
        );

        let geni_expires = format_timestamp(&expiration);
        let mut slivers = Vec::with_capacity(members.len());
        let mut manifest_nodes = Vec::with_capacity(members.len());
        for id in &members {
            let resource = state
                .catalog
                .get(*id)
                .ok_or_else(|| AmError::internal(format!("resource {} vanished", id)))?;
            let sliver_urn = self.sliver_urn(*id);
            slivers.push(json!({
                "geni_sliver_urn": sliver_urn,
                "geni_expires": geni_expires,
                "geni_allocation_status": resource.state.as_str(),
            }));
            manifest_nodes.push(ManifestNode {
                client_id: resource.client_id.clone().unwrap_or_default(),
                component_id: self.resource_urn(resource),
                sliver_id: sliver_urn,
            });
        }

        let manifest = rspec::encode(&rspec::manifest(&self.am_urn, &manifest_nodes));
        Ok(json!({
            "geni_rspec": manifest,
            "geni_slivers": slivers,
        }))
    }

    /// min(now + window, earliest credential expiry, now + max lease).
    fn allocation_expiration(&self, expiries: &[CredentialExpiry]) -> DateTime<Utc> {
        let now = self.clock.now();
        let mut expiration = (now + self.settings.allocation_window).min(now + self.settings.max_lease);
        if let Some(earliest) = CredentialExpiry::earliest(expiries) {
            expiration = expiration.min(earliest);
        }
        expiration
    }

    /// Delete a slice, named by a list of URNs.
    pub fn delete(
        &self,
        caller: &CallerIdentity,
        urns: &[String],
        credentials: &[String],
        _options: &Options,
    ) -> AmResult<ResultEnvelope> {
        tracing::info!(caller = %caller.subject, urns = ?urns, "Delete");
        let mut state = self.state.lock();
        self.sweep(&mut state);

        let slice_urn = match target_slice(urns) {
            Ok(urn) => urn,
            Err(err) => return self.finish("Delete", Err(err)),
        };
        self.gateway
            .authorize(caller, credentials, Some(&slice_urn), &[Privilege::DeleteSlice])?;

        let result = release(&mut state, &slice_urn);
        self.finish("Delete", result)
    }

    /// Report per-resource and aggregated status.
    pub fn sliver_status(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        _options: &Options,
    ) -> AmResult<ResultEnvelope> {
        tracing::info!(caller = %caller.subject, slice_urn = %slice_urn, "SliverStatus");
        let mut state = self.state.lock();
        self.sweep(&mut state);
        self.gateway.authorize(
            caller,
            credentials,
            Some(slice_urn),
            &[Privilege::GetSliceResources],
        )?;

        let result = self.status_of(&state, slice_urn);
        self.finish("SliverStatus", result)
    }

    fn status_of(&self, state: &AggregateState, slice_urn: &str) -> AmResult<Value> {
        let slice = state.registry.get(slice_urn)?;
        let resources: Vec<Value> = slice
            .resources()
            .iter()
            .filter_map(|id| state.catalog.get(*id))
            .map(|r| {
                json!({
                    "geni_urn": self.resource_urn(r),
                    "geni_status": r.status.as_str(),
                    "geni_error": "",
                })
            })
            .collect();
        let status = slice.status(&state.catalog);
        tracing::debug!(slice_urn = %slice_urn, status = %status, "computed slice status");

        Ok(json!({
            "geni_urn": slice_urn,
            "geni_status": status.as_str(),
            "geni_resources": resources,
        }))
    }

    /// Extend a slice's expiration.
    pub fn renew_sliver(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        expiration_time: &str,
        _options: &Options,
    ) -> AmResult<ResultEnvelope> {
        tracing::info!(
            caller = %caller.subject,
            slice_urn = %slice_urn,
            requested = %expiration_time,
            "RenewSliver"
        );
        let mut state = self.state.lock();
        self.sweep(&mut state);
        let expiries =
            self.gateway
                .authorize(caller, credentials, Some(slice_urn), &[Privilege::RenewSliver])?;

        let result = self.renew(&mut state, slice_urn, expiration_time, &expiries);
        self.finish("RenewSliver", result)
    }

    fn renew(
        &self,
        state: &mut AggregateState,
        slice_urn: &str,
        expiration_time: &str,
        expiries: &[CredentialExpiry],
    ) -> AmResult<Value> {
        let status = state.registry.get(slice_urn)?.status(&state.catalog);
        if status == SliceStatus::Shutdown {
            tracing::info!(slice_urn = %slice_urn, "slice not renewed because it is shut down");
            return Err(AmError::unavailable(slice_urn));
        }

        let requested = parse_timestamp(expiration_time)
            .map_err(|e| AmError::bad_arguments(e.to_string()))?;

        let bound = self.clock.now() + self.settings.max_lease;
        if requested > bound {
            return Err(AmError::out_of_range(format!(
                "Expiration {} is out of range (past maximum lease end of {}).",
                format_timestamp(&requested),
                format_timestamp(&bound)
            )));
        }

        if expiries.iter().any(|e| e.covers(requested)) {
            state.registry.get_mut(slice_urn)?.expiration = requested;
            tracing::info!(
                slice_urn = %slice_urn,
                expires = %format_timestamp(&requested),
                "slice renewed"
            );
            return Ok(Value::Bool(true));
        }

        let latest = CredentialExpiry::latest(expiries)
            .map(|t| format_timestamp(&t))
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            slice_urn = %slice_urn,
            credentials = expiries.len(),
            latest = %latest,
            "no credential valid until requested expiration"
        );
        Err(AmError::out_of_range(format!(
            "Expiration {} is out of range (past last credential expiration of {}).",
            format_timestamp(&requested),
            latest
        )))
    }

    /// Mark every member of a slice shut down.
    pub fn shutdown(
        &self,
        caller: &CallerIdentity,
        slice_urn: &str,
        credentials: &[String],
        _options: &Options,
    ) -> AmResult<ResultEnvelope> {
        tracing::info!(caller = %caller.subject, slice_urn = %slice_urn, "Shutdown");
        let mut state = self.state.lock();
        self.sweep(&mut state);
        self.gateway
            .authorize(caller, credentials, Some(slice_urn), &[Privilege::Shutdown])?;

        let result = shut_down(&mut state, slice_urn);
        self.finish("Shutdown", result)
    }
}

impl std::fmt::Debug for ReferenceAggregateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceAggregateManager")
            .field("am_urn", &self.am_urn)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Resolve the slice a Delete call names.
///
/// All URNs must share one type. Only slice URNs are deletable; sliver
/// deletion is not implemented.
fn target_slice(urns: &[String]) -> AmResult<String> {
    if urns.is_empty() {
        return Err(AmError::bad_arguments("no URNs supplied"));
    }

    let mut parsed = Vec::with_capacity(urns.len());
    for raw in urns {
        let urn = Urn::parse(raw)
            .ok_or_else(|| AmError::bad_arguments(format!("invalid URN {}", raw)))?;
        parsed.push(urn);
    }

    let kinds: Vec<&str> = parsed.iter().map(|u| u.kind.as_str()).collect();
    let distinct: BTreeSet<&str> = kinds.iter().copied().collect();
    if distinct.len() > 1 {
        return Err(AmError::bad_arguments(format!(
            "URN types cannot be mixed. Received types: {:?}",
            kinds
        )));
    }

    match kinds[0] {
        "slice" => {}
        "sliver" => {
            return Err(AmError::server_error(
                "deleting individual slivers is not supported",
            ))
        }
        other => {
            return Err(AmError::bad_arguments(format!(
                "URNs of type {} cannot be deleted",
                other
            )))
        }
    }

    let slices: BTreeSet<&str> = urns.iter().map(String::as_str).collect();
    if slices.len() > 1 {
        return Err(AmError::bad_arguments("only one slice may be deleted per call"));
    }
    Ok(urns[0].clone())
}

fn release(state: &mut AggregateState, slice_urn: &str) -> AmResult<Value> {
    let status = state.registry.get(slice_urn)?.status(&state.catalog);
    if status == SliceStatus::Shutdown {
        tracing::info!(slice_urn = %slice_urn, "slice not deleted because it is shut down");
        return Err(AmError::unavailable(slice_urn));
    }

    let released = state.release_slice(slice_urn);
    tracing::info!(slice_urn = %slice_urn, released, "slice deleted");
    Ok(Value::Bool(true))
}

fn shut_down(state: &mut AggregateState, slice_urn: &str) -> AmResult<Value> {
    let members = state.registry.get(slice_urn)?.resources().to_vec();
    for id in &members {
        state.catalog.set_status(*id, ResourceStatus::Shutdown);
    }
    tracing::info!(slice_urn = %slice_urn, resources = members.len(), "slice shut down");
    Ok(Value::Bool(true))
}
