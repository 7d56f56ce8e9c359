//! Slice (lease) records.
//!
//! A slice is a named lease over a set of catalog resources with a single
//! absolute expiration. Slices refer to resources by id only; the catalog
//! remains the owner of resource state.

use super::catalog::{ResourceCatalog, ResourceId, ResourceStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Aggregated status of a slice, derived from its member resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceStatus {
    Shutdown,
    Failed,
    Configuring,
    Ready,
    Unknown,
}

impl SliceStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::Failed => "failed",
            Self::Configuring => "configuring",
            Self::Ready => "ready",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SliceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evaluate the status precedence rules over a set of resource statuses.
///
/// Rules, first match wins:
/// 1. any `shutdown` → `shutdown`
/// 2. any `failed` → `failed`
/// 3. any `configuring` → `configuring`
/// 4. non-empty and every member `ready` → `ready`
/// 5. otherwise `unknown`
pub fn aggregate_status<I>(statuses: I) -> SliceStatus
where
    I: IntoIterator<Item = ResourceStatus>,
{
    let mut counts: HashMap<ResourceStatus, usize> = HashMap::new();
    let mut total = 0usize;
    for status in statuses {
        *counts.entry(status).or_default() += 1;
        total += 1;
    }
    let count = |status: ResourceStatus| counts.get(&status).copied().unwrap_or(0);

    if count(ResourceStatus::Shutdown) > 0 {
        SliceStatus::Shutdown
    } else if count(ResourceStatus::Failed) > 0 {
        SliceStatus::Failed
    } else if count(ResourceStatus::Configuring) > 0 {
        SliceStatus::Configuring
    } else if total > 0 && count(ResourceStatus::Ready) == total {
        SliceStatus::Ready
    } else {
        SliceStatus::Unknown
    }
}

/// An active lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    /// Internally generated lease identifier.
    pub lease_id: Uuid,

    /// Caller-supplied slice URN (registry key).
    pub urn: String,

    /// Absolute expiration instant.
    pub expiration: DateTime<Utc>,

    /// Bound resources, in binding order.
    resources: Vec<ResourceId>,
}

impl Slice {
    /// Create an empty slice.
    pub fn new(urn: impl Into<String>, expiration: DateTime<Utc>) -> Self {
        Self {
            lease_id: Uuid::new_v4(),
            urn: urn.into(),
            expiration,
            resources: Vec::new(),
        }
    }

    /// Add a resource to the slice. Adding the same id twice is a no-op.
    pub fn add_resource(&mut self, id: ResourceId) {
        if !self.resources.contains(&id) {
            self.resources.push(id);
        }
    }

    /// Member resource ids.
    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// Check membership.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources.contains(&id)
    }

    /// Check if the lease has lapsed at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration < now
    }

    /// Derive the aggregated status from the catalog.
    pub fn status(&self, catalog: &ResourceCatalog) -> SliceStatus {
        aggregate_status(
            self.resources
                .iter()
                .filter_map(|id| catalog.get(*id))
                .map(|r| r.status),
        )
    }
}
