//! Resource catalog.
//!
//! The catalog owns a fixed pool of abstract resources created once at
//! startup. Resources are never created or destroyed afterwards: allocation
//! binds them into a slice, and release resets them back into the pool.
//!
//! A resource is unavailable iff it is bound into exactly one live slice.
//! [`ResourceCatalog::reset`] must run before a slice drops its membership.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque resource identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub Uuid);

impl ResourceId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operational status of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Unconfigured,
    Configuring,
    Ready,
    Failed,
    Shutdown,
}

impl ResourceStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Configuring => "configuring",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Allocation stage of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationState {
    #[serde(rename = "geni_unallocated")]
    Unallocated,
    #[serde(rename = "geni_allocated")]
    Allocated,
    #[serde(rename = "geni_provisioned")]
    Provisioned,
}

impl AllocationState {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unallocated => "geni_unallocated",
            Self::Allocated => "geni_allocated",
            Self::Provisioned => "geni_provisioned",
        }
    }
}

impl std::fmt::Display for AllocationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pooled resource record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Opaque identifier, fixed for the life of the process.
    pub id: ResourceId,

    /// Type tag, e.g. `fakevm`.
    pub kind: String,

    /// Client-assigned identifier from the request that bound this resource.
    pub client_id: Option<String>,

    /// Whether the resource is free to be bound.
    pub available: bool,

    /// Operational status.
    pub status: ResourceStatus,

    /// Allocation stage.
    pub state: AllocationState,
}

impl Resource {
    /// Create a fresh, unbound resource.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: ResourceId::generate(),
            kind: kind.into(),
            client_id: None,
            available: true,
            status: ResourceStatus::Unconfigured,
            state: AllocationState::Unallocated,
        }
    }

    fn reset(&mut self) {
        self.client_id = None;
        self.available = true;
        self.status = ResourceStatus::Unconfigured;
        self.state = AllocationState::Unallocated;
    }
}

/// Fixed-size pool of resources.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    /// Resources in stable enumeration order.
    resources: Vec<Resource>,
}

impl ResourceCatalog {
    /// Create a catalog of `size` resources of the given type.
    pub fn new(size: usize, kind: &str) -> Self {
        Self {
            resources: (0..size).map(|_| Resource::new(kind)).collect(),
        }
    }

    /// Number of resources in the pool.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// All resources, in stable order.
    pub fn all(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Resources whose availability matches `flag`, in stable order.
    pub fn available(&self, flag: bool) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.available == flag)
    }

    /// Count resources currently free to bind.
    pub fn available_count(&self) -> usize {
        self.available(true).count()
    }

    /// Look up a resource by id.
    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: ResourceId) -> Option<&mut Resource> {
        self.resources.iter_mut().find(|r| r.id == id)
    }

    /// Bind an available resource to a client id.
    ///
    /// Returns false if the resource is unknown or already bound.
    pub fn bind(&mut self, id: ResourceId, client_id: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(resource) if resource.available => {
                resource.available = false;
                resource.client_id = Some(client_id.into());
                resource.state = AllocationState::Allocated;
                true
            }
            _ => false,
        }
    }

    /// Set the operational status of a resource.
    pub fn set_status(&mut self, id: ResourceId, status: ResourceStatus) -> bool {
        match self.get_mut(id) {
            Some(resource) => {
                resource.status = status;
                true
            }
            None => false,
        }
    }

    /// Return a resource to the pool, clearing all binding fields.
    pub fn reset(&mut self, id: ResourceId) -> bool {
        match self.get_mut(id) {
            Some(resource) => {
                resource.reset();
                true
            }
            None => false,
        }
    }
}
