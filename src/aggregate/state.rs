//! Combined registry and catalog state.
//!
//! Both structures live in one value so that a single lock covers every
//! cross-structure mutation: binding, release, status changes and sweeps.

use super::catalog::ResourceCatalog;
use super::registry::SliceRegistry;

/// All mutable aggregate state.
#[derive(Debug)]
pub struct AggregateState {
    /// Resource pool.
    pub catalog: ResourceCatalog,
    /// Active leases.
    pub registry: SliceRegistry,
}

impl AggregateState {
    /// Create state with a fresh pool of `size` resources.
    pub fn new(size: usize, resource_type: &str) -> Self {
        Self {
            catalog: ResourceCatalog::new(size, resource_type),
            registry: SliceRegistry::new(),
        }
    }

    /// Reset every member of a slice, then drop the slice.
    ///
    /// Returns the number of resources returned to the pool.
    pub fn release_slice(&mut self, urn: &str) -> usize {
        let members = match self.registry.get(urn) {
            Ok(slice) => slice.resources().to_vec(),
            Err(_) => return 0,
        };
        let released = members
            .iter()
            .filter(|id| self.catalog.reset(**id))
            .count();
        self.registry.delete(urn);
        released
    }

    /// Check that every unavailable resource belongs to exactly one slice
    /// and every slice member is unavailable.
    pub fn check_binding_invariant(&self) -> bool {
        self.catalog.all().all(|resource| {
            let owners = self
                .registry
                .all()
                .filter(|s| s.contains(resource.id))
                .count();
            if resource.available {
                owners == 0
            } else {
                owners == 1
            }
        })
    }
}
