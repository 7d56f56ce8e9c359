//! Slice registry.
//!
//! Unique-key map from slice URN to its active lease. Uniqueness of the key
//! is what prevents the same lease name from being allocated twice: no two
//! `create` calls succeed for one URN without an intervening `delete`.

use super::slice::Slice;
use crate::core::error::{AmError, AmResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Registry of active slices.
#[derive(Debug, Default)]
pub struct SliceRegistry {
    slices: HashMap<String, Slice>,
}

impl SliceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered slices.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Check if no slices are registered.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Check if a URN is registered.
    pub fn contains(&self, urn: &str) -> bool {
        self.slices.contains_key(urn)
    }

    /// Register a new, empty slice.
    pub fn create(&mut self, urn: &str, expiration: DateTime<Utc>) -> AmResult<&mut Slice> {
        if self.slices.contains_key(urn) {
            return Err(AmError::DuplicateSlice {
                slice_urn: urn.to_string(),
            });
        }
        Ok(self
            .slices
            .entry(urn.to_string())
            .or_insert_with(|| Slice::new(urn, expiration)))
    }

    /// Look up a slice.
    pub fn get(&self, urn: &str) -> AmResult<&Slice> {
        self.slices.get(urn).ok_or_else(|| AmError::search_failed(urn))
    }

    /// Look up a slice for mutation.
    pub fn get_mut(&mut self, urn: &str) -> AmResult<&mut Slice> {
        self.slices
            .get_mut(urn)
            .ok_or_else(|| AmError::search_failed(urn))
    }

    /// Remove a slice. Member resources must already have been reset.
    pub fn delete(&mut self, urn: &str) -> Option<Slice> {
        self.slices.remove(urn)
    }

    /// All registered slices.
    pub fn all(&self) -> impl Iterator<Item = &Slice> {
        self.slices.values()
    }

    /// URNs of slices whose expiration is strictly before `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<String> {
        self.slices
            .values()
            .filter(|s| s.is_expired_at(now))
            .map(|s| s.urn.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URN: &str = "urn:publicid:IDN+geni:gpo:gcf+slice+alpha";

    #[test]
    fn test_create_and_get() {
        let mut registry = SliceRegistry::new();
        let exp = Utc::now();
        registry.create(URN, exp).unwrap();

        assert!(registry.contains(URN));
        assert_eq!(registry.get(URN).unwrap().expiration, exp);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = SliceRegistry::new();
        registry.create(URN, Utc::now()).unwrap();

        let err = registry.create(URN, Utc::now()).unwrap_err();
        assert!(matches!(err, AmError::DuplicateSlice { .. }));
    }

    #[test]
    fn test_recreate_after_delete() {
        let mut registry = SliceRegistry::new();
        let first = registry.create(URN, Utc::now()).unwrap().lease_id;
        assert!(registry.delete(URN).is_some());
        let second = registry.create(URN, Utc::now()).unwrap().lease_id;
        assert_ne!(first, second);
    }

    #[test]
    fn test_unknown_is_search_failed() {
        let mut registry = SliceRegistry::new();
        assert!(matches!(
            registry.get(URN).unwrap_err(),
            AmError::SearchFailed { .. }
        ));
        assert!(matches!(
            registry.get_mut(URN).unwrap_err(),
            AmError::SearchFailed { .. }
        ));
        assert!(registry.delete(URN).is_none());
    }

    #[test]
    fn test_expired_selection() {
        let mut registry = SliceRegistry::new();
        let now = Utc::now();
        registry
            .create("urn:old", now - chrono::Duration::seconds(1))
            .unwrap();
        registry.create("urn:edge", now).unwrap();
        registry
            .create("urn:new", now + chrono::Duration::seconds(1))
            .unwrap();

        assert_eq!(registry.expired(now), vec!["urn:old".to_string()]);
    }
}
