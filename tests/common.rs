//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use geni_am::auth::{CallerIdentity, CredentialDocument, SigningKey, StaticTrustVerifier};
use geni_am::core::time::ManualClock;
use geni_am::protocol::{AggregateManager, AggregateSettings, Options, ReferenceAggregateManager};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

pub const ISSUER: &str = "urn:publicid:IDN+geni:gpo:gcf+authority+sa";
pub const ALICE: &str = "urn:publicid:IDN+geni:gpo:gcf+user+alice";
pub const MALLORY: &str = "urn:publicid:IDN+evil+user+mallory";
pub const SLICE_A: &str = "urn:publicid:IDN+geni:gpo:gcf+slice+alpha";
pub const SLICE_B: &str = "urn:publicid:IDN+geni:gpo:gcf+slice+beta";

/// Secret key of [`ISSUER`].
pub fn issuer_key() -> SigningKey {
    SigningKey::from_bytes(&[1u8; 32])
}

/// Secret key of [`ALICE`].
pub fn alice_key() -> SigningKey {
    SigningKey::from_bytes(&[2u8; 32])
}

/// Secret key of [`MALLORY`].
pub fn mallory_key() -> SigningKey {
    SigningKey::from_bytes(&[3u8; 32])
}

/// Fixed start instant for manual clocks.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
}

/// Write a configuration file.
pub fn create_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Aggregate manager over a manual clock, trusting [`ISSUER`].
pub struct Fixture {
    pub clock: Arc<ManualClock>,
    pub manager: AggregateManager,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(AggregateSettings::default())
    }

    pub fn with_settings(settings: AggregateSettings) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let verifier = Arc::new(StaticTrustVerifier::new(
            [(ISSUER, issuer_key().verifying_key())],
            clock.clone(),
        ));
        let delegate = ReferenceAggregateManager::new(settings, verifier, clock.clone());
        Self {
            clock,
            manager: AggregateManager::new(Arc::new(delegate)),
        }
    }

    pub fn delegate(&self) -> &ReferenceAggregateManager {
        self.manager.delegate()
    }

    pub fn available(&self) -> usize {
        self.delegate().with_state(|s| s.catalog.available_count())
    }

    pub fn slice_count(&self) -> usize {
        self.delegate().with_state(|s| s.registry.len())
    }
}

/// Caller identity for Alice, holding her key.
pub fn alice() -> CallerIdentity {
    CallerIdentity::authenticated(ALICE, alice_key().verifying_key())
}

/// Caller identity for Mallory, holding her own key.
pub fn mallory() -> CallerIdentity {
    CallerIdentity::authenticated(MALLORY, mallory_key().verifying_key())
}

/// Wildcard credential for Alice over `slice`, valid for `hours` from the start.
pub fn slice_cred(slice: &str, hours: i64) -> Vec<String> {
    cred_until(slice, start_time() + Duration::hours(hours))
}

/// Wildcard credential for Alice over `slice`, valid until `expires`.
pub fn cred_until(slice: &str, expires: DateTime<Utc>) -> Vec<String> {
    vec![alice_doc(Some(slice), &["*"], expires).sign(&issuer_key())]
}

/// Credential body issued by [`ISSUER`] to Alice.
pub fn alice_doc(target: Option<&str>, privileges: &[&str], expires: DateTime<Utc>) -> CredentialDocument {
    CredentialDocument::new(
        ISSUER,
        ALICE,
        &alice_key().verifying_key(),
        target,
        privileges,
        expires,
    )
}

/// Catalog-wide credential for Alice, used by ListResources.
pub fn user_cred() -> Vec<String> {
    vec![alice_doc(None, &["*"], start_time() + Duration::days(1)).sign(&issuer_key())]
}

/// Request document naming `nodes` nodes.
pub fn request_rspec(nodes: usize) -> String {
    let body: String = (0..nodes)
        .map(|i| format!("  <node client_id=\"vm{}\" exclusive=\"false\"/>\n", i))
        .collect();
    format!(
        "<?xml version=\"1.0\"?>\n<rspec xmlns=\"http://www.geni.net/resources/rspec/3\" type=\"request\">\n{}</rspec>\n",
        body
    )
}

/// ListResources options asking for GENI v3 advertisements.
pub fn geni3_options() -> Options {
    options(json!({"geni_rspec_version": {"type": "geni", "version": "3"}}))
}

/// Build options from a JSON object literal.
pub fn options(value: Value) -> Options {
    match value {
        Value::Object(map) => map,
        other => panic!("options must be an object, got {}", other),
    }
}
