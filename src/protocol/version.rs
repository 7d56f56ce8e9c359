//! GetVersion capability description.

use crate::rspec::{AD_SCHEMA, RSPEC_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate manager API version implemented.
pub const API_VERSION: u32 = 3;

/// Request schema location advertised to callers.
pub const REQUEST_SCHEMA: &str = "http://www.geni.net/resources/rspec/3/request.xsd";

/// One supported RSpec format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RspecFormat {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub schema: String,
    pub namespace: String,
    pub extensions: Vec<String>,
}

impl RspecFormat {
    fn geni_v3(schema: &str) -> Self {
        Self {
            kind: "geni".to_string(),
            version: "3".to_string(),
            schema: schema.to_string(),
            namespace: RSPEC_NAMESPACE.to_string(),
            extensions: Vec::new(),
        }
    }
}

/// One accepted credential type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialType {
    pub geni_type: String,
    pub geni_version: String,
}

/// The GetVersion payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub geni_api: u32,
    pub geni_api_versions: BTreeMap<String, String>,
    pub geni_request_rspec_versions: Vec<RspecFormat>,
    pub geni_ad_rspec_versions: Vec<RspecFormat>,
    pub geni_credential_types: Vec<CredentialType>,
}

impl VersionInfo {
    /// Describe this aggregate, reachable at `url`.
    pub fn new(url: &str) -> Self {
        let mut api_versions = BTreeMap::new();
        api_versions.insert(API_VERSION.to_string(), url.to_string());
        Self {
            geni_api: API_VERSION,
            geni_api_versions: api_versions,
            geni_request_rspec_versions: vec![RspecFormat::geni_v3(REQUEST_SCHEMA)],
            geni_ad_rspec_versions: vec![RspecFormat::geni_v3(AD_SCHEMA)],
            geni_credential_types: vec![CredentialType {
                geni_type: "geni_sfa".to_string(),
                geni_version: "3".to_string(),
            }],
        }
    }
}
