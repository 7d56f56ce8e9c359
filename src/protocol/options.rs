//! Operation options.
//!
//! Options arrive as a free-form JSON object. Only ListResources inspects
//! them; every other operation accepts and ignores whatever it is given.

use crate::core::error::{AmError, AmResult};
use serde_json::{Map, Value};

/// Free-form options as received.
pub type Options = Map<String, Value>;

/// Requested RSpec format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RspecVersion {
    /// Format family, e.g. `geni`.
    pub kind: String,
    /// Format version, e.g. `3`.
    pub version: String,
}

/// ListResources options after validation of their shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListResourcesOptions {
    /// `geni_rspec_version`; required.
    pub rspec_version: RspecVersion,
    /// `geni_available`: advertise only free resources.
    pub available_only: bool,
    /// `geni_compressed`: return base64(zlib(document)).
    pub compressed: bool,
    /// `geni_slice_urn`, which is no longer accepted.
    pub slice_urn: Option<String>,
}

impl ListResourcesOptions {
    /// Extract and check the options.
    pub fn from_options(options: &Options) -> AmResult<Self> {
        let requested = options.get("geni_rspec_version").ok_or_else(|| {
            AmError::bad_arguments("option geni_rspec_version was not supplied.")
        })?;
        let requested = requested.as_object().ok_or_else(|| {
            AmError::bad_arguments("option geni_rspec_version must be a struct.")
        })?;
        let kind = requested.get("type").ok_or_else(|| {
            AmError::bad_arguments("option geni_rspec_version does not have a type field.")
        })?;
        let version = requested.get("version").ok_or_else(|| {
            AmError::bad_arguments("option geni_rspec_version does not have a version field.")
        })?;

        Ok(Self {
            rspec_version: RspecVersion {
                kind: scalar_string(kind),
                version: scalar_string(version),
            },
            available_only: flag(options, "geni_available"),
            compressed: flag(options, "geni_compressed"),
            slice_urn: options.get("geni_slice_urn").map(scalar_string),
        })
    }
}

/// Render a scalar option as a string, so `3` and `"3"` compare equal.
///
/// Clients that send the version as an XML-RPC int get the same answer as
/// those sending a string. `3.0` renders as `"3.0"` and still mismatches.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Truthiness of an optional flag.
fn flag(options: &Options, name: &str) -> bool {
    match options.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |v| v != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(value: Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_full_options() {
        let parsed = ListResourcesOptions::from_options(&opts(json!({
            "geni_rspec_version": {"type": "geni", "version": 3},
            "geni_available": true,
            "geni_compressed": 1
        })))
        .unwrap();
        assert_eq!(parsed.rspec_version.kind, "geni");
        assert_eq!(parsed.rspec_version.version, "3");
        assert!(parsed.available_only);
        assert!(parsed.compressed);
        assert!(parsed.slice_urn.is_none());
    }

    #[test]
    fn test_flags_default_off() {
        let parsed = ListResourcesOptions::from_options(&opts(json!({
            "geni_rspec_version": {"type": "geni", "version": "3"},
            "geni_available": false,
            "geni_compressed": null
        })))
        .unwrap();
        assert!(!parsed.available_only);
        assert!(!parsed.compressed);
    }

    #[test]
    fn test_missing_version_fields() {
        let err = ListResourcesOptions::from_options(&Options::new()).unwrap_err();
        assert!(err.to_string().contains("was not supplied"));

        let err = ListResourcesOptions::from_options(&opts(json!({
            "geni_rspec_version": {"version": "3"}
        })))
        .unwrap_err();
        assert!(err.to_string().contains("type field"));

        let err = ListResourcesOptions::from_options(&opts(json!({
            "geni_rspec_version": {"type": "geni"}
        })))
        .unwrap_err();
        assert!(err.to_string().contains("version field"));
    }

    #[test]
    fn test_slice_urn_captured() {
        let parsed = ListResourcesOptions::from_options(&opts(json!({
            "geni_rspec_version": {"type": "geni", "version": "3"},
            "geni_slice_urn": "urn:publicid:IDN+a+slice+b"
        })))
        .unwrap();
        assert_eq!(parsed.slice_urn.as_deref(), Some("urn:publicid:IDN+a+slice+b"));
    }
}
