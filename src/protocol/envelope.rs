//! Result envelope.
//!
//! Every operation answers with `{code, value, output}`. `code.geni_code`
//! is zero on success; on failure `value` is the empty string and `output`
//! carries the message.

use crate::core::error::{AmError, GeniCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `code` member of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCode {
    /// GENI result code.
    pub geni_code: i32,
    /// Aggregate implementation tag.
    pub am_type: String,
    /// Aggregate-specific code; always zero here.
    pub am_code: i32,
}

/// Structured operation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// API version, present on GetVersion only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geni_api: Option<u32>,
    /// Result code.
    pub code: ResultCode,
    /// Payload, or `""` on failure.
    pub value: Value,
    /// Diagnostic message, or `""` on success.
    pub output: String,
}

impl ResultEnvelope {
    /// Successful result carrying `value`.
    pub fn success(am_type: &str, value: impl Into<Value>) -> Self {
        Self {
            geni_api: None,
            code: ResultCode {
                geni_code: GeniCode::Success.as_i32(),
                am_type: am_type.to_string(),
                am_code: 0,
            },
            value: value.into(),
            output: String::new(),
        }
    }

    /// Failed result with the given code and message.
    pub fn failure(am_type: &str, code: GeniCode, output: impl Into<String>) -> Self {
        Self {
            geni_api: None,
            code: ResultCode {
                geni_code: code.as_i32(),
                am_type: am_type.to_string(),
                am_code: 0,
            },
            value: Value::String(String::new()),
            output: output.into(),
        }
    }

    /// Encode an error, using its mapped code and message.
    pub fn from_error(am_type: &str, err: &AmError) -> Self {
        Self::failure(am_type, err.geni_code(), err.to_string())
    }

    /// Attach the top-level API version.
    pub fn with_geni_api(mut self, version: u32) -> Self {
        self.geni_api = Some(version);
        self
    }

    /// Check if the result code is success.
    pub fn is_success(&self) -> bool {
        self.code.geni_code == GeniCode::Success.as_i32()
    }

    /// Result code as an enum, if it is one this aggregate issues.
    pub fn geni_code(&self) -> Option<GeniCode> {
        GeniCode::from_i32(self.code.geni_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let env = ResultEnvelope::success("gcf", true);
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "code": {"geni_code": 0, "am_type": "gcf", "am_code": 0},
                "value": true,
                "output": ""
            })
        );
        assert!(env.is_success());
    }

    #[test]
    fn test_failure_from_error() {
        let env = ResultEnvelope::from_error("gcf", &AmError::search_failed("urn:x"));
        assert_eq!(env.geni_code(), Some(GeniCode::SearchFailed));
        assert_eq!(env.value, json!(""));
        assert_eq!(env.output, "Search Failed: no slice \"urn:x\" found");
        assert!(!env.is_success());
    }

    #[test]
    fn test_geni_api_only_when_set() {
        let env = ResultEnvelope::success("gcf", json!({})).with_geni_api(3);
        let encoded = serde_json::to_value(&env).unwrap();
        assert_eq!(encoded["geni_api"], json!(3));

        let plain = serde_json::to_value(ResultEnvelope::success("gcf", "")).unwrap();
        assert!(plain.get("geni_api").is_none());
    }
}
