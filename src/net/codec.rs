//! JSON-lines RPC codec.
//!
//! One request per line:
//!
//! ```text
//! {"id": 7, "caller": "urn:...+user+alice", "caller_key": "<base64>",
//!  "signature": "<base64>", "method": "SliverStatus",
//!  "params": {"slice_urn": "urn:...", "credentials": ["..."]}}
//! ```
//!
//! and one response per line: `{"id": 7, "result": <envelope>}`.
//!
//! The caller proves its identity by signing the JSON array
//! `[id, caller, method, params]` with the key named in `caller_key`.

use crate::auth::keys::{self, SigningKey};
use crate::auth::CallerIdentity;
use crate::protocol::{Options, ResultEnvelope};
use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Result of decoding a frame from the wire.
#[derive(Debug)]
pub enum DecodeResult<T> {
    /// A complete frame was decoded and consumed.
    Complete(T),
    /// More data is needed to complete the frame.
    Incomplete,
    /// A complete frame was consumed but could not be decoded.
    Invalid(String),
    /// The pending frame exceeds the size limit; the stream cannot recover.
    TooLarge(usize),
}

/// Result of encoding a response.
#[derive(Debug)]
pub enum EncodeResult {
    /// Successfully encoded.
    Ok(Bytes),
    /// Encoding failed.
    Error(String),
}

/// Trait for wire codecs.
pub trait ProtocolCodec: Send + Sync {
    /// The request type decoded from the wire.
    type Request;

    /// The response type encoded to the wire.
    type Response;

    /// Attempt to decode a request from the buffer, consuming its bytes.
    fn decode(&self, buffer: &mut BytesMut) -> DecodeResult<Self::Request>;

    /// Encode a response to bytes.
    fn encode(&self, response: &Self::Response) -> EncodeResult;

    /// Get the protocol name.
    fn protocol_name(&self) -> &'static str;
}

/// A request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Correlation id, echoed in the response.
    #[serde(default)]
    pub id: Value,
    /// Caller subject presented by the client.
    #[serde(default)]
    pub caller: Option<String>,
    /// Base64 public key the caller signs with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_key: Option<String>,
    /// Base64 signature over [`RpcRequest::signing_bytes`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Operation name.
    pub method: String,
    /// Operation parameters.
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Unsigned request.
    pub fn new(id: Value, caller: Option<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            caller,
            caller_key: None,
            signature: None,
            method: method.into(),
            params,
        }
    }

    /// Bytes covered by the caller's signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(&json!([self.id, self.caller, self.method, self.params]))
            .unwrap_or_default()
    }

    /// Sign the request as its caller.
    pub fn signed(mut self, key: &SigningKey) -> Self {
        self.caller_key = Some(keys::encode_public_key(&key.verifying_key()));
        self.signature = Some(keys::sign(key, &self.signing_bytes()));
        self
    }

    /// Identity the request establishes.
    ///
    /// The caller's key is kept only when the signature verifies under it;
    /// otherwise the claimed subject carries no proof.
    pub fn caller_identity(&self) -> Result<CallerIdentity, String> {
        let subject = self.caller.clone().unwrap_or_default();
        let (encoded_key, signature) = match (&self.caller_key, &self.signature) {
            (Some(key), Some(signature)) => (key, signature),
            (None, None) => return Ok(CallerIdentity::new(subject)),
            _ => return Err("caller_key and signature must be sent together".to_string()),
        };
        let key = keys::decode_public_key(encoded_key).map_err(|e| format!("caller_key: {}", e))?;
        keys::verify(&key, &self.signing_bytes(), signature)
            .map_err(|e| format!("request signature: {}", e))?;
        Ok(CallerIdentity::authenticated(subject, key))
    }
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Correlation id of the request; `null` when it could not be read.
    pub id: Value,
    /// Operation result.
    pub result: ResultEnvelope,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VersionParams {
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListResourcesParams {
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllocateParams {
    pub slice_urn: String,
    #[serde(default)]
    pub credentials: Vec<String>,
    pub rspec: String,
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeleteParams {
    pub urns: Vec<String>,
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub options: Options,
}

/// Parameters of the single-slice calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SliceParams {
    pub slice_urn: String,
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub options: Options,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenewParams {
    pub slice_urn: String,
    #[serde(default)]
    pub credentials: Vec<String>,
    pub expiration_time: String,
    #[serde(default)]
    pub options: Options,
}

/// A decoded operation call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    GetVersion(VersionParams),
    ListResources(ListResourcesParams),
    Allocate(AllocateParams),
    Delete(DeleteParams),
    DeleteSliver(SliceParams),
    SliverStatus(SliceParams),
    RenewSliver(RenewParams),
    Shutdown(SliceParams),
}

impl RpcCall {
    /// Resolve a request's method and parameters.
    pub fn from_request(request: &RpcRequest) -> Result<Self, String> {
        let params = &request.params;
        Ok(match request.method.as_str() {
            "GetVersion" => Self::GetVersion(params_of(params)?),
            "ListResources" => Self::ListResources(params_of(params)?),
            "Allocate" => Self::Allocate(params_of(params)?),
            "Delete" => Self::Delete(params_of(params)?),
            "DeleteSliver" => Self::DeleteSliver(params_of(params)?),
            "SliverStatus" => Self::SliverStatus(params_of(params)?),
            "RenewSliver" => Self::RenewSliver(params_of(params)?),
            "Shutdown" => Self::Shutdown(params_of(params)?),
            other => return Err(format!("unknown method {}", other)),
        })
    }

    /// Operation name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetVersion(_) => "GetVersion",
            Self::ListResources(_) => "ListResources",
            Self::Allocate(_) => "Allocate",
            Self::Delete(_) => "Delete",
            Self::DeleteSliver(_) => "DeleteSliver",
            Self::SliverStatus(_) => "SliverStatus",
            Self::RenewSliver(_) => "RenewSliver",
            Self::Shutdown(_) => "Shutdown",
        }
    }
}

fn params_of<T: DeserializeOwned>(params: &Value) -> Result<T, String> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| format!("invalid params: {}", e))
}

/// Newline-delimited JSON codec.
#[derive(Debug, Clone)]
pub struct JsonLineCodec {
    max_frame_bytes: usize,
}

impl JsonLineCodec {
    /// Create a codec rejecting lines longer than `max_frame_bytes`.
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { max_frame_bytes }
    }

    /// Maximum accepted line length, excluding the newline.
    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

impl ProtocolCodec for JsonLineCodec {
    type Request = RpcRequest;
    type Response = RpcResponse;

    fn decode(&self, buffer: &mut BytesMut) -> DecodeResult<RpcRequest> {
        loop {
            let newline = match buffer.iter().position(|&b| b == b'\n') {
                Some(pos) => pos,
                None if buffer.len() > self.max_frame_bytes => {
                    return DecodeResult::TooLarge(buffer.len())
                }
                None => return DecodeResult::Incomplete,
            };
            if newline > self.max_frame_bytes {
                return DecodeResult::TooLarge(newline);
            }

            let frame = buffer.split_to(newline + 1);
            let line = &frame[..newline];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return match serde_json::from_slice::<RpcRequest>(line) {
                Ok(request) => DecodeResult::Complete(request),
                Err(e) => DecodeResult::Invalid(format!("malformed request: {}", e)),
            };
        }
    }

    fn encode(&self, response: &RpcResponse) -> EncodeResult {
        match serde_json::to_vec(response) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                EncodeResult::Ok(Bytes::from(bytes))
            }
            Err(e) => EncodeResult::Error(e.to_string()),
        }
    }

    fn protocol_name(&self) -> &'static str {
        "geni-am-jsonl"
    }
}
