//! Signed credential verifier.
//!
//! Credentials are JSON documents signed by an issuing authority with
//! Ed25519. The verifier holds one public key per trusted issuer and accepts
//! a credential only when:
//!
//! - the signature over the document verifies under the issuer's key
//! - the document's `owner` is the caller's subject
//! - the document's `owner_key` is the key the caller proved for this request
//! - target, privileges and expiry match the call
//!
//! Wire format:
//!
//! ```json
//! {
//!   "credential": {
//!     "issuer": "urn:publicid:IDN+geni:gpo:gcf+authority+sa",
//!     "owner": "urn:publicid:IDN+geni:gpo:gcf+user+alice",
//!     "owner_key": "<base64 ed25519 public key>",
//!     "target": "urn:publicid:IDN+geni:gpo:gcf+slice+alpha",
//!     "privileges": ["createsliver", "getsliceresources"],
//!     "expires": "2026-10-17T00:00:00Z"
//!   },
//!   "signature": "<base64 signature over the JSON of `credential`>"
//! }
//! ```

use super::gateway::{CallerIdentity, CredentialExpiry, CredentialVerifier, Privilege};
use super::keys::{self, SigningKey, VerifyingKey};
use crate::core::error::AuthorizationError;
use crate::core::time::{format_timestamp, parse_timestamp, Clock};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Privilege entry that grants everything.
pub const WILDCARD_PRIVILEGE: &str = "*";

/// The signed body of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDocument {
    /// Authority that issued the credential.
    pub issuer: String,
    /// Subject the credential was issued to.
    pub owner: String,
    /// Base64 public key the owner must prove possession of.
    pub owner_key: String,
    /// Object the privileges apply to (slice URN).
    #[serde(default)]
    pub target: Option<String>,
    /// Granted privilege names.
    #[serde(default)]
    pub privileges: Vec<String>,
    /// Expiry instant.
    pub expires: String,
}

/// A credential document with the issuer's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCredential {
    pub credential: CredentialDocument,
    /// Base64 Ed25519 signature over [`CredentialDocument::signing_bytes`].
    pub signature: String,
}

impl CredentialDocument {
    /// Build a credential document.
    pub fn new(
        issuer: impl Into<String>,
        owner: impl Into<String>,
        owner_key: &VerifyingKey,
        target: Option<&str>,
        privileges: &[&str],
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            owner: owner.into(),
            owner_key: keys::encode_public_key(owner_key),
            target: target.map(String::from),
            privileges: privileges.iter().map(|p| p.to_string()).collect(),
            expires: format_timestamp(&expires),
        }
    }

    /// Bytes covered by the issuer's signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Sign with the issuer's key and serialize for presentation.
    pub fn sign(self, issuer_key: &SigningKey) -> String {
        let signature = keys::sign(issuer_key, &self.signing_bytes());
        SignedCredential {
            credential: self,
            signature,
        }
        .encode()
    }

    fn grants(&self, privilege: Privilege) -> bool {
        self.privileges
            .iter()
            .any(|p| p == WILDCARD_PRIVILEGE || p == privilege.as_str())
    }
}

impl SignedCredential {
    /// Serialize for presentation to the aggregate manager.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Verifier trusting a fixed set of issuer keys.
pub struct StaticTrustVerifier {
    trusted_issuers: HashMap<String, VerifyingKey>,
    clock: Arc<dyn Clock>,
}

impl StaticTrustVerifier {
    /// Create a verifier trusting the given `(issuer URN, public key)` pairs.
    pub fn new<I, S>(trusted_issuers: I, clock: Arc<dyn Clock>) -> Self
    where
        I: IntoIterator<Item = (S, VerifyingKey)>,
        S: Into<String>,
    {
        Self {
            trusted_issuers: trusted_issuers
                .into_iter()
                .map(|(issuer, key)| (issuer.into(), key))
                .collect(),
            clock,
        }
    }

    fn check(
        &self,
        caller: &CallerIdentity,
        raw: &str,
        target: Option<&str>,
        privileges: &[Privilege],
        now: DateTime<Utc>,
    ) -> Result<CredentialExpiry, String> {
        let signed: SignedCredential =
            serde_json::from_str(raw).map_err(|e| format!("unparseable credential: {}", e))?;
        let doc = &signed.credential;

        let issuer_key = self
            .trusted_issuers
            .get(&doc.issuer)
            .ok_or_else(|| format!("issuer {} is not trusted", doc.issuer))?;
        keys::verify(issuer_key, &doc.signing_bytes(), &signed.signature)
            .map_err(|e| format!("issuer signature rejected: {}", e))?;

        if doc.owner != caller.subject {
            return Err(format!(
                "credential owner {} does not match caller {}",
                doc.owner, caller.subject
            ));
        }
        let caller_key = caller
            .key
            .as_ref()
            .ok_or_else(|| format!("caller {} did not prove a key", caller.subject))?;
        let owner_key = keys::decode_public_key(&doc.owner_key)
            .map_err(|e| format!("credential owner key: {}", e))?;
        if &owner_key != caller_key {
            return Err(format!(
                "caller key does not match the key of credential owner {}",
                doc.owner
            ));
        }

        if let Some(target) = target {
            if doc.target.as_deref() != Some(target) {
                return Err(format!(
                    "credential target {} does not match {}",
                    doc.target.as_deref().unwrap_or("<none>"),
                    target
                ));
            }
        }
        if let Some(missing) = privileges.iter().find(|p| !doc.grants(**p)) {
            return Err(format!("credential does not grant {}", missing));
        }

        let expires = parse_timestamp(&doc.expires).map_err(|e| e.to_string())?;
        if expires < now {
            return Err(format!("credential expired at {}", format_timestamp(&expires)));
        }

        Ok(CredentialExpiry::new(expires))
    }
}

impl CredentialVerifier for StaticTrustVerifier {
    fn verify(
        &self,
        caller: &CallerIdentity,
        credentials: &[String],
        target: Option<&str>,
        privileges: &[Privilege],
    ) -> Result<Vec<CredentialExpiry>, AuthorizationError> {
        if credentials.is_empty() {
            return Err(AuthorizationError::new("no credentials supplied"));
        }

        let now = self.clock.now();
        let mut valid = Vec::new();
        let mut rejections = Vec::new();

        for (index, raw) in credentials.iter().enumerate() {
            match self.check(caller, raw, target, privileges, now) {
                Ok(expiry) => valid.push(expiry),
                Err(reason) => rejections.push(format!("credential {}: {}", index, reason)),
            }
        }

        if valid.is_empty() {
            return Err(AuthorizationError::new(rejections.join("; ")));
        }
        Ok(valid)
    }
}

impl std::fmt::Debug for StaticTrustVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTrustVerifier")
            .field("trusted_issuers", &self.trusted_issuers.keys())
            .finish_non_exhaustive()
    }
}
