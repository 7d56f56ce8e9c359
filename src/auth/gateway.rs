//! Credential gateway.
//!
//! Thin adapter over the external credential verifier. The lifecycle handler
//! names the privileges each operation requires; the gateway forwards them
//! along with the caller identity and target, and hands back the expiries of
//! every credential that verified.

use crate::core::error::AuthorizationError;
use super::keys::VerifyingKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Privilege names from the credential privilege table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// Allocate resources to a slice.
    CreateSliver,
    /// Delete a slice.
    DeleteSlice,
    /// Read slice status.
    GetSliceResources,
    /// Extend a slice's expiration.
    RenewSliver,
    /// Operator shutdown of a slice.
    Shutdown,
}

impl Privilege {
    /// Privilege name as written in credentials.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSliver => "createsliver",
            Self::DeleteSlice => "deleteslice",
            Self::GetSliceResources => "getsliceresources",
            Self::RenewSliver => "renewsliver",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for Privilege {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of the caller as established by the transport.
///
/// `key` is set only when the caller proved possession of the matching
/// secret key for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Subject the caller claims (user URN).
    pub subject: String,
    /// Public key the caller proved possession of.
    pub key: Option<VerifyingKey>,
}

impl CallerIdentity {
    /// Caller that claimed a subject without proof.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            key: None,
        }
    }

    /// Caller that proved possession of `key`.
    pub fn authenticated(subject: impl Into<String>, key: VerifyingKey) -> Self {
        Self {
            subject: subject.into(),
            key: Some(key),
        }
    }

    /// Check if the caller proved possession of a key.
    pub fn is_authenticated(&self) -> bool {
        self.key.is_some()
    }
}

/// Expiry of one verified credential.
///
/// Opaque to the lifecycle handler beyond comparisons with instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CredentialExpiry(DateTime<Utc>);

impl CredentialExpiry {
    /// Wrap an expiry instant.
    pub fn new(expires_at: DateTime<Utc>) -> Self {
        Self(expires_at)
    }

    /// The expiry instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.0
    }

    /// Check if the credential is still valid at `instant` (inclusive).
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.0 >= instant
    }

    /// Earliest expiry in a set, if any.
    pub fn earliest(expiries: &[CredentialExpiry]) -> Option<DateTime<Utc>> {
        expiries.iter().map(|e| e.0).min()
    }

    /// Latest expiry in a set, if any.
    pub fn latest(expiries: &[CredentialExpiry]) -> Option<DateTime<Utc>> {
        expiries.iter().map(|e| e.0).max()
    }
}

/// External credential verification capability.
pub trait CredentialVerifier: Send + Sync {
    /// Verify that some credential grants `privileges` over `target` to `caller`.
    ///
    /// `target` is `None` for catalog-wide calls. Returns the expiry of every
    /// credential that verified; fails if none did.
    fn verify(
        &self,
        caller: &CallerIdentity,
        credentials: &[String],
        target: Option<&str>,
        privileges: &[Privilege],
    ) -> Result<Vec<CredentialExpiry>, AuthorizationError>;
}

/// Gateway used by the lifecycle handler.
#[derive(Clone)]
pub struct CredentialGateway {
    verifier: Arc<dyn CredentialVerifier>,
}

impl CredentialGateway {
    /// Wrap a verifier.
    pub fn new(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { verifier }
    }

    /// Authorize a call.
    pub fn authorize(
        &self,
        caller: &CallerIdentity,
        credentials: &[String],
        target: Option<&str>,
        privileges: &[Privilege],
    ) -> Result<Vec<CredentialExpiry>, AuthorizationError> {
        match self.verifier.verify(caller, credentials, target, privileges) {
            Ok(expiries) => {
                tracing::debug!(
                    caller = %caller.subject,
                    authenticated = caller.is_authenticated(),
                    target = target.unwrap_or("-"),
                    valid = expiries.len(),
                    "credentials verified"
                );
                Ok(expiries)
            }
            Err(err) => {
                tracing::info!(
                    caller = %caller.subject,
                    authenticated = caller.is_authenticated(),
                    target = target.unwrap_or("-"),
                    error = %err,
                    "authorization rejected"
                );
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for CredentialGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialGateway").finish_non_exhaustive()
    }
}
