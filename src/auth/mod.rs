//! Caller authorization.
//!
//! - [`gateway`] - Verifier capability, privileges and the credential gateway
//! - [`keys`] - Ed25519 key encoding, signing and verification
//! - [`verifier`] - Verifier over issuer-signed JSON credentials

pub mod gateway;
pub mod keys;
pub mod verifier;

pub use gateway::{CallerIdentity, CredentialExpiry, CredentialGateway, CredentialVerifier, Privilege};
pub use keys::{KeyError, SigningKey, VerifyingKey};
pub use verifier::{CredentialDocument, SignedCredential, StaticTrustVerifier, WILDCARD_PRIVILEGE};
