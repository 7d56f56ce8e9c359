//! Ed25519 keys and signatures.
//!
//! Keys and signatures travel as standard base64. A signing key file holds
//! the base64 of the 32-byte secret seed on one line.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Signer, Verifier};
use std::path::Path;
use thiserror::Error;

pub use ed25519_dalek::{SigningKey, VerifyingKey};

/// Key and signature decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Not valid base64.
    #[error("invalid base64: {0}")]
    Encoding(String),

    /// Decoded to the wrong number of bytes.
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    /// Bytes are not a valid Ed25519 point.
    #[error("invalid public key")]
    PublicKey,

    /// Signature does not verify under the key.
    #[error("signature verification failed")]
    Signature,
}

fn decode_fixed<const N: usize>(encoded: &str) -> Result<[u8; N], KeyError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| KeyError::Encoding(e.to_string()))?;
    let actual = bytes.len();
    bytes
        .try_into()
        .map_err(|_| KeyError::Length { expected: N, actual })
}

/// Generate a fresh signing key from the thread CSPRNG.
pub fn generate_signing_key() -> SigningKey {
    let mut rng = rand::thread_rng();
    SigningKey::generate(&mut rng)
}

/// Base64 of the signing key seed.
pub fn encode_signing_key(key: &SigningKey) -> String {
    STANDARD.encode(key.to_bytes())
}

/// Parse a base64 signing key seed.
pub fn decode_signing_key(encoded: &str) -> Result<SigningKey, KeyError> {
    let seed = decode_fixed::<32>(encoded)?;
    Ok(SigningKey::from_bytes(&seed))
}

/// Read a signing key file.
pub fn load_signing_key(path: &Path) -> anyhow::Result<SigningKey> {
    use anyhow::Context;
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read key file: {}", path.display()))?;
    decode_signing_key(&content)
        .with_context(|| format!("invalid key file: {}", path.display()))
}

/// Base64 of a public key.
pub fn encode_public_key(key: &VerifyingKey) -> String {
    STANDARD.encode(key.as_bytes())
}

/// Parse a base64 public key.
pub fn decode_public_key(encoded: &str) -> Result<VerifyingKey, KeyError> {
    let bytes = decode_fixed::<32>(encoded)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::PublicKey)
}

/// Sign `message`, returning the base64 signature.
pub fn sign(key: &SigningKey, message: &[u8]) -> String {
    STANDARD.encode(key.sign(message).to_bytes())
}

/// Check a base64 signature over `message`.
pub fn verify(key: &VerifyingKey, message: &[u8], signature: &str) -> Result<(), KeyError> {
    let bytes = decode_fixed::<64>(signature)?;
    let signature = Signature::from_bytes(&bytes);
    key.verify(message, &signature)
        .map_err(|_| KeyError::Signature)
}
