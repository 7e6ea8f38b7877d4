//! Signer identities and key loading.

use anyhow::{Context, Result};
use ed25519_dalek::{SigningKey, VerifyingKey, PUBLIC_KEY_LENGTH};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;

/// Compute key_id from SPKI-encoded public key bytes.
///
/// Returns `sha256:<lowercase-hex>`.
pub fn compute_key_id(spki_bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(spki_bytes)))
}

/// Compute key_id from a VerifyingKey.
pub fn compute_key_id_from_verifying_key(key: &VerifyingKey) -> Result<String> {
    use pkcs8::EncodePublicKey;
    let doc = key
        .to_public_key_der()
        .context("failed to encode public key as SPKI DER")?;
    Ok(compute_key_id(doc.as_bytes()))
}

/// Public identity of the party who signs.
#[derive(Clone, PartialEq, Eq)]
pub struct SignerIdentity {
    public_key: VerifyingKey,
    key_id: String,
}

impl SignerIdentity {
    pub fn new(public_key: VerifyingKey) -> Result<Self> {
        let key_id = compute_key_id_from_verifying_key(&public_key)?;
        Ok(Self { public_key, key_id })
    }

    pub fn from_signing_key(key: &SigningKey) -> Result<Self> {
        Self::new(key.verifying_key())
    }

    /// Build from raw 32-byte Ed25519 public key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] = bytes
            .try_into()
            .with_context(|| format!("public key must be {PUBLIC_KEY_LENGTH} bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes).context("invalid ed25519 public key")?;
        Self::new(key)
    }

    pub fn public_key(&self) -> &VerifyingKey {
        &self.public_key
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.as_bytes())
    }
}

impl fmt::Debug for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerIdentity")
            .field("key_id", &self.key_id)
            .field("public_key", &self.public_key_hex())
            .finish()
    }
}

impl fmt::Display for SignerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_id)
    }
}

/// Load a public key from SPKI PEM file.
pub fn load_public_key_pem(path: &Path) -> Result<VerifyingKey> {
    use pkcs8::DecodePublicKey;

    let pem = fs::read_to_string(path)
        .with_context(|| format!("failed to read public key: {}", path.display()))?;

    VerifyingKey::from_public_key_pem(&pem)
        .with_context(|| format!("failed to parse public key PEM: {}", path.display()))
}

/// Load a private key from PKCS#8 PEM file.
pub fn load_private_key_pem(path: &Path) -> Result<SigningKey> {
    use pkcs8::DecodePrivateKey;

    let pem = fs::read_to_string(path)
        .with_context(|| format!("failed to read private key: {}", path.display()))?;

    SigningKey::from_pkcs8_pem(&pem)
        .with_context(|| format!("failed to parse private key PEM: {}", path.display()))
}
