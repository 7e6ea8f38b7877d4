//! External capabilities consumed by the engine.
//!
//! The approval authority (a human behind a UI, or an automated policy) and
//! the signing capability (private key custody) live outside the core. Both
//! are injected as trait objects so hosts and tests can supply their own.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Scope;
use crate::keys::SignerIdentity;

/// The approver's answer to one signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Confirm,
    Reject,
}

/// Everything an approver is shown for one pending signature.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub attempt_id: String,
    pub scope: Scope,
    pub signer: SignerIdentity,
    /// Rendered confirmation text.
    pub prompt: String,
    /// The exact bytes that will be signed on approval.
    pub signing_bytes: Vec<u8>,
}

/// Errors that can occur while asking for approval.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The approver could not be reached or could not answer.
    #[error("approval unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during signing operations.
#[derive(Debug, Error)]
pub enum SigningCapabilityError {
    /// Error that occurs when signing operations fail.
    #[error("signing failed: {0}")]
    SigningFailed(String),
    /// The capability holds no key for the requested signer.
    #[error("no key available for signer {key_id}")]
    UnknownSigner { key_id: String },
}

/// Party that confirms or rejects a pending signing request.
#[async_trait]
pub trait ApprovalAuthority: Send + Sync {
    /// Called exactly once per request that passed validation and domain checks.
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError>;
}

/// Abstract private-key custody.
#[async_trait]
pub trait SigningCapability: Send + Sync {
    /// Sign `bytes` as `signer`, returning the raw 64-byte Ed25519 signature.
    ///
    /// The engine calls this at most once per approved request.
    async fn sign(
        &self,
        bytes: &[u8],
        signer: &SignerIdentity,
    ) -> Result<Vec<u8>, SigningCapabilityError>;
}

/// Approval authority that always answers the same way.
///
/// Used for scripted signing (`--yes` / `--reject`) and automated policies.
#[derive(Debug, Clone, Copy)]
pub struct StaticApproval(pub ApprovalDecision);

impl StaticApproval {
    pub fn confirm() -> Self {
        Self(ApprovalDecision::Confirm)
    }

    pub fn reject() -> Self {
        Self(ApprovalDecision::Reject)
    }
}

#[async_trait]
impl ApprovalAuthority for StaticApproval {
    async fn request_approval(
        &self,
        _request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        Ok(self.0)
    }
}

/// Signing capability backed by an in-process Ed25519 key.
pub struct LocalKeySigner {
    key: SigningKey,
    identity: SignerIdentity,
}

impl LocalKeySigner {
    pub fn new(key: SigningKey) -> anyhow::Result<Self> {
        let identity = SignerIdentity::from_signing_key(&key)?;
        Ok(Self { key, identity })
    }

    pub fn identity(&self) -> &SignerIdentity {
        &self.identity
    }
}

impl std::fmt::Debug for LocalKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeySigner")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SigningCapability for LocalKeySigner {
    async fn sign(
        &self,
        bytes: &[u8],
        signer: &SignerIdentity,
    ) -> Result<Vec<u8>, SigningCapabilityError> {
        if signer != &self.identity {
            return Err(SigningCapabilityError::UnknownSigner {
                key_id: signer.key_id().to_string(),
            });
        }
        Ok(self.key.sign(bytes).to_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::verify;

    fn generate_keypair() -> SigningKey {
        SigningKey::generate(&mut rand::thread_rng())
    }

    #[tokio::test]
    async fn test_local_signer_signs_verifiably() {
        let signer = LocalKeySigner::new(generate_keypair()).unwrap();
        let identity = signer.identity().clone();

        let sig = signer.sign(b"arc60hello", &identity).await.unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify(&sig, b"arc60hello", identity.public_key()));
    }

    #[tokio::test]
    async fn test_local_signer_is_deterministic() {
        let signer = LocalKeySigner::new(generate_keypair()).unwrap();
        let identity = signer.identity().clone();

        let a = signer.sign(b"same", &identity).await.unwrap();
        let b = signer.sign(b"same", &identity).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_local_signer_refuses_other_identity() {
        let signer = LocalKeySigner::new(generate_keypair()).unwrap();
        let other = SignerIdentity::from_signing_key(&generate_keypair()).unwrap();

        let err = signer.sign(b"x", &other).await.unwrap_err();
        assert!(matches!(err, SigningCapabilityError::UnknownSigner { .. }));
    }

    #[tokio::test]
    async fn test_static_approval() {
        let identity = SignerIdentity::from_signing_key(&generate_keypair()).unwrap();
        let request = ApprovalRequest {
            attempt_id: "att_1".into(),
            scope: Scope::MessageSignature,
            signer: identity,
            prompt: "sign?".into(),
            signing_bytes: b"x".to_vec(),
        };
        assert_eq!(
            StaticApproval::confirm()
                .request_approval(&request)
                .await
                .unwrap(),
            ApprovalDecision::Confirm
        );
        assert_eq!(
            StaticApproval::reject()
                .request_approval(&request)
                .await
                .unwrap(),
            ApprovalDecision::Reject
        );
    }
}
