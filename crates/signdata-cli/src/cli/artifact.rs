//! On-disk signature artifact written by `sign` and read by `verify`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use signdata_core::{Scope, SignedArtifact};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignatureArtifact {
    pub attempt_id: String,
    pub scope: Scope,
    pub key_id: String,
    /// Raw ed25519 public key, hex
    pub public_key: String,
    pub signing_digest: String,
    /// Exact signed bytes (domain tag followed by body), base64
    pub signing_bytes: String,
    /// Detached ed25519 signature, base64
    pub signature: String,
}

impl From<&SignedArtifact> for SignatureArtifact {
    fn from(signed: &SignedArtifact) -> Self {
        Self {
            attempt_id: signed.attempt_id.clone(),
            scope: signed.scope,
            key_id: signed.signer.key_id().to_string(),
            public_key: signed.signer.public_key_hex(),
            signing_digest: signed.signing_digest(),
            signing_bytes: BASE64.encode(&signed.signing_bytes),
            signature: signed.signature_b64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use signdata_core::SignerIdentity;

    #[test]
    fn test_artifact_fields() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let signer = SignerIdentity::from_signing_key(&key).unwrap();
        let signed = SignedArtifact {
            attempt_id: "att_1".to_string(),
            scope: Scope::MessageSignature,
            signer: signer.clone(),
            signing_bytes: b"arc60hi".to_vec(),
            signature: key.sign(b"arc60hi").to_bytes(),
        };

        let artifact = SignatureArtifact::from(&signed);
        assert_eq!(artifact.key_id, signer.key_id());
        assert_eq!(artifact.signing_bytes, BASE64.encode(b"arc60hi"));
        assert!(artifact.signing_digest.starts_with("sha256:"));

        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["scope"], "msgsig");
        assert_eq!(json["public_key"], signer.public_key_hex());
    }
}
