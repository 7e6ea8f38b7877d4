//! Signature verification for relying parties.
//!
//! Independent of the engine: anyone holding the signing bytes (or the
//! original payload, from which they can be rebuilt) and the signer's public
//! key can check a signature.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, VerifyingKey, SIGNATURE_LENGTH};

/// Verify a detached Ed25519 signature over `signing_bytes`.
///
/// Uses strict verification, so malleable or small-order forms are rejected.
pub fn verify(signature: &[u8], signing_bytes: &[u8], public_key: &VerifyingKey) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    public_key.verify_strict(signing_bytes, &signature).is_ok()
}

/// Verify a base64-encoded detached signature.
pub fn verify_b64(signature_b64: &str, signing_bytes: &[u8], public_key: &VerifyingKey) -> bool {
    match BASE64.decode(signature_b64) {
        Ok(signature) => verify(&signature, signing_bytes, public_key),
        Err(_) => false,
    }
}

/// Combine a signature and its message as `signature || message`.
pub fn to_signed_message(signature: &[u8; SIGNATURE_LENGTH], message: &[u8]) -> Vec<u8> {
    let mut signed = Vec::with_capacity(SIGNATURE_LENGTH + message.len());
    signed.extend_from_slice(signature);
    signed.extend_from_slice(message);
    signed
}

/// Open a combined `signature || message`, returning the message if the signature holds.
pub fn open(signed_message: &[u8], public_key: &VerifyingKey) -> Option<Vec<u8>> {
    if signed_message.len() < SIGNATURE_LENGTH {
        return None;
    }
    let (signature, message) = signed_message.split_at(SIGNATURE_LENGTH);
    verify(signature, message, public_key).then(|| message.to_vec())
}
