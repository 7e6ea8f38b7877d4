//! Canonical signing bytes.
//!
//! ```text
//! signing_bytes = UTF8(domain_tag) || body
//! ```
//!
//! The tag comes from the validated [`StructuredPayload`] only. Reserved
//! prefixes are excluded by the domain registry before this runs, so the
//! concatenation cannot be read back as a transaction encoding.

use sha2::{Digest, Sha256};

use crate::schema::StructuredPayload;

/// Build the exact bytes that will be signed.
pub fn build(payload: &StructuredPayload) -> Vec<u8> {
    let tag = payload.domain_tag().as_bytes();
    let body = payload.body();

    let mut bytes = Vec::with_capacity(tag.len() + body.len());
    bytes.extend_from_slice(tag);
    bytes.extend_from_slice(body);
    bytes
}

/// `sha256:<lowercase-hex>` digest of signing bytes, used in logs and decision events.
pub fn signing_digest(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}
