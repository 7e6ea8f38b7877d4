//! Confirmation prompt rendering.
//!
//! The prompt is what a human approver actually reads, so it always shows the
//! complete signing bytes (escaped text and hex). Nothing here makes a
//! security decision.

use std::fmt::Write as _;

use crate::domain::Scope;
use crate::keys::SignerIdentity;
use crate::signing_bytes::signing_digest;

/// Render the confirmation text for a pending signature.
pub fn render(scope: Scope, signer: &SignerIdentity, signing_bytes: &[u8]) -> String {
    let mut out = String::new();

    out.push_str(headline(scope));
    out.push_str("\n\n");

    // `write!` into a String cannot fail.
    let _ = writeln!(out, "Signer:     {}", signer.key_id());
    let _ = writeln!(out, "Public key: {}", signer.public_key_hex());
    let _ = writeln!(out, "Scope:      {scope}");
    let _ = writeln!(out, "Length:     {} bytes", signing_bytes.len());
    let _ = writeln!(out, "Digest:     {}", signing_digest(signing_bytes));
    let _ = writeln!(out, "Message:    \"{}\"", escape(signing_bytes));
    let _ = write!(out, "Hex:        {}", hex::encode(signing_bytes));

    out
}

fn headline(scope: Scope) -> &'static str {
    match scope {
        Scope::MessageSignature => {
            "You are about to sign an arbitrary message with your key. \
             This signature cannot authorize a transaction. \
             Only confirm if you trust the requester and recognize the message below."
        }
        Scope::Authentication => {
            "You are going to log in with this wallet. \
             Please confirm that you are the owner of this wallet by signing this message."
        }
    }
}

/// Printable rendition of arbitrary bytes; every byte stays visible.
fn escape(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.escape_debug().to_string(),
        Err(_) => bytes.escape_ascii().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn signer() -> SignerIdentity {
        let key = SigningKey::from_bytes(&[7u8; 32]);
        SignerIdentity::from_signing_key(&key).unwrap()
    }

    #[test]
    fn test_names_signer_and_full_bytes() {
        let signer = signer();
        let prompt = render(Scope::MessageSignature, &signer, b"arc60hello");

        assert!(prompt.contains(signer.key_id()));
        assert!(prompt.contains(&signer.public_key_hex()));
        assert!(prompt.contains("\"arc60hello\""));
        assert!(prompt.contains(&hex::encode(b"arc60hello")));
        assert!(prompt.contains("10 bytes"));
    }

    #[test]
    fn test_wording_varies_by_scope() {
        let signer = signer();
        let msg = render(Scope::MessageSignature, &signer, b"x");
        let auth = render(Scope::Authentication, &signer, b"x");

        assert_ne!(msg, auth);
        assert!(msg.starts_with("You are about to sign an arbitrary message"));
        assert!(auth.contains("owner of this wallet"));
    }

    #[test]
    fn test_is_deterministic() {
        let signer = signer();
        assert_eq!(
            render(Scope::MessageSignature, &signer, b"abc"),
            render(Scope::MessageSignature, &signer, b"abc")
        );
    }

    #[test]
    fn test_control_and_binary_bytes_are_escaped_not_dropped() {
        let signer = signer();

        let prompt = render(Scope::MessageSignature, &signer, b"a\nb\x01");
        assert!(prompt.contains(r#""a\nb\u{1}""#));

        let prompt = render(Scope::MessageSignature, &signer, &[0xff, b'T', b'X']);
        assert!(prompt.contains(r#""\xffTX""#));
        assert!(prompt.contains("ff5458"));
    }

    #[test]
    fn test_long_messages_are_not_truncated() {
        let signer = signer();
        let long = vec![b'a'; 4096];
        let prompt = render(Scope::MessageSignature, &signer, &long);
        assert!(prompt.contains(&"a".repeat(4096)));
    }
}
