//! `signdata verify` - Verify a signature artifact against a trusted public key.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use signdata_core::keys::load_public_key_pem;
use signdata_core::signing_bytes::signing_digest;
use signdata_core::verify::verify_b64;
use signdata_core::SignerIdentity;

use crate::cli::artifact::SignatureArtifact;
use crate::exit_codes;

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Signature artifact file (JSON) written by `signdata sign`
    pub artifact: PathBuf,

    /// Trusted public key file (SPKI PEM)
    #[arg(long)]
    pub pubkey: PathBuf,

    /// Quiet mode - only exit code, no output
    #[arg(long, short)]
    pub quiet: bool,
}

pub fn cmd_verify(args: VerifyArgs) -> i32 {
    match run_verify(&args) {
        Ok(Ok(())) => exit_codes::SUCCESS,
        Ok(Err(failure)) => {
            if !args.quiet {
                eprintln!("verification failed: {failure}");
            }
            exit_codes::SIGNATURE_INVALID
        }
        Err(e) => {
            if !args.quiet {
                eprintln!("error: {e:#}");
            }
            exit_codes::INVALID_INPUT
        }
    }
}

/// Outer error: the inputs could not be read. Inner error: they were read
/// and the artifact does not check out.
fn run_verify(args: &VerifyArgs) -> Result<Result<(), String>> {
    let content = fs::read_to_string(&args.artifact)
        .with_context(|| format!("failed to read artifact: {}", args.artifact.display()))?;
    let artifact: SignatureArtifact = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse artifact JSON: {}", args.artifact.display()))?;

    let trusted = SignerIdentity::new(load_public_key_pem(&args.pubkey)?)?;
    if trusted.key_id() != artifact.key_id || trusted.public_key_hex() != artifact.public_key {
        return Ok(Err(format!(
            "artifact was signed by {}, trusted key is {}",
            artifact.key_id,
            trusted.key_id()
        )));
    }

    let signing_bytes = BASE64
        .decode(&artifact.signing_bytes)
        .context("failed to decode signing_bytes base64")?;

    let digest = signing_digest(&signing_bytes);
    if digest != artifact.signing_digest {
        return Ok(Err(format!(
            "signing_digest mismatch: artifact says {}, bytes hash to {digest}",
            artifact.signing_digest
        )));
    }

    if !verify_b64(&artifact.signature, &signing_bytes, trusted.public_key()) {
        return Ok(Err("signature does not match signing bytes".to_string()));
    }

    if !args.quiet {
        println!("Verification successful!");
        println!();
        println!("  key_id:         {}", trusted.key_id());
        println!("  scope:          {}", artifact.scope);
        println!("  signing_digest: {digest}");
    }

    Ok(Ok(()))
}
