//! `signdata keygen` - Generate an ed25519 signing keypair.

use anyhow::{bail, Context, Result};
use clap::Args;
use ed25519_dalek::SigningKey;
use std::fs;
use std::path::{Path, PathBuf};

use signdata_core::SignerIdentity;

use crate::exit_codes;

pub const PRIVATE_KEY_FILE: &str = "private_key.pem";
pub const PUBLIC_KEY_FILE: &str = "public_key.pem";

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for keypair files
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Overwrite an existing keypair
    #[arg(long, short)]
    pub force: bool,
}

pub fn cmd_keygen(args: KeygenArgs) -> i32 {
    match run_keygen(&args) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_codes::INVALID_INPUT
        }
    }
}

fn run_keygen(args: &KeygenArgs) -> Result<()> {
    use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create directory: {}", args.out.display()))?;

    let private_path = args.out.join(PRIVATE_KEY_FILE);
    let public_path = args.out.join(PUBLIC_KEY_FILE);

    if !args.force {
        for path in [&private_path, &public_path] {
            if path.exists() {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
        }
    }

    let signing_key = SigningKey::generate(&mut rand::thread_rng());
    let identity = SignerIdentity::from_signing_key(&signing_key)?;

    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key as PKCS#8 PEM")?;
    let public_pem = identity
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key as SPKI PEM")?;

    write_private(&private_path, private_pem.as_bytes())?;
    fs::write(&public_path, public_pem)
        .with_context(|| format!("failed to write public key: {}", public_path.display()))?;

    tracing::info!(key_id = %identity.key_id(), "generated signing keypair");

    println!("Generated ed25519 keypair:");
    println!("  Private key: {} (PKCS#8 PEM, mode 0600)", private_path.display());
    println!("  Public key:  {} (SPKI PEM)", public_path.display());
    println!();
    println!("key_id:     {}", identity.key_id());
    println!("public_key: {}", identity.public_key_hex());

    Ok(())
}

fn write_private(path: &Path, pem: &[u8]) -> Result<()> {
    fs::write(path, pem)
        .with_context(|| format!("failed to write private key: {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on: {}", path.display()))?;
    }

    Ok(())
}
