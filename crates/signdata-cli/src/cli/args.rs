use clap::{Parser, Subcommand};

use super::commands::{keygen::KeygenArgs, schema::SchemaArgs, sign::SignArgs, verify::VerifyArgs};

#[derive(Parser, Debug)]
#[command(
    name = "signdata",
    version,
    about = "Sign structured, non-transaction data with domain separation and explicit approval"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate an ed25519 keypair (PKCS#8 / SPKI PEM)
    Keygen(KeygenArgs),

    /// Validate, approve and sign a structured payload
    Sign(SignArgs),

    /// Verify a signature artifact produced by `sign`
    Verify(VerifyArgs),

    /// Print the built-in ARC-60 payload schema
    Schema(SchemaArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_yes_and_reject_conflict() {
        let err = Cli::try_parse_from([
            "signdata", "sign", "payload.json", "--key", "k.pem", "--yes", "--reject",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_sign_defaults() {
        let cli = Cli::try_parse_from(["signdata", "sign", "payload.json", "--key", "k.pem"]).unwrap();
        match cli.cmd {
            Command::Sign(args) => {
                assert_eq!(args.scope, "msgsig");
                assert!(args.schema.is_none());
                assert!(args.timeout_secs.is_none());
                assert!(!args.yes && !args.reject);
            }
            other => panic!("expected sign, got {other:?}"),
        }
    }
}
