//! `signdata sign` - Run a payload through validation, approval and signing.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use signdata_core::keys::load_private_key_pem;
use signdata_core::{
    ApprovalAuthority, AuthorizationEngine, DecisionEmitter, FileDecisionEmitter, LocalKeySigner,
    NullDecisionEmitter, RejectReason, Scope, SignOutcome, SignerConfig, SigningError,
    SigningMetadata, SigningRequest, StaticApproval, ARC60_SIMPLE_SCHEMA,
};

use crate::cli::approval::TerminalApproval;
use crate::cli::artifact::SignatureArtifact;
use crate::exit_codes;

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Payload file (JSON), or `-` for stdin
    pub payload: PathBuf,

    /// Private key file (PKCS#8 PEM)
    #[arg(long, short)]
    pub key: PathBuf,

    /// JSON Schema the payload must satisfy (default: built-in ARC-60 schema)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Signing scope: msgsig or auth
    #[arg(long, default_value = "msgsig")]
    pub scope: String,

    /// Signer configuration file (YAML)
    #[arg(long, env = "SIGNDATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Approve without prompting
    #[arg(long, short, conflicts_with = "reject")]
    pub yes: bool,

    /// Decline without prompting
    #[arg(long)]
    pub reject: bool,

    /// Seconds to wait for approval (0 waits indefinitely); overrides config
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Write the signature artifact here instead of stdout
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

pub async fn cmd_sign(args: SignArgs) -> i32 {
    match run_sign(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            e.downcast_ref::<SigningError>()
                .map_or(exit_codes::INVALID_INPUT, SigningError::exit_code)
        }
    }
}

async fn run_sign(args: SignArgs) -> Result<i32> {
    let scope: Scope = args.scope.parse()?;

    let mut config = match &args.config {
        Some(path) => SignerConfig::from_file(path)?,
        None => SignerConfig::default(),
    };
    if let Some(secs) = args.timeout_secs {
        config.approval_timeout_secs = secs;
        config.validate().context("invalid --timeout-secs")?;
    }

    let signer = LocalKeySigner::new(load_private_key_pem(&args.key)?)?;
    let identity = signer.identity().clone();

    let raw_payload = read_payload(&args.payload)?;
    let schema = match &args.schema {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read schema file: {}", path.display()))?,
        None => ARC60_SIMPLE_SCHEMA.to_string(),
    };

    let approver: Arc<dyn ApprovalAuthority> = if args.yes {
        Arc::new(StaticApproval::confirm())
    } else if args.reject {
        Arc::new(StaticApproval::reject())
    } else {
        Arc::new(TerminalApproval)
    };

    let emitter: Arc<dyn DecisionEmitter> = match &config.decision_log {
        Some(path) => Arc::new(FileDecisionEmitter::new(path).with_context(|| {
            format!("failed to open decision log: {}", path.display())
        })?),
        None => Arc::new(NullDecisionEmitter),
    };

    let engine = AuthorizationEngine::new(Arc::new(config.registry()?), approver, Arc::new(signer))
        .with_emitter(emitter)
        .with_config(config.engine_config());

    let request = SigningRequest::new(raw_payload, SigningMetadata::new(scope, schema));
    let cancel = interrupted(tokio::signal::ctrl_c());

    match engine
        .authorize_and_sign_with_cancel(request, &identity, cancel)
        .await?
    {
        SignOutcome::Signed(signed) => {
            let artifact = SignatureArtifact::from(&signed);
            let json = serde_json::to_string_pretty(&artifact)?;

            match &args.out {
                Some(path) => {
                    fs::write(path, format!("{json}\n"))
                        .with_context(|| format!("failed to write artifact: {}", path.display()))?;
                    println!("Signed {} bytes:", signed.signing_bytes.len());
                    println!("  Output:         {}", path.display());
                    println!("  key_id:         {}", artifact.key_id);
                    println!("  signing_digest: {}", artifact.signing_digest);
                }
                None => println!("{json}"),
            }
            Ok(exit_codes::SUCCESS)
        }
        SignOutcome::Rejected { reason, .. } => {
            eprintln!("not signed: {}", describe(reason));
            Ok(exit_codes::REJECTED)
        }
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed the attempt is
/// left to the approver and the timeout instead of being cancelled at once.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c; interrupt disabled");
        std::future::pending::<()>().await;
    }
}

fn read_payload(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        return std::io::read_to_string(std::io::stdin()).context("failed to read payload from stdin");
    }
    fs::read_to_string(path)
        .with_context(|| format!("failed to read payload file: {}", path.display()))
}

fn describe(reason: RejectReason) -> &'static str {
    match reason {
        RejectReason::Declined => "request declined",
        RejectReason::ApprovalTimedOut => "approval timed out",
        RejectReason::Cancelled => "interrupted while awaiting approval",
    }
}
