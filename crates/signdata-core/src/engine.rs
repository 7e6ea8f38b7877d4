//! Authorization decision engine.
//!
//! One call to [`AuthorizationEngine::authorize_and_sign`] is one signing
//! attempt. The attempt walks a fixed state machine:
//!
//! ```text
//! Received -> Validating -> ValidationFailed
//!                        -> DomainRejected
//!                        -> AwaitingApproval -> Approved -> Signing -> Signed
//!                                                                   -> Failed
//!                                            -> Rejected
//!                                            -> Failed
//! ```
//!
//! Nothing reaches the approver unless the payload passed schema validation
//! and every domain separation check. The approver is asked exactly once and
//! the signing capability is invoked at most once; neither is retried.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::SIGNATURE_LENGTH;
use tracing::Instrument;

use crate::capability::{
    ApprovalAuthority, ApprovalDecision, ApprovalError, ApprovalRequest, SigningCapability,
};
use crate::config::{DEFAULT_APPROVAL_TIMEOUT_SECS, DEFAULT_EVENT_SOURCE};
use crate::decision::{DecisionEmitter, DecisionGuard, NullDecisionEmitter};
use crate::domain::{DomainRegistry, Scope};
use crate::error::{reason_codes, ErrorKind, ForbiddenLocation, SigningError};
use crate::keys::SignerIdentity;
use crate::schema::{self, StructuredPayload, ARC60_SIMPLE_SCHEMA};
use crate::signing_bytes::{self, signing_digest};
use crate::{prompt, verify};

/// How a payload should be interpreted and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningMetadata {
    pub scope: Scope,
    /// JSON Schema source the payload must satisfy.
    pub schema: String,
}

impl SigningMetadata {
    pub fn new(scope: Scope, schema: impl Into<String>) -> Self {
        Self {
            scope,
            schema: schema.into(),
        }
    }

    /// Message signature scope with the embedded ARC-60 schema.
    pub fn arc60() -> Self {
        Self::new(Scope::MessageSignature, ARC60_SIMPLE_SCHEMA)
    }
}

/// One signing attempt's input. Consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRequest {
    pub raw_payload: String,
    pub metadata: SigningMetadata,
}

impl SigningRequest {
    pub fn new(raw_payload: impl Into<String>, metadata: SigningMetadata) -> Self {
        Self {
            raw_payload: raw_payload.into(),
            metadata,
        }
    }
}

/// States of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Received,
    Validating,
    ValidationFailed,
    DomainRejected,
    AwaitingApproval,
    Approved,
    Signing,
    Signed,
    Rejected,
    Failed,
}

impl AttemptState {
    pub fn can_transition_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Received, Validating)
                | (Validating, ValidationFailed | DomainRejected | AwaitingApproval)
                | (AwaitingApproval, Approved | Rejected | Failed)
                | (Approved, Signing)
                | (Signing, Signed | Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ValidationFailed | Self::DomainRejected | Self::Signed | Self::Rejected | Self::Failed
        )
    }
}

/// Why an attempt ended without a signature while not being a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The approver answered Reject.
    Declined,
    /// The approver did not answer within the configured timeout.
    ApprovalTimedOut,
    /// The caller cancelled the attempt while it awaited approval.
    Cancelled,
}

impl RejectReason {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Declined => reason_codes::R_DECLINED,
            Self::ApprovalTimedOut => reason_codes::R_TIMEOUT,
            Self::Cancelled => reason_codes::R_CANCELLED,
        }
    }

    /// Error classification for callers that bucket timeouts with failures.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::ApprovalTimedOut => Some(ErrorKind::ApprovalTimedOut),
            Self::Declined | Self::Cancelled => None,
        }
    }
}

/// A produced signature together with what it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    pub attempt_id: String,
    pub scope: Scope,
    pub signer: SignerIdentity,
    pub signing_bytes: Vec<u8>,
    pub signature: [u8; SIGNATURE_LENGTH],
}

impl SignedArtifact {
    pub fn signature_b64(&self) -> String {
        BASE64.encode(self.signature)
    }

    pub fn signing_digest(&self) -> String {
        signing_digest(&self.signing_bytes)
    }

    /// `signature || signing_bytes`, openable with [`verify::open`].
    pub fn to_signed_message(&self) -> Vec<u8> {
        verify::to_signed_message(&self.signature, &self.signing_bytes)
    }

    pub fn verify(&self) -> bool {
        verify::verify(&self.signature, &self.signing_bytes, self.signer.public_key())
    }
}

/// Terminal result of an attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(SignedArtifact),
    Rejected {
        attempt_id: String,
        reason: RejectReason,
    },
}

impl SignOutcome {
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }

    pub fn artifact(&self) -> Option<&SignedArtifact> {
        match self {
            Self::Signed(artifact) => Some(artifact),
            Self::Rejected { .. } => None,
        }
    }

    pub fn attempt_id(&self) -> &str {
        match self {
            Self::Signed(artifact) => &artifact.attempt_id,
            Self::Rejected { attempt_id, .. } => attempt_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Source URI stamped on decision events.
    pub event_source: String,
    /// How long to wait for the approver. `None` waits until answered or cancelled.
    pub approval_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
            approval_timeout: Some(Duration::from_secs(DEFAULT_APPROVAL_TIMEOUT_SECS)),
        }
    }
}

struct Attempt {
    id: String,
    state: AttemptState,
}

impl Attempt {
    fn new() -> Self {
        Self {
            id: format!("att_{}", uuid::Uuid::new_v4()),
            state: AttemptState::Received,
        }
    }

    fn transition(&mut self, next: AttemptState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "attempt transition");
        self.state = next;
    }
}

enum ApprovalWait {
    Decided(Result<ApprovalDecision, ApprovalError>),
    TimedOut,
    Cancelled,
}

/// Orchestrates validation, domain checks, approval and signing.
///
/// Holds only shared immutable state, so one engine can serve many
/// concurrent attempts.
pub struct AuthorizationEngine {
    registry: Arc<DomainRegistry>,
    approver: Arc<dyn ApprovalAuthority>,
    signer: Arc<dyn SigningCapability>,
    emitter: Arc<dyn DecisionEmitter>,
    config: EngineConfig,
}

impl AuthorizationEngine {
    pub fn new(
        registry: Arc<DomainRegistry>,
        approver: Arc<dyn ApprovalAuthority>,
        signer: Arc<dyn SigningCapability>,
    ) -> Self {
        Self {
            registry,
            approver,
            signer,
            emitter: Arc::new(NullDecisionEmitter),
            config: EngineConfig::default(),
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn DecisionEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Run one attempt to completion.
    ///
    /// `Ok(SignOutcome::Rejected { .. })` is a normal outcome (the approver
    /// declined or did not answer in time), not an error.
    pub async fn authorize_and_sign(
        &self,
        request: SigningRequest,
        signer: &SignerIdentity,
    ) -> Result<SignOutcome, SigningError> {
        self.authorize_and_sign_with_cancel(request, signer, std::future::pending())
            .await
    }

    /// Like [`Self::authorize_and_sign`], resolving as
    /// `Rejected { reason: Cancelled }` if `cancel` completes while the
    /// attempt awaits approval.
    pub async fn authorize_and_sign_with_cancel<C>(
        &self,
        request: SigningRequest,
        signer: &SignerIdentity,
        cancel: C,
    ) -> Result<SignOutcome, SigningError>
    where
        C: Future<Output = ()> + Send,
    {
        let attempt = Attempt::new();
        let span = tracing::info_span!(
            "sign_attempt",
            attempt_id = %attempt.id,
            scope = %request.metadata.scope,
            key_id = %signer.key_id(),
        );
        self.run(attempt, request, signer, cancel)
            .instrument(span)
            .await
    }

    async fn run<C>(
        &self,
        mut attempt: Attempt,
        request: SigningRequest,
        signer: &SignerIdentity,
        cancel: C,
    ) -> Result<SignOutcome, SigningError>
    where
        C: Future<Output = ()> + Send,
    {
        let scope = request.metadata.scope;
        let mut guard = DecisionGuard::new(
            self.emitter.clone(),
            self.config.event_source.clone(),
            attempt.id.clone(),
            scope,
            signer.key_id().to_string(),
        );

        attempt.transition(AttemptState::Validating);
        let payload = match schema::validate(&request.metadata.schema, &request.raw_payload) {
            Ok(payload) => payload,
            Err(e) => {
                attempt.transition(AttemptState::ValidationFailed);
                let err = SigningError::from(e);
                tracing::warn!(reason_code = err.reason_code(), error = %err, "payload validation failed");
                guard.emit_deny(err.reason_code(), Some(err.to_string()));
                return Err(err);
            }
        };

        if let Err(err) = self.check_domain(&payload, scope) {
            attempt.transition(AttemptState::DomainRejected);
            tracing::warn!(reason_code = err.reason_code(), error = %err, "domain separation check failed");
            guard.emit_deny(err.reason_code(), Some(err.to_string()));
            return Err(err);
        }

        let signing_bytes = signing_bytes::build(&payload);
        let digest = signing_digest(&signing_bytes);
        guard.set_signing(payload.domain_tag(), &digest);

        let approval_request = ApprovalRequest {
            attempt_id: attempt.id.clone(),
            scope,
            signer: signer.clone(),
            prompt: prompt::render(scope, signer, &signing_bytes),
            signing_bytes,
        };

        attempt.transition(AttemptState::AwaitingApproval);
        tracing::debug!(signing_digest = %digest, "awaiting approval");
        let started = Instant::now();
        let decision = match self.await_approval(&approval_request, cancel).await {
            ApprovalWait::Decided(Ok(decision)) => decision,
            ApprovalWait::Decided(Err(e)) => {
                attempt.transition(AttemptState::Failed);
                let err = SigningError::ApprovalUnavailable {
                    reason: e.to_string(),
                };
                tracing::error!(error = %err, "approval authority failed");
                guard.emit_error(err.reason_code(), Some(err.to_string()));
                return Err(err);
            }
            ApprovalWait::TimedOut => {
                attempt.transition(AttemptState::Rejected);
                tracing::warn!(timeout = ?self.config.approval_timeout, "approval timed out");
                return Ok(reject(guard, attempt, RejectReason::ApprovalTimedOut));
            }
            ApprovalWait::Cancelled => {
                attempt.transition(AttemptState::Rejected);
                tracing::info!("attempt cancelled while awaiting approval");
                return Ok(reject(guard, attempt, RejectReason::Cancelled));
            }
        };
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        guard.set_approval(decision, latency_ms);

        if decision == ApprovalDecision::Reject {
            attempt.transition(AttemptState::Rejected);
            tracing::info!(signing_digest = %digest, "signing request declined");
            return Ok(reject(guard, attempt, RejectReason::Declined));
        }

        attempt.transition(AttemptState::Approved);
        attempt.transition(AttemptState::Signing);
        let ApprovalRequest { signing_bytes, .. } = approval_request;

        let signature = match self.sign_once(&signing_bytes, signer).await {
            Ok(signature) => signature,
            Err(err) => {
                attempt.transition(AttemptState::Failed);
                tracing::error!(error = %err, "signing capability failed");
                guard.emit_error(err.reason_code(), Some(err.to_string()));
                return Err(err);
            }
        };

        attempt.transition(AttemptState::Signed);
        tracing::info!(signing_digest = %digest, "signed structured data");
        guard.emit_allow(reason_codes::A_SIGNED);

        Ok(SignOutcome::Signed(SignedArtifact {
            attempt_id: attempt.id,
            scope,
            signer: signer.clone(),
            signing_bytes,
            signature,
        }))
    }

    /// Domain separation: declared tag (exact, then prefix), scope allow-list,
    /// body prefix, then the assembled signing bytes.
    ///
    /// The body prefix is checked even when the tag is allowed, so a benign
    /// tag cannot smuggle a transaction-shaped body. The last check catches a
    /// short tag and a body that only form a reserved prefix once joined.
    fn check_domain(&self, payload: &StructuredPayload, scope: Scope) -> Result<(), SigningError> {
        let tag = payload.domain_tag();

        if self.registry.is_forbidden(tag) {
            return Err(SigningError::ForbiddenDomain {
                tag: tag.to_string(),
                location: ForbiddenLocation::DeclaredTag,
            });
        }

        if let Some(prefix) = self.registry.forbidden_prefix(tag.as_bytes()) {
            return Err(SigningError::ForbiddenDomain {
                tag: prefix.to_string(),
                location: ForbiddenLocation::DeclaredTag,
            });
        }

        if self.registry.requires_allow_list(scope) && !self.registry.is_allowed_for_scope(tag, scope)
        {
            return Err(SigningError::ScopeDomainMismatch {
                tag: tag.to_string(),
                scope,
            });
        }

        if let Some(prefix) = self.registry.body_prefix_forbidden(payload.body()) {
            return Err(SigningError::ForbiddenDomain {
                tag: prefix.to_string(),
                location: ForbiddenLocation::BodyPrefix,
            });
        }

        if let Some(prefix) = self.registry.forbidden_prefix(&signing_bytes::build(payload)) {
            return Err(SigningError::ForbiddenDomain {
                tag: prefix.to_string(),
                location: ForbiddenLocation::SigningBytes,
            });
        }

        Ok(())
    }

    async fn await_approval<C>(&self, request: &ApprovalRequest, cancel: C) -> ApprovalWait
    where
        C: Future<Output = ()> + Send,
    {
        let timeout = self.config.approval_timeout;
        let deadline = async move {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel => ApprovalWait::Cancelled,
            result = self.approver.request_approval(request) => ApprovalWait::Decided(result),
            _ = deadline => ApprovalWait::TimedOut,
        }
    }

    /// Single signing call; the result must verify against the requested signer.
    async fn sign_once(
        &self,
        signing_bytes: &[u8],
        signer: &SignerIdentity,
    ) -> Result<[u8; SIGNATURE_LENGTH], SigningError> {
        let raw = self
            .signer
            .sign(signing_bytes, signer)
            .await
            .map_err(|e| SigningError::SigningCapabilityFailure {
                reason: e.to_string(),
            })?;

        let signature: [u8; SIGNATURE_LENGTH] =
            raw.as_slice()
                .try_into()
                .map_err(|_| SigningError::SigningCapabilityFailure {
                    reason: format!(
                        "signature must be {SIGNATURE_LENGTH} bytes, got {}",
                        raw.len()
                    ),
                })?;

        if !verify::verify(&signature, signing_bytes, signer.public_key()) {
            return Err(SigningError::SigningCapabilityFailure {
                reason: format!("signature does not verify for signer {}", signer.key_id()),
            });
        }

        Ok(signature)
    }
}

fn reject(guard: DecisionGuard, attempt: Attempt, reason: RejectReason) -> SignOutcome {
    guard.emit_deny(reason.reason_code(), None);
    SignOutcome::Rejected {
        attempt_id: attempt.id,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{LocalKeySigner, StaticApproval};
    use ed25519_dalek::SigningKey;
    use serde_json::json;

    fn engine(approver: StaticApproval) -> (AuthorizationEngine, SignerIdentity) {
        let signer = LocalKeySigner::new(SigningKey::generate(&mut rand::thread_rng())).unwrap();
        let identity = signer.identity().clone();
        let engine = AuthorizationEngine::new(
            Arc::new(DomainRegistry::standard()),
            Arc::new(approver),
            Arc::new(signer),
        );
        (engine, identity)
    }

    fn arc60_request(tag: &str, body: &str) -> SigningRequest {
        SigningRequest::new(
            json!({"ARC60Domain": tag, "bytes": body}).to_string(),
            SigningMetadata::arc60(),
        )
    }

    #[test]
    fn test_state_machine_edges() {
        use AttemptState::*;
        assert!(Received.can_transition_to(Validating));
        assert!(Validating.can_transition_to(AwaitingApproval));
        assert!(AwaitingApproval.can_transition_to(Rejected));
        assert!(Signing.can_transition_to(Signed));

        assert!(!Received.can_transition_to(AwaitingApproval));
        assert!(!Validating.can_transition_to(Signing));
        assert!(!AwaitingApproval.can_transition_to(Signed));
        assert!(!Rejected.can_transition_to(Signing));
        assert!(!Signed.can_transition_to(Signing));

        for terminal in [ValidationFailed, DomainRejected, Signed, Rejected, Failed] {
            assert!(terminal.is_terminal());
        }
        assert!(!AwaitingApproval.is_terminal());
    }

    #[tokio::test]
    async fn test_confirmed_request_is_signed() {
        let (engine, identity) = engine(StaticApproval::confirm());
        let outcome = engine
            .authorize_and_sign(arc60_request("arc60", "hello"), &identity)
            .await
            .unwrap();

        let artifact = outcome.artifact().expect("should be signed");
        assert_eq!(artifact.signing_bytes, b"arc60hello");
        assert!(artifact.verify());
        assert!(outcome.attempt_id().starts_with("att_"));
    }

    #[tokio::test]
    async fn test_declined_request_is_not_an_error() {
        let (engine, identity) = engine(StaticApproval::reject());
        let outcome = engine
            .authorize_and_sign(arc60_request("arc60", "hello"), &identity)
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            SignOutcome::Rejected {
                reason: RejectReason::Declined,
                ..
            }
        ));
        assert!(outcome.artifact().is_none());
    }

    #[tokio::test]
    async fn test_domain_check_order() {
        let (engine, identity) = engine(StaticApproval::confirm());

        let err = engine
            .authorize_and_sign(arc60_request("TX", "hello"), &identity)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SigningError::ForbiddenDomain {
                location: ForbiddenLocation::DeclaredTag,
                ..
            }
        ));

        let err = engine
            .authorize_and_sign(arc60_request("arc31", "hello"), &identity)
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::ScopeDomainMismatch { .. }));

        let err = engine
            .authorize_and_sign(arc60_request("arc60", "TGgroup"), &identity)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SigningError::ForbiddenDomain {
                location: ForbiddenLocation::BodyPrefix,
                ..
            }
        ));
    }

    #[test]
    fn test_reject_reason_codes() {
        assert_eq!(RejectReason::Declined.reason_code(), reason_codes::R_DECLINED);
        assert_eq!(
            RejectReason::ApprovalTimedOut.error_kind(),
            Some(ErrorKind::ApprovalTimedOut)
        );
        assert_eq!(RejectReason::Declined.error_kind(), None);
    }
}
