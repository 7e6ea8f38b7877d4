//! Error taxonomy for the signing pipeline.
//!
//! Every failure that can stop a signing attempt before a signature exists is
//! a [`SigningError`]. A user declining the request is NOT an error: it is a
//! [`crate::engine::SignOutcome::Rejected`] outcome.

use crate::domain::Scope;

/// Reason codes recorded in decision events and logs.
pub mod reason_codes {
    // Allow
    pub const A_SIGNED: &str = "A_SIGNED";

    // Validation (V_*)
    pub const V_SCHEMA_MALFORMED: &str = "V_SCHEMA_MALFORMED";
    pub const V_PAYLOAD_MALFORMED: &str = "V_PAYLOAD_MALFORMED";
    pub const V_SCHEMA_VIOLATION: &str = "V_SCHEMA_VIOLATION";

    // Domain separation (D_*)
    pub const D_FORBIDDEN_DOMAIN: &str = "D_FORBIDDEN_DOMAIN";
    pub const D_SCOPE_MISMATCH: &str = "D_SCOPE_MISMATCH";

    // Approval (R_*)
    pub const R_DECLINED: &str = "R_DECLINED";
    pub const R_TIMEOUT: &str = "R_TIMEOUT";
    pub const R_CANCELLED: &str = "R_CANCELLED";
    pub const R_APPROVAL_UNAVAILABLE: &str = "R_APPROVAL_UNAVAILABLE";

    // Signing capability (S_*)
    pub const S_SIGNING_FAILED: &str = "S_SIGNING_FAILED";

    // Attempt dropped before it reached a terminal state
    pub const S_ABANDONED: &str = "S_ABANDONED";
}

/// Failures of the payload schema validator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("schema is malformed: {reason}")]
    SchemaMalformed { reason: String },

    #[error("payload is malformed: {reason}")]
    PayloadMalformed { reason: String },

    #[error("payload violates schema: {}", .violations.join("; "))]
    SchemaViolation { violations: Vec<String> },
}

/// Where a forbidden domain separator was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenLocation {
    /// The declared `ARC60Domain` field.
    DeclaredTag,
    /// The leading bytes of the payload body.
    BodyPrefix,
    /// The leading bytes of `tag || body`.
    SigningBytes,
}

impl std::fmt::Display for ForbiddenLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeclaredTag => f.write_str("declared tag"),
            Self::BodyPrefix => f.write_str("body prefix"),
            Self::SigningBytes => f.write_str("signing bytes"),
        }
    }
}

/// Coarse classification of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SchemaMalformed,
    PayloadMalformed,
    SchemaViolation,
    ForbiddenDomain,
    ScopeDomainMismatch,
    ApprovalTimedOut,
    ApprovalUnavailable,
    SigningCapabilityFailure,
}

/// Errors returned by [`crate::engine::AuthorizationEngine`].
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("forbidden domain separator {tag:?} in {location}")]
    ForbiddenDomain {
        tag: String,
        location: ForbiddenLocation,
    },

    #[error("domain tag {tag:?} is not allowed for scope {scope}")]
    ScopeDomainMismatch { tag: String, scope: Scope },

    #[error("approval authority unavailable: {reason}")]
    ApprovalUnavailable { reason: String },

    #[error("signing capability failed: {reason}")]
    SigningCapabilityFailure { reason: String },
}

impl SigningError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(ValidationError::SchemaMalformed { .. }) => ErrorKind::SchemaMalformed,
            Self::Validation(ValidationError::PayloadMalformed { .. }) => {
                ErrorKind::PayloadMalformed
            }
            Self::Validation(ValidationError::SchemaViolation { .. }) => ErrorKind::SchemaViolation,
            Self::ForbiddenDomain { .. } => ErrorKind::ForbiddenDomain,
            Self::ScopeDomainMismatch { .. } => ErrorKind::ScopeDomainMismatch,
            Self::ApprovalUnavailable { .. } => ErrorKind::ApprovalUnavailable,
            Self::SigningCapabilityFailure { .. } => ErrorKind::SigningCapabilityFailure,
        }
    }

    /// Whether the caller may fix the request and resubmit.
    ///
    /// Nothing is retried by the engine itself.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::SigningCapabilityFailure { .. })
    }

    /// Stable reason code for decision events.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::SchemaMalformed { .. }) => {
                reason_codes::V_SCHEMA_MALFORMED
            }
            Self::Validation(ValidationError::PayloadMalformed { .. }) => {
                reason_codes::V_PAYLOAD_MALFORMED
            }
            Self::Validation(ValidationError::SchemaViolation { .. }) => {
                reason_codes::V_SCHEMA_VIOLATION
            }
            Self::ForbiddenDomain { .. } => reason_codes::D_FORBIDDEN_DOMAIN,
            Self::ScopeDomainMismatch { .. } => reason_codes::D_SCOPE_MISMATCH,
            Self::ApprovalUnavailable { .. } => reason_codes::R_APPROVAL_UNAVAILABLE,
            Self::SigningCapabilityFailure { .. } => reason_codes::S_SIGNING_FAILED,
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::ScopeDomainMismatch { .. } => 1,
            Self::ApprovalUnavailable { .. } => 1,
            Self::ForbiddenDomain { .. } => 3,
            Self::SigningCapabilityFailure { .. } => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_signing_failure_is_fatal() {
        let fatal = SigningError::SigningCapabilityFailure {
            reason: "hsm offline".into(),
        };
        assert!(!fatal.is_recoverable());

        let recoverable = [
            SigningError::Validation(ValidationError::PayloadMalformed { reason: "x".into() }),
            SigningError::ForbiddenDomain {
                tag: "TX".into(),
                location: ForbiddenLocation::DeclaredTag,
            },
            SigningError::ScopeDomainMismatch {
                tag: "other".into(),
                scope: Scope::MessageSignature,
            },
            SigningError::ApprovalUnavailable { reason: "x".into() },
        ];
        assert!(recoverable.iter().all(SigningError::is_recoverable));
    }

    #[test]
    fn test_kinds_and_exit_codes() {
        let err = SigningError::from(ValidationError::SchemaViolation {
            violations: vec!["\"ARC60Domain\" is a required property".into()],
        });
        assert_eq!(err.kind(), ErrorKind::SchemaViolation);
        assert_eq!(err.reason_code(), reason_codes::V_SCHEMA_VIOLATION);
        assert_eq!(err.exit_code(), 1);

        let err = SigningError::ForbiddenDomain {
            tag: "TG".into(),
            location: ForbiddenLocation::BodyPrefix,
        };
        assert_eq!(err.kind(), ErrorKind::ForbiddenDomain);
        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            err.to_string(),
            "forbidden domain separator \"TG\" in body prefix"
        );
    }

    #[test]
    fn test_violation_message_lists_all() {
        let err = ValidationError::SchemaViolation {
            violations: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "payload violates schema: a; b");
    }
}
