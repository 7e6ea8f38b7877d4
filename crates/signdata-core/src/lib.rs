//! Authorization pipeline for signing structured, non-transaction data.
//!
//! A [`SigningRequest`] is validated against a JSON Schema, checked against
//! the [`DomainRegistry`] so it can never collide with a transaction
//! (`TX`) or transaction group (`TG`) signature, rendered into a
//! confirmation prompt, and only signed once an [`ApprovalAuthority`]
//! confirms it. See [`AuthorizationEngine`].

pub mod capability;
pub mod config;
pub mod decision;
pub mod domain;
pub mod engine;
pub mod error;
pub mod keys;
pub mod prompt;
pub mod schema;
pub mod signing_bytes;
pub mod verify;

// Convenience re-exports
pub use capability::{
    ApprovalAuthority, ApprovalDecision, ApprovalError, ApprovalRequest, LocalKeySigner,
    SigningCapability, SigningCapabilityError, StaticApproval,
};
pub use config::SignerConfig;
pub use decision::{
    Decision, DecisionEmitter, DecisionEvent, FileDecisionEmitter, NullDecisionEmitter,
};
pub use domain::{DomainPolicy, DomainRegistry, Scope};
pub use engine::{
    AttemptState, AuthorizationEngine, EngineConfig, RejectReason, SignOutcome, SignedArtifact,
    SigningMetadata, SigningRequest,
};
pub use error::{ErrorKind, ForbiddenLocation, SigningError, ValidationError};
pub use keys::SignerIdentity;
pub use schema::{PayloadSchema, StructuredPayload, ARC60_SIMPLE_SCHEMA};
pub use verify::verify;
