//! Signing decision events and the always-emit guard.
//!
//! Every signing attempt emits exactly one decision event, whatever the
//! outcome: `allow` when a signature was produced, `deny` when validation,
//! domain policy or the approver stopped it, `error` otherwise.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, PoisonError};

use crate::capability::ApprovalDecision;
use crate::domain::Scope;
use crate::error::reason_codes;

/// Event type written to every decision record.
pub const EVENT_TYPE_SIGN_DECISION: &str = "signdata.sign.decision";

/// Decision outcome for a signing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    Error,
}

/// A signing decision event (CloudEvents shaped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub specversion: String,
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub time: String,
    pub data: DecisionData,
}

/// Data payload for a decision event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionData {
    pub attempt_id: String,
    pub scope: Scope,
    pub key_id: String,
    pub decision: Decision,
    /// Machine-parseable reason code
    pub reason_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_tag: Option<String>,
    /// Digest of the signing bytes, never the bytes themselves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval: Option<ApprovalDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_latency_ms: Option<u64>,
}

impl DecisionEvent {
    /// Create a new event. Defaults to an error decision until finalized.
    pub fn new(source: String, attempt_id: String, scope: Scope, key_id: String) -> Self {
        Self {
            specversion: "1.0".to_string(),
            id: format!("evt_sign_{}", uuid::Uuid::new_v4()),
            event_type: EVENT_TYPE_SIGN_DECISION.to_string(),
            source,
            time: chrono::Utc::now().to_rfc3339(),
            data: DecisionData {
                attempt_id,
                scope,
                key_id,
                decision: Decision::Error,
                reason_code: reason_codes::S_ABANDONED.to_string(),
                reason: Some("Decision not finalized".to_string()),
                domain_tag: None,
                signing_digest: None,
                approval: None,
                approval_latency_ms: None,
            },
        }
    }

    pub fn allow(mut self, reason_code: &str) -> Self {
        self.data.decision = Decision::Allow;
        self.data.reason_code = reason_code.to_string();
        self.data.reason = None;
        self
    }

    pub fn deny(mut self, reason_code: &str, reason: Option<String>) -> Self {
        self.data.decision = Decision::Deny;
        self.data.reason_code = reason_code.to_string();
        self.data.reason = reason;
        self
    }

    pub fn error(mut self, reason_code: &str, reason: Option<String>) -> Self {
        self.data.decision = Decision::Error;
        self.data.reason_code = reason_code.to_string();
        self.data.reason = reason;
        self
    }
}

/// Trait for emitting decision events.
pub trait DecisionEmitter: Send + Sync {
    fn emit(&self, event: &DecisionEvent);
}

/// File-based decision emitter (NDJSON).
pub struct FileDecisionEmitter {
    file: std::sync::Mutex<std::fs::File>,
}

impl FileDecisionEmitter {
    pub fn new(path: &std::path::Path) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            file: std::sync::Mutex::new(file),
        })
    }
}

impl DecisionEmitter for FileDecisionEmitter {
    fn emit(&self, event: &DecisionEvent) {
        match serde_json::to_string(event) {
            Ok(json) => {
                // A panic while holding the lock leaves the file usable.
                let mut f = self.file.lock().unwrap_or_else(PoisonError::into_inner);
                if let Err(e) = writeln!(f, "{}", json) {
                    tracing::warn!(error = %e, "failed to write decision event");
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to serialize decision event"),
        }
    }
}

/// Emitter that drops events.
pub struct NullDecisionEmitter;

impl DecisionEmitter for NullDecisionEmitter {
    fn emit(&self, _event: &DecisionEvent) {}
}

/// RAII guard that ensures a decision event is ALWAYS emitted.
///
/// Dropping the guard without an explicit `emit_*` call (early return, panic,
/// cancelled future) emits an `error` decision.
pub struct DecisionGuard {
    emitter: Arc<dyn DecisionEmitter>,
    event: Option<DecisionEvent>,
}

impl DecisionGuard {
    pub fn new(
        emitter: Arc<dyn DecisionEmitter>,
        source: String,
        attempt_id: String,
        scope: Scope,
        key_id: String,
    ) -> Self {
        Self {
            emitter,
            event: Some(DecisionEvent::new(source, attempt_id, scope, key_id)),
        }
    }

    /// Record what is about to be signed.
    pub fn set_signing(&mut self, domain_tag: &str, signing_digest: &str) {
        if let Some(ref mut event) = self.event {
            event.data.domain_tag = Some(domain_tag.to_string());
            event.data.signing_digest = Some(signing_digest.to_string());
        }
    }

    /// Record the approver's answer.
    pub fn set_approval(&mut self, approval: ApprovalDecision, latency_ms: u64) {
        if let Some(ref mut event) = self.event {
            event.data.approval = Some(approval);
            event.data.approval_latency_ms = Some(latency_ms);
        }
    }

    pub fn emit_allow(mut self, reason_code: &str) {
        if let Some(event) = self.event.take() {
            self.emitter.emit(&event.allow(reason_code));
        }
    }

    pub fn emit_deny(mut self, reason_code: &str, reason: Option<String>) {
        if let Some(event) = self.event.take() {
            self.emitter.emit(&event.deny(reason_code, reason));
        }
    }

    pub fn emit_error(mut self, reason_code: &str, reason: Option<String>) {
        if let Some(event) = self.event.take() {
            self.emitter.emit(&event.error(reason_code, reason));
        }
    }
}

impl Drop for DecisionGuard {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.emitter.emit(&event.error(
                reason_codes::S_ABANDONED,
                Some("Attempt abandoned before a decision was reached (panic or dropped future)".to_string()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmitter {
        count: AtomicUsize,
        last: std::sync::Mutex<Option<DecisionEvent>>,
    }

    impl CountingEmitter {
        fn new() -> Self {
            Self {
                count: AtomicUsize::new(0),
                last: std::sync::Mutex::new(None),
            }
        }
    }

    impl DecisionEmitter for CountingEmitter {
        fn emit(&self, event: &DecisionEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(event.clone());
        }
    }

    fn guard(emitter: Arc<CountingEmitter>) -> DecisionGuard {
        DecisionGuard::new(
            emitter,
            "signdata://test".to_string(),
            "att_001".to_string(),
            Scope::MessageSignature,
            "sha256:abc".to_string(),
        )
    }

    #[test]
    fn test_guard_explicit_allow_emits_once() {
        let emitter = Arc::new(CountingEmitter::new());
        let mut g = guard(emitter.clone());
        g.set_signing("arc60", "sha256:def");
        g.set_approval(ApprovalDecision::Confirm, 12);
        g.emit_allow(reason_codes::A_SIGNED);

        assert_eq!(emitter.count.load(Ordering::SeqCst), 1);
        let event = emitter.last.lock().unwrap().clone().unwrap();
        assert_eq!(event.data.decision, Decision::Allow);
        assert_eq!(event.data.domain_tag.as_deref(), Some("arc60"));
        assert_eq!(event.data.approval, Some(ApprovalDecision::Confirm));
        assert!(event.data.reason.is_none());
    }

    #[test]
    fn test_guard_drop_emits_error() {
        let emitter = Arc::new(CountingEmitter::new());
        {
            let _g = guard(emitter.clone());
        }

        assert_eq!(emitter.count.load(Ordering::SeqCst), 1);
        let event = emitter.last.lock().unwrap().clone().unwrap();
        assert_eq!(event.data.decision, Decision::Error);
        assert_eq!(event.data.reason_code, reason_codes::S_ABANDONED);
    }

    #[test]
    fn test_guard_no_double_emit() {
        let emitter = Arc::new(CountingEmitter::new());
        {
            let g = guard(emitter.clone());
            g.emit_deny(reason_codes::R_DECLINED, None);
        }
        assert_eq!(emitter.count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_file_emitter_writes_ndjson() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("decisions.ndjson");
        let emitter: Arc<dyn DecisionEmitter> = Arc::new(FileDecisionEmitter::new(&path).unwrap());

        for id in ["att_1", "att_2"] {
            DecisionGuard::new(
                emitter.clone(),
                "signdata://test".to_string(),
                id.to_string(),
                Scope::Authentication,
                "sha256:abc".to_string(),
            )
            .emit_deny(reason_codes::D_FORBIDDEN_DOMAIN, Some("TX".to_string()));
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let event: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(event["type"], EVENT_TYPE_SIGN_DECISION);
        assert_eq!(event["data"]["attempt_id"], "att_2");
        assert_eq!(event["data"]["scope"], "auth");
        assert_eq!(event["data"]["decision"], "deny");
        assert!(event["data"].get("signing_digest").is_none());
    }

    #[test]
    fn test_file_emitter_survives_poisoned_lock() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("decisions.ndjson");
        let emitter = Arc::new(FileDecisionEmitter::new(&path).unwrap());

        let poisoner = emitter.clone();
        let joined = std::thread::spawn(move || {
            let _held = poisoner.file.lock().unwrap();
            panic!("writer crashed while holding the log");
        })
        .join();
        assert!(joined.is_err());
        assert!(emitter.file.is_poisoned());

        DecisionGuard::new(
            emitter,
            "signdata://test".to_string(),
            "att_1".to_string(),
            Scope::MessageSignature,
            "sha256:abc".to_string(),
        )
        .emit_deny(reason_codes::R_DECLINED, None);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains(reason_codes::R_DECLINED));
    }
}
