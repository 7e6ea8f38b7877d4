//! Signer configuration (YAML).
//!
//! ```yaml
//! event_source: "signdata://wallet"
//! approval_timeout_secs: 120
//! decision_log: decisions.ndjson
//! domains:
//!   forbidden: ["TX", "TG"]
//!   allowed:
//!     msgsig: ["", "arc60"]
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{DomainPolicy, DomainRegistry};
use crate::engine::EngineConfig;

pub const DEFAULT_EVENT_SOURCE: &str = "signdata://local";
pub const DEFAULT_APPROVAL_TIMEOUT_SECS: u64 = 120;

/// Upper bound for approval waits; an approval window longer than a day is a misconfiguration.
const MAX_APPROVAL_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignerConfig {
    /// Source URI stamped on decision events.
    #[serde(default = "default_event_source")]
    pub event_source: String,

    /// Seconds to wait for the approver. `0` waits indefinitely.
    #[serde(default = "default_approval_timeout_secs")]
    pub approval_timeout_secs: u64,

    /// NDJSON file receiving one decision event per attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_log: Option<PathBuf>,

    #[serde(default)]
    pub domains: DomainPolicy,
}

fn default_event_source() -> String {
    DEFAULT_EVENT_SOURCE.to_string()
}

fn default_approval_timeout_secs() -> u64 {
    DEFAULT_APPROVAL_TIMEOUT_SECS
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            event_source: default_event_source(),
            approval_timeout_secs: DEFAULT_APPROVAL_TIMEOUT_SECS,
            decision_log: None,
            domains: DomainPolicy::default(),
        }
    }
}

impl SignerConfig {
    /// Load configuration from YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read signer config: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("invalid signer config: {}", path.display()))
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("failed to parse signer config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.event_source.trim().is_empty() {
            bail!("event_source must not be empty");
        }
        if self.approval_timeout_secs > MAX_APPROVAL_TIMEOUT_SECS {
            bail!(
                "approval_timeout_secs {} exceeds maximum of {}",
                self.approval_timeout_secs,
                MAX_APPROVAL_TIMEOUT_SECS
            );
        }
        self.domains.validate()
    }

    pub fn approval_timeout(&self) -> Option<Duration> {
        (self.approval_timeout_secs > 0).then(|| Duration::from_secs(self.approval_timeout_secs))
    }

    pub fn registry(&self) -> Result<DomainRegistry> {
        DomainRegistry::from_policy(&self.domains)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            event_source: self.event_source.clone(),
            approval_timeout: self.approval_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Scope;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = SignerConfig::from_yaml("{}").unwrap();
        assert_eq!(config, SignerConfig::default());
        assert_eq!(config.approval_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.registry().unwrap(), DomainRegistry::standard());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
event_source: "signdata://wallet"
approval_timeout_secs: 0
decision_log: /var/log/signdata/decisions.ndjson
domains:
  forbidden: ["TX", "TG"]
  allowed:
    msgsig: ["arc60"]
    auth: ["arc31"]
"#;
        let config = SignerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.event_source, "signdata://wallet");
        assert_eq!(config.approval_timeout(), None);
        assert_eq!(
            config.decision_log,
            Some(PathBuf::from("/var/log/signdata/decisions.ndjson"))
        );

        let registry = config.registry().unwrap();
        assert!(registry.requires_allow_list(Scope::Authentication));
        assert!(!registry.is_allowed_for_scope("", Scope::MessageSignature));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = SignerConfig::from_yaml("approval_timeout: 5\n").unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse"));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(SignerConfig::from_yaml("event_source: \"  \"\n").is_err());
        assert!(SignerConfig::from_yaml("approval_timeout_secs: 999999\n").is_err());

        let yaml = r#"
domains:
  forbidden: ["TX"]
  allowed:
    msgsig: ["TX"]
"#;
        let err = SignerConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("both forbidden and allowed"));

        let yaml = r#"
domains:
  allowed:
    msgsig: ["T"]
"#;
        let err = SignerConfig::from_yaml(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("overlaps forbidden tag \"TX\""));
    }

    #[test]
    fn test_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("signdata.yaml");
        fs::write(&path, "approval_timeout_secs: 30\n").unwrap();

        let config = SignerConfig::from_file(&path).unwrap();
        assert_eq!(config.engine_config().approval_timeout, Some(Duration::from_secs(30)));

        let err = SignerConfig::from_file(&tmp.path().join("missing.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read signer config"));
    }
}
