//! Domain separator registry.
//!
//! Static policy deciding which domain tags are reserved for other signed
//! artifact formats (transactions, transaction groups) and which tags a given
//! signing scope accepts. The registry is the security boundary against
//! cross-protocol replay, so it is immutable once built and serializable for
//! review.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Transaction prefix.
pub const TAG_TRANSACTION: &str = "TX";
/// Transaction group prefix.
pub const TAG_TRANSACTION_GROUP: &str = "TG";
/// ARC-60 message signing tag.
pub const TAG_ARC60: &str = "arc60";
/// The "no tag" sentinel.
pub const TAG_EMPTY: &str = "";

/// Declared intent of a signing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Arbitrary message signature (ARC-60 `MSGSIG`).
    #[serde(rename = "msgsig")]
    MessageSignature,
    /// Login challenge signature (ARC-31).
    #[serde(rename = "auth")]
    Authentication,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageSignature => "msgsig",
            Self::Authentication => "auth",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "msgsig" => Ok(Self::MessageSignature),
            "auth" => Ok(Self::Authentication),
            other => bail!("unknown signing scope: {other:?} (expected msgsig or auth)"),
        }
    }
}

/// Serializable domain separation policy.
///
/// ```yaml
/// forbidden: ["TX", "TG"]
/// allowed:
///   msgsig: ["", "arc60"]
/// ```
///
/// A scope without an `allowed` entry accepts any tag that is not forbidden.
/// Omitting `forbidden` keeps `TX` and `TG`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainPolicy {
    #[serde(default = "default_forbidden")]
    pub forbidden: Vec<String>,

    #[serde(default)]
    pub allowed: BTreeMap<Scope, Vec<String>>,
}

fn default_forbidden() -> Vec<String> {
    vec![TAG_TRANSACTION.to_string(), TAG_TRANSACTION_GROUP.to_string()]
}

impl Default for DomainPolicy {
    fn default() -> Self {
        Self {
            forbidden: default_forbidden(),
            allowed: BTreeMap::from([(
                Scope::MessageSignature,
                vec![TAG_EMPTY.to_string(), TAG_ARC60.to_string()],
            )]),
        }
    }
}

impl DomainPolicy {
    /// Reject policies that contradict themselves.
    pub fn validate(&self) -> Result<()> {
        for tag in &self.forbidden {
            if tag.is_empty() {
                bail!("forbidden domain tags must not be empty");
            }
        }
        for (scope, tags) in &self.allowed {
            for tag in tags {
                if self.forbidden.iter().any(|f| f == tag) {
                    bail!("tag {tag:?} is both forbidden and allowed for scope {scope}");
                }
                // "T" would let a body starting with "X" form "TX...".
                let overlaps = |f: &&String| {
                    !tag.is_empty() && (f.starts_with(tag.as_str()) || tag.starts_with(f.as_str()))
                };
                if let Some(f) = self.forbidden.iter().find(overlaps) {
                    bail!("allowed tag {tag:?} for scope {scope} overlaps forbidden tag {f:?}");
                }
            }
        }
        Ok(())
    }
}

/// Immutable, validated registry built from a [`DomainPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRegistry {
    forbidden: BTreeSet<String>,
    allowed: BTreeMap<Scope, BTreeSet<String>>,
}

impl DomainRegistry {
    /// The ARC-60 registry: `TX`/`TG` forbidden, message signatures limited to `""` and `arc60`.
    pub fn standard() -> Self {
        // The default policy is known to be consistent.
        Self::from_parts(&DomainPolicy::default())
    }

    pub fn from_policy(policy: &DomainPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self::from_parts(policy))
    }

    fn from_parts(policy: &DomainPolicy) -> Self {
        Self {
            forbidden: policy.forbidden.iter().cloned().collect(),
            allowed: policy
                .allowed
                .iter()
                .map(|(scope, tags)| (*scope, tags.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Exact match against the reserved tags.
    pub fn is_forbidden(&self, tag: &str) -> bool {
        self.forbidden.contains(tag)
    }

    /// Whether `scope` accepts `tag`. Tags starting with a forbidden tag are
    /// never allowed.
    pub fn is_allowed_for_scope(&self, tag: &str, scope: Scope) -> bool {
        if self.forbidden_prefix(tag.as_bytes()).is_some() {
            return false;
        }
        match self.allowed.get(&scope) {
            Some(tags) => tags.contains(tag),
            None => true,
        }
    }

    /// Whether `scope` restricts tags to an explicit allow-list.
    pub fn requires_allow_list(&self, scope: Scope) -> bool {
        self.allowed.contains_key(&scope)
    }

    /// Returns the forbidden tag the body starts with, if any.
    ///
    /// A body such as `TXsomethingelse` is caught even when its declared tag
    /// is benign.
    pub fn body_prefix_forbidden(&self, body: &[u8]) -> Option<&str> {
        self.forbidden_prefix(body)
    }

    /// Returns the forbidden tag `bytes` starts with, if any.
    ///
    /// Applied to declared tags (`TXfoo`) and to the final signing bytes,
    /// where a short tag and a body can join into a reserved prefix
    /// (`T` + `Xhello`).
    pub fn forbidden_prefix(&self, bytes: &[u8]) -> Option<&str> {
        self.forbidden
            .iter()
            .find(|tag| bytes.starts_with(tag.as_bytes()))
            .map(String::as_str)
    }

    /// Snapshot of the policy for auditing.
    pub fn to_policy(&self) -> DomainPolicy {
        DomainPolicy {
            forbidden: self.forbidden.iter().cloned().collect(),
            allowed: self
                .allowed
                .iter()
                .map(|(scope, tags)| (*scope, tags.iter().cloned().collect()))
                .collect(),
        }
    }
}

impl Default for DomainRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
