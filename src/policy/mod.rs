//! Permission policy model
//!
//! A [`PermissionPolicy`] is the user's standing answer to "may the agent do
//! this without asking": per-site trust records, per-tool overrides, and a
//! default stance per permission tier. Evaluation lives in [`engine`] as a
//! pure function; storage and mutation live in [`store`].

pub mod engine;
mod store;

pub use engine::{decide, decide_at};
pub use store::{JsonFilePersistence, PolicyPersistence, PolicyStore};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tools::PermissionTier;

/// Per-site trust classification granted by the user.
///
/// Broader than [`PermissionTier`] by one level on each end: `Blocked`
/// denies everything and `Full` sits above the highest tool tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Blocked,
    ReadOnly,
    Navigate,
    Interact,
    Full,
}

impl TrustLevel {
    /// Rank on the shared trust/tier scale. A site auto-approves a tool
    /// when its trust rank strictly exceeds the tool's tier rank, so
    /// `Interact` trust covers interact-tier tools but not submit.
    pub fn rank(self) -> u8 {
        match self {
            TrustLevel::Blocked => 0,
            TrustLevel::ReadOnly => 1,
            TrustLevel::Navigate => 2,
            TrustLevel::Interact => 3,
            TrustLevel::Full => 4,
        }
    }
}

/// Three-way outcome of policy evaluation. Never persisted; derived fresh
/// for every invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AutoApprove,
    Ask,
    Deny,
}

// Hand-rolled so a stance string this build does not recognize reads as
// `Ask`: fail toward asking, never toward silent approval.
impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "auto_approve" => Decision::AutoApprove,
            "deny" => Decision::Deny,
            _ => Decision::Ask,
        })
    }
}

/// Trust record for one site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteTrust {
    pub trust_level: TrustLevel,
    /// Tools approved by name regardless of tier
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_approve: Vec<String>,
    /// Tools that always prompt, even under a covering trust level
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require_confirm: Vec<String>,
    /// Session grants expire; an expired record reads as absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SiteTrust {
    pub fn level(trust_level: TrustLevel) -> Self {
        Self {
            trust_level,
            auto_approve: Vec::new(),
            require_confirm: Vec::new(),
            expires_at: None,
        }
    }

    pub fn expiring(trust_level: TrustLevel, expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..Self::level(trust_level)
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Per-tool kill switch and global allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOverride {
    /// `false` denies the tool everywhere, overriding site trust
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    #[serde(default)]
    pub global_auto_approve: bool,
}

fn enabled_default() -> bool {
    true
}

impl Default for ToolOverride {
    fn default() -> Self {
        Self {
            enabled: true,
            global_auto_approve: false,
        }
    }
}

/// The whole persisted policy document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionPolicy {
    #[serde(default)]
    pub trusted_sites: HashMap<String, SiteTrust>,
    #[serde(default)]
    pub tool_overrides: HashMap<String, ToolOverride>,
    #[serde(default = "default_stances")]
    pub defaults: HashMap<PermissionTier, Decision>,
}

fn default_stances() -> HashMap<PermissionTier, Decision> {
    HashMap::from([
        (PermissionTier::ReadOnly, Decision::AutoApprove),
        (PermissionTier::Navigate, Decision::Ask),
        (PermissionTier::Interact, Decision::Ask),
        (PermissionTier::Submit, Decision::Ask),
    ])
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self {
            trusted_sites: HashMap::new(),
            tool_overrides: HashMap::new(),
            defaults: default_stances(),
        }
    }
}

impl PermissionPolicy {
    pub fn with_site(mut self, site: impl Into<String>, trust: SiteTrust) -> Self {
        self.trusted_sites.insert(site.into(), trust);
        self
    }

    pub fn with_override(mut self, tool: impl Into<String>, ov: ToolOverride) -> Self {
        self.tool_overrides.insert(tool.into(), ov);
        self
    }

    pub fn with_default(mut self, tier: PermissionTier, stance: Decision) -> Self {
        self.defaults.insert(tier, stance);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn unknown_stance_string_reads_as_ask() {
        let decision: Decision = serde_json::from_str("\"allow_once\"").unwrap();
        assert_eq!(decision, Decision::Ask);
    }

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let trust = SiteTrust::expiring(TrustLevel::Full, at);
        assert!(!trust.is_expired(at - chrono::Duration::seconds(1)));
        assert!(trust.is_expired(at));
    }

    #[test]
    fn policy_survives_a_json_round_trip() {
        let policy = PermissionPolicy::default()
            .with_site("example.com", SiteTrust::level(TrustLevel::Interact))
            .with_override(
                "submit_form",
                ToolOverride {
                    enabled: false,
                    global_auto_approve: false,
                },
            );
        let json = serde_json::to_string(&policy).unwrap();
        let back: PermissionPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn missing_fields_fill_in_defaults() {
        let policy: PermissionPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(
            policy.defaults.get(&PermissionTier::ReadOnly),
            Some(&Decision::AutoApprove)
        );
        let ov: ToolOverride = serde_json::from_str("{}").unwrap();
        assert!(ov.enabled);
        assert!(!ov.global_auto_approve);
    }
}
