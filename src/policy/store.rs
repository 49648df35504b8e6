//! Policy storage
//!
//! The store wraps the policy document in a read-mostly lock: every
//! decision takes a read lock, only explicit user grants take the write
//! lock and push the new document through the persistence collaborator.

use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::{debug, warn};

use super::{engine, Decision, PermissionPolicy, SiteTrust, ToolOverride, TrustLevel};
use crate::tools::PermissionTier;

/// Durable storage seam for the policy document
pub trait PolicyPersistence: Send + Sync {
    /// `Ok(None)` means no document exists yet
    fn load(&self) -> Result<Option<PermissionPolicy>>;
    fn save(&self, policy: &PermissionPolicy) -> Result<()>;
}

/// Pretty-printed JSON file under the user's config directory
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location (~/.config/tabpilot/policy.json)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|p| p.join(".config").join("tabpilot").join("policy.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicyPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Option<PermissionPolicy>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read policy file: {}", self.path.display()))?;
        let policy = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse policy file: {}", self.path.display()))?;
        Ok(Some(policy))
    }

    fn save(&self, policy: &PermissionPolicy) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(policy)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write policy file: {}", self.path.display()))?;
        Ok(())
    }
}

/// Shared, mutable view of the current policy
pub struct PolicyStore {
    policy: RwLock<PermissionPolicy>,
    persistence: Option<Arc<dyn PolicyPersistence>>,
}

impl PolicyStore {
    /// Load from persistence, falling back to the default document when
    /// nothing is stored yet. A corrupt document is an error rather than a
    /// silent reset so a typo in a hand-edited file cannot widen access.
    pub fn open(persistence: Arc<dyn PolicyPersistence>) -> Result<Self> {
        let policy = persistence.load()?.unwrap_or_default();
        Ok(Self {
            policy: RwLock::new(policy),
            persistence: Some(persistence),
        })
    }

    /// In-memory store with no persistence, for tests and ephemeral runs
    pub fn in_memory(policy: PermissionPolicy) -> Self {
        Self {
            policy: RwLock::new(policy),
            persistence: None,
        }
    }

    pub fn snapshot(&self) -> PermissionPolicy {
        self.policy.read().expect("policy lock poisoned").clone()
    }

    /// Evaluate the current policy for one prospective invocation
    pub fn decide(&self, tool_name: &str, tier: PermissionTier, site: &str) -> Decision {
        let policy = self.policy.read().expect("policy lock poisoned");
        engine::decide(&policy, tool_name, tier, site)
    }

    /// Record a standing "always allow this much on this site" grant.
    ///
    /// Merges into any live record: the level is set to the user's choice
    /// and the record becomes permanent, but explicit per-tool lists from
    /// earlier grants are kept.
    pub fn grant_site(&self, site: &str, level: TrustLevel) {
        self.mutate(|policy| {
            let trust = live_entry(policy, site);
            trust.trust_level = level;
            trust.expires_at = None;
        });
        debug!(site, ?level, "recorded site trust grant");
    }

    /// Record a grant that lapses after `ttl`.
    ///
    /// A session grant must never narrow what the user already granted
    /// permanently: on a live record it only raises the trust level, keeps
    /// the explicit lists, and leaves a non-expiring record non-expiring.
    /// An existing session window is extended, never shortened.
    pub fn grant_session(&self, site: &str, level: TrustLevel, ttl: Duration) {
        let now = Utc::now();
        let expires = now + ttl;
        self.mutate(|policy| {
            match policy.trusted_sites.entry(site.to_string()) {
                Entry::Occupied(mut entry) => {
                    let trust = entry.get_mut();
                    if trust.is_expired(now) {
                        *trust = SiteTrust::expiring(level, expires);
                    } else {
                        if level.rank() > trust.trust_level.rank() {
                            trust.trust_level = level;
                        }
                        trust.expires_at = trust.expires_at.map(|prev| prev.max(expires));
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(SiteTrust::expiring(level, expires));
                }
            }
        });
        debug!(site, ?level, "recorded session trust grant");
    }

    /// Add one tool to a site's explicit auto-approve list.
    ///
    /// The grant is standing, so the record must outlive any session
    /// window it carries. The expiry is cleared; a session-scoped trust
    /// level is not carried into the now-permanent record.
    pub fn allow_tool_for_site(&self, site: &str, tool: &str) {
        self.mutate(|policy| {
            let trust = live_entry(policy, site);
            if trust.expires_at.take().is_some() {
                trust.trust_level = TrustLevel::ReadOnly;
            }
            if !trust.auto_approve.iter().any(|n| n == tool) {
                trust.auto_approve.push(tool.to_string());
            }
        });
        debug!(site, tool, "recorded per-tool site grant");
    }

    pub fn set_tool_override(&self, tool: &str, ov: ToolOverride) {
        self.mutate(|policy| {
            policy.tool_overrides.insert(tool.to_string(), ov);
        });
    }

    fn mutate(&self, apply: impl FnOnce(&mut PermissionPolicy)) {
        let snapshot = {
            let mut policy = self.policy.write().expect("policy lock poisoned");
            apply(&mut policy);
            policy.clone()
        };
        // Persistence failure must not unwind a grant the user already made
        if let Some(persistence) = &self.persistence {
            if let Err(err) = persistence.save(&snapshot) {
                warn!(error = %err, "failed to persist policy update");
            }
        }
    }
}

/// Site record to merge a grant into. An expired record reads as absent
/// everywhere else, so it is reset here too; stale session state must never
/// leak into a new grant.
fn live_entry<'a>(policy: &'a mut PermissionPolicy, site: &str) -> &'a mut SiteTrust {
    let now = Utc::now();
    let trust = policy
        .trusted_sites
        .entry(site.to_string())
        .or_insert_with(|| SiteTrust::level(TrustLevel::ReadOnly));
    if trust.is_expired(now) {
        *trust = SiteTrust::level(TrustLevel::ReadOnly);
    }
    trust
}
