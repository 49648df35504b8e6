//! Policy evaluation
//!
//! `decide` is the whole decision engine: a pure function over the policy
//! snapshot, so it needs no locks and tests can table-drive it exhaustively.

use chrono::{DateTime, Utc};

use super::{Decision, PermissionPolicy, TrustLevel};
use crate::tools::PermissionTier;

/// Evaluate the policy for one prospective tool invocation.
pub fn decide(
    policy: &PermissionPolicy,
    tool_name: &str,
    tier: PermissionTier,
    site: &str,
) -> Decision {
    decide_at(policy, tool_name, tier, site, Utc::now())
}

/// Like [`decide`] with an explicit clock, for expiry tests.
///
/// First matching rule wins:
/// 1. a disabled tool override denies unconditionally
/// 2. a `global_auto_approve` override approves unconditionally
/// 3. an unexpired site trust record: blocked denies; the explicit
///    per-tool lists answer next; otherwise trust strictly above the
///    tool's tier approves
/// 4. the default stance for the tier, `Ask` when none is configured
pub fn decide_at(
    policy: &PermissionPolicy,
    tool_name: &str,
    tier: PermissionTier,
    site: &str,
    now: DateTime<Utc>,
) -> Decision {
    if let Some(ov) = policy.tool_overrides.get(tool_name) {
        if !ov.enabled {
            return Decision::Deny;
        }
        if ov.global_auto_approve {
            return Decision::AutoApprove;
        }
    }

    if let Some(trust) = policy.trusted_sites.get(site) {
        if !trust.is_expired(now) {
            if trust.trust_level == TrustLevel::Blocked {
                return Decision::Deny;
            }
            if trust.auto_approve.iter().any(|n| n == tool_name) {
                return Decision::AutoApprove;
            }
            if trust.require_confirm.iter().any(|n| n == tool_name) {
                return Decision::Ask;
            }
            if trust.trust_level.rank() > tier.rank() {
                return Decision::AutoApprove;
            }
        }
    }

    policy
        .defaults
        .get(&tier)
        .copied()
        .unwrap_or(Decision::Ask)
}
