//! Action audit trail
//!
//! Every decided invocation produces one immutable [`ActionLogEntry`],
//! approved or not. Sinks are fire-and-forget: logging never blocks and
//! never fails the loop.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::policy::Decision;
use crate::tools::PermissionTier;

/// How an approved invocation ended up, or that it never ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Error,
    Denied,
}

/// One decided tool invocation
#[derive(Debug, Clone, Serialize)]
pub struct ActionLogEntry {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub tool: String,
    pub args: Value,
    pub site: String,
    pub tier: PermissionTier,
    pub decision: Decision,
    pub outcome: Outcome,
}

impl ActionLogEntry {
    pub fn new(
        tool: impl Into<String>,
        args: Value,
        site: impl Into<String>,
        tier: PermissionTier,
        decision: Decision,
        outcome: Outcome,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            at: Utc::now(),
            tool: tool.into(),
            args,
            site: site.into(),
            tier,
            decision,
            outcome,
        }
    }
}

/// Audit destination. Infallible by contract; a sink that hits trouble
/// swallows it rather than surfacing an error into the loop.
pub trait AuditSink: Send + Sync {
    fn log(&self, entry: ActionLogEntry);
}

/// Bounded in-memory ring of recent entries, oldest evicted first
pub struct MemoryAuditSink {
    capacity: usize,
    entries: Mutex<VecDeque<ActionLogEntry>>,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Most recent entries, newest last
    pub fn recent(&self) -> Vec<ActionLogEntry> {
        self.entries
            .lock()
            .expect("audit lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log(&self, entry: ActionLogEntry) {
        let mut entries = self.entries.lock().expect("audit lock poisoned");
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }
}

/// Sink that drops everything, for callers that opt out of auditing
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn log(&self, _entry: ActionLogEntry) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(tool: &str) -> ActionLogEntry {
        ActionLogEntry::new(
            tool,
            json!({"selector": "#buy"}),
            "shop.example.com",
            PermissionTier::Interact,
            Decision::Ask,
            Outcome::Ok,
        )
    }

    #[test]
    fn ring_evicts_oldest_past_capacity() {
        let sink = MemoryAuditSink::new(2);
        sink.log(entry("first"));
        sink.log(entry("second"));
        sink.log(entry("third"));

        let recent = sink.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].tool, "second");
        assert_eq!(recent[1].tool, "third");
    }

    #[test]
    fn entries_serialize_with_snake_case_fields() {
        let json = serde_json::to_value(entry("click")).unwrap();
        assert_eq!(json["tool"], "click");
        assert_eq!(json["tier"], "interact");
        assert_eq!(json["decision"], "ask");
        assert_eq!(json["outcome"], "ok");
    }
}
