//! Human permission gate
//!
//! When the decision engine answers `Ask`, the loop suspends on whatever
//! surface the host wires in (popup, notification, test script) and waits
//! for a reply within a fixed window. No reply means deny; the gate is the
//! one place the system is allowed to block on a human and it always fails
//! closed.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Map;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::tools::PermissionTier;

/// What the user sees when asked to approve one invocation
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub tool: String,
    pub args: Map<String, serde_json::Value>,
    pub site: String,
    pub tier: PermissionTier,
}

/// The user's answer. The grant variants widen the policy before the
/// invocation runs, so the next identical call skips the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReply {
    Approve,
    /// Approve and record a standing per-tool grant for this site
    ApproveForSite,
    /// Approve and trust this site until the session grant expires
    ApproveForSession,
    Deny,
}

/// Prompt surface implemented by the host
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Present the request and wait for the user's answer. Implementations
    /// may wait indefinitely; the timeout lives in [`request_with_timeout`].
    async fn request(&self, req: PromptRequest) -> GateReply;
}

/// Ask the gate, bounding the wait. An elapsed window is a deny, treated
/// identically to the user pressing the deny button.
pub async fn request_with_timeout(
    gate: &dyn PermissionGate,
    req: PromptRequest,
    window: Duration,
) -> GateReply {
    let tool = req.tool.clone();
    match tokio::time::timeout(window, gate.request(req)).await {
        Ok(reply) => reply,
        Err(_) => {
            warn!(tool, window_secs = window.as_secs(), "permission prompt timed out");
            GateReply::Deny
        }
    }
}

/// Gate backed by an mpsc channel of pending prompts.
///
/// Each prompt travels with a oneshot responder; whoever consumes the
/// channel shows the request and sends the reply back. A dropped responder
/// or a closed channel reads as deny.
pub struct ChannelGate {
    prompts: mpsc::Sender<(PromptRequest, oneshot::Sender<GateReply>)>,
}

impl ChannelGate {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<(PromptRequest, oneshot::Sender<GateReply>)>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { prompts: tx }, rx)
    }
}

#[async_trait]
impl PermissionGate for ChannelGate {
    async fn request(&self, req: PromptRequest) -> GateReply {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.prompts.send((req, reply_tx)).await.is_err() {
            warn!("prompt channel closed, denying");
            return GateReply::Deny;
        }
        reply_rx.await.unwrap_or(GateReply::Deny)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Gate scripted with a fixed sequence of replies; records what it saw
    pub struct ScriptedGate {
        replies: Mutex<Vec<GateReply>>,
        pub seen: Mutex<Vec<PromptRequest>>,
        /// When set, sleep this long before answering (for timeout tests)
        pub delay: Option<Duration>,
    }

    impl ScriptedGate {
        pub fn replying(replies: impl IntoIterator<Item = GateReply>) -> Self {
            // Stored reversed so pop() hands them out in script order
            let mut replies: Vec<GateReply> = replies.into_iter().collect();
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        pub fn silent() -> Self {
            Self {
                replies: Mutex::new(Vec::new()),
                seen: Mutex::new(Vec::new()),
                delay: Some(Duration::from_secs(3600)),
            }
        }

        pub fn prompts_seen(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PermissionGate for ScriptedGate {
        async fn request(&self, req: PromptRequest) -> GateReply {
            self.seen.lock().unwrap().push(req);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.replies.lock().unwrap().pop().unwrap_or(GateReply::Deny)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedGate;
    use super::*;

    fn prompt(tool: &str) -> PromptRequest {
        PromptRequest {
            tool: tool.into(),
            args: Map::new(),
            site: "example.com".into(),
            tier: PermissionTier::Interact,
        }
    }

    #[tokio::test]
    async fn replies_pass_through_within_the_window() {
        let gate = ScriptedGate::replying([GateReply::ApproveForSite]);
        let reply =
            request_with_timeout(&gate, prompt("click"), Duration::from_secs(5)).await;
        assert_eq!(reply, GateReply::ApproveForSite);
    }

    #[tokio::test(start_paused = true)]
    async fn silence_becomes_deny() {
        let gate = ScriptedGate::silent();
        let reply =
            request_with_timeout(&gate, prompt("click"), Duration::from_secs(30)).await;
        assert_eq!(reply, GateReply::Deny);
        assert_eq!(gate.prompts_seen(), 1);
    }

    #[tokio::test]
    async fn channel_gate_round_trips_a_reply() {
        let (gate, mut prompts) = ChannelGate::new(4);
        let ui = tokio::spawn(async move {
            let (req, responder) = prompts.recv().await.unwrap();
            assert_eq!(req.tool, "click");
            responder.send(GateReply::Approve).unwrap();
        });
        let reply = gate.request(prompt("click")).await;
        assert_eq!(reply, GateReply::Approve);
        ui.await.unwrap();
    }

    #[tokio::test]
    async fn closed_channel_denies() {
        let (gate, prompts) = ChannelGate::new(1);
        drop(prompts);
        assert_eq!(gate.request(prompt("click")).await, GateReply::Deny);
    }
}
