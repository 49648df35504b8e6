//! Agent loop orchestrator
//!
//! One `run` call drives the whole conversation turn: ask the model, pull
//! tool invocations out of the reply, decide each one against policy,
//! execute what was approved, feed results back, repeat. Strictly
//! sequential within a turn because a navigation changes the site the next
//! permission check must see.
//!
//! Every terminal path yields a string: the model's answer, the fixed
//! no-response notice, or the fixed iteration-ceiling notice. Only a
//! transport failure propagates as an error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::audit::{ActionLogEntry, AuditSink, Outcome};
use crate::browser::Browser;
use crate::exec::ToolExecutor;
use crate::extract::{Extractor, RawModelTurn, ToolInvocation};
use crate::llm::{ChatTransport, Message, TransportError};
use crate::permission::{request_with_timeout, GateReply, PermissionGate, PromptRequest};
use crate::policy::{Decision, PolicyStore, TrustLevel};
use crate::tools::{PermissionTier, ToolRegistry};

/// Sole circuit breaker for a model oscillating between tool calls
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

pub const NO_RESPONSE_MESSAGE: &str = "The model returned no response.";
pub const MAX_ITERATIONS_MESSAGE: &str =
    "Reached the maximum number of tool iterations without a final answer.";
pub const CANCELLED_MESSAGE: &str = "The request was cancelled.";

/// Knobs for one loop instance
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    pub max_iterations: usize,
    /// How long the human gate may stay open before a prompt reads as deny
    pub permission_timeout: Duration,
    /// Lifetime of an "approve for this session" trust grant
    pub session_ttl: chrono::Duration,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            permission_timeout: Duration::from_secs(30),
            session_ttl: chrono::Duration::hours(12),
        }
    }
}

impl AgentLoopConfig {
    pub fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn permission_timeout(mut self, window: Duration) -> Self {
        self.permission_timeout = window;
        self
    }
}

/// Cooperative cancellation flag, checked between iterations only; an
/// in-flight model request or tool execution runs to completion.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

pub struct AgentLoop {
    transport: Arc<dyn ChatTransport>,
    browser: Arc<dyn Browser>,
    executor: ToolExecutor,
    extractor: Extractor,
    store: Arc<PolicyStore>,
    gate: Arc<dyn PermissionGate>,
    audit: Arc<dyn AuditSink>,
    config: AgentLoopConfig,
    cancel: CancelToken,
}

impl AgentLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        browser: Arc<dyn Browser>,
        registry: ToolRegistry,
        store: Arc<PolicyStore>,
        gate: Arc<dyn PermissionGate>,
        audit: Arc<dyn AuditSink>,
        config: AgentLoopConfig,
    ) -> Self {
        let extractor = Extractor::new(registry.names().map(str::to_owned).collect::<Vec<_>>());
        Self {
            transport,
            browser,
            executor: ToolExecutor::new(registry),
            extractor,
            store,
            gate,
            audit,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Token for cancelling this loop from another task
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Drive one user request to a final answer.
    ///
    /// The conversation is owned by the caller and mutated in place; on
    /// return it carries the full transcript of the run, tool turns
    /// included, ready for the next `run` call.
    pub async fn run(
        &self,
        conversation: &mut Vec<Message>,
        user_input: &str,
    ) -> anyhow::Result<String> {
        conversation.push(Message::user(user_input));
        let mut schemas_enabled = true;

        for iteration in 0..self.config.max_iterations {
            if self.cancel.is_cancelled() {
                info!(iteration, "run cancelled");
                return Ok(CANCELLED_MESSAGE.to_string());
            }

            let response = match self.request(conversation, schemas_enabled).await {
                Ok(response) => response,
                Err(TransportError::ToolSchemaRejected) if schemas_enabled => {
                    // Provider without function calling; fall back to the
                    // tag format for the rest of the run
                    warn!("falling back to schema-less requests");
                    schemas_enabled = false;
                    self.request(conversation, false).await?
                }
                Err(err) => return Err(err.into()),
            };

            match RawModelTurn::from_response(&response) {
                RawModelTurn::StructuredCalls(calls) => {
                    debug!(iteration, calls = calls.len(), "structured tool calls");
                    let content = response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone());
                    conversation.push(Message::assistant_with_calls(content, calls.clone()));

                    for invocation in ToolInvocation::from_structured(&calls) {
                        let result = self.run_invocation(&invocation).await;
                        conversation
                            .push(Message::tool_result(invocation.id.clone(), result.to_string()));
                    }
                }
                RawModelTurn::FreeText(text) => {
                    if text.trim().is_empty() {
                        return Ok(NO_RESPONSE_MESSAGE.to_string());
                    }

                    let invocations = self.extractor.extract(&text);
                    if invocations.is_empty() {
                        return Ok(text);
                    }

                    debug!(iteration, calls = invocations.len(), "tag tool calls");
                    conversation.push(Message::assistant(text));

                    // Models on this path cannot consume tool-role turns,
                    // so all results travel in one synthetic user turn
                    let mut summaries = Vec::with_capacity(invocations.len());
                    for invocation in invocations {
                        let result = self.run_invocation(&invocation).await;
                        summaries.push(format!("Result of {}: {}", invocation.name, result));
                    }
                    conversation.push(Message::user(summaries.join("\n")));
                }
            }
        }

        info!(
            max_iterations = self.config.max_iterations,
            "iteration ceiling reached"
        );
        Ok(MAX_ITERATIONS_MESSAGE.to_string())
    }

    async fn request(
        &self,
        conversation: &[Message],
        schemas_enabled: bool,
    ) -> Result<crate::llm::ChatResponse, TransportError> {
        let schemas = if schemas_enabled {
            self.executor.registry().schemas()
        } else {
            Vec::new()
        };
        self.transport.chat(conversation, &schemas).await
    }

    /// Decide and (maybe) execute one invocation. Always returns a result
    /// value for the model; denials and failures are results, not errors.
    async fn run_invocation(&self, invocation: &ToolInvocation) -> Value {
        // Refreshed per invocation: an earlier navigate in this same turn
        // must change the site this decision is made against
        let ctx = match self.browser.context().await {
            Ok(ctx) => ctx,
            Err(err) => {
                warn!(error = %err, "page context unavailable");
                return json!({ "error": format!("page context unavailable: {err}") });
            }
        };

        let Some(tool) = self.executor.registry().get(&invocation.name) else {
            return self
                .executor
                .execute(&invocation.name, &invocation.arguments, &ctx)
                .await;
        };
        let tier = tool.tier();

        let decision = self.store.decide(&invocation.name, tier, &ctx.site);
        let approved = match decision {
            Decision::AutoApprove => true,
            Decision::Deny => false,
            Decision::Ask => {
                let request = PromptRequest {
                    tool: invocation.name.clone(),
                    args: invocation.arguments.clone(),
                    site: ctx.site.clone(),
                    tier,
                };
                match request_with_timeout(
                    self.gate.as_ref(),
                    request,
                    self.config.permission_timeout,
                )
                .await
                {
                    GateReply::Approve => true,
                    GateReply::ApproveForSite => {
                        self.store.allow_tool_for_site(&ctx.site, &invocation.name);
                        true
                    }
                    GateReply::ApproveForSession => {
                        self.store.grant_session(
                            &ctx.site,
                            covering_trust(tier),
                            self.config.session_ttl,
                        );
                        true
                    }
                    GateReply::Deny => false,
                }
            }
        };

        if !approved {
            self.audit.log(ActionLogEntry::new(
                &invocation.name,
                Value::Object(invocation.arguments.clone()),
                &ctx.site,
                tier,
                decision,
                Outcome::Denied,
            ));
            return json!({ "error": format!("permission denied for {}", invocation.name) });
        }

        let result = self
            .executor
            .execute(&invocation.name, &invocation.arguments, &ctx)
            .await;

        let outcome = if result.get("error").is_some() {
            Outcome::Error
        } else {
            Outcome::Ok
        };
        self.audit.log(ActionLogEntry::new(
            &invocation.name,
            Value::Object(invocation.arguments.clone()),
            &ctx.site,
            tier,
            decision,
            outcome,
        ));
        result
    }
}

/// Smallest trust level whose rank strictly exceeds the tier's, so a
/// session grant covers the tool it was granted for. Submit has no level
/// above it; a session grant approves the current submit but future
/// submits still prompt.
fn covering_trust(tier: PermissionTier) -> TrustLevel {
    match tier {
        PermissionTier::ReadOnly => TrustLevel::Navigate,
        PermissionTier::Navigate => TrustLevel::Interact,
        PermissionTier::Interact | PermissionTier::Submit => TrustLevel::Full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::browser::testing::StubBrowser;
    use crate::llm::{ChatResponse, Choice, ResponseMessage, StructuredCall, ToolSchema};
    use crate::permission::testing::ScriptedGate;
    use crate::policy::{PermissionPolicy, SiteTrust};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: Some(text.to_string()),
                    tool_calls: None,
                },
                finish_reason: Some("stop".into()),
            }],
        }
    }

    fn call_response(name: &str, arguments: &str) -> ChatResponse {
        ChatResponse {
            choices: vec![Choice {
                message: ResponseMessage {
                    content: None,
                    tool_calls: Some(vec![StructuredCall::new("call_1", name, arguments)]),
                },
                finish_reason: Some("tool_calls".into()),
            }],
        }
    }

    /// Transport scripted with canned responses; repeats the last one when
    /// the script runs out. Records how many tools each request carried.
    struct ScriptedTransport {
        script: Mutex<Vec<Result<ChatResponse, TransportError>>>,
        last: Mutex<Option<ChatResponse>>,
        pub requests: AtomicUsize,
        pub tools_per_request: Mutex<Vec<usize>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<ChatResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().rev().collect()),
                last: Mutex::new(None),
                requests: AtomicUsize::new(0),
                tools_per_request: Mutex::new(Vec::new()),
            }
        }

        fn repeating(response: ChatResponse) -> Self {
            let t = Self::new(vec![]);
            *t.last.lock().unwrap() = Some(response);
            t
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn chat(
            &self,
            _messages: &[Message],
            tools: &[ToolSchema],
        ) -> Result<ChatResponse, TransportError> {
            self.requests.fetch_add(1, Ordering::Relaxed);
            self.tools_per_request.lock().unwrap().push(tools.len());
            if let Some(next) = self.script.lock().unwrap().pop() {
                if let Ok(response) = &next {
                    *self.last.lock().unwrap() = Some(response.clone());
                }
                return next;
            }
            self.last
                .lock()
                .unwrap()
                .clone()
                .ok_or(TransportError::InvalidResponse("script exhausted".into()))
        }
    }

    struct Harness {
        transport: Arc<ScriptedTransport>,
        browser: Arc<StubBrowser>,
        gate: Arc<ScriptedGate>,
        audit: Arc<MemoryAuditSink>,
        agent: AgentLoop,
    }

    fn harness(
        transport: ScriptedTransport,
        gate: ScriptedGate,
        policy: PermissionPolicy,
    ) -> Harness {
        let transport = Arc::new(transport);
        let browser = Arc::new(StubBrowser::at("https://shop.example.com/cart"));
        let gate = Arc::new(gate);
        let audit = Arc::new(MemoryAuditSink::new(64));
        let agent = AgentLoop::new(
            transport.clone(),
            browser.clone(),
            ToolRegistry::standard(browser.clone()),
            Arc::new(PolicyStore::in_memory(policy)),
            gate.clone(),
            audit.clone(),
            AgentLoopConfig::default().permission_timeout(Duration::from_secs(30)),
        );
        Harness {
            transport,
            browser,
            gate,
            audit,
            agent,
        }
    }

    #[tokio::test]
    async fn plain_text_terminates_after_one_iteration() {
        let h = harness(
            ScriptedTransport::repeating(text_response("The cart has 3 items.")),
            ScriptedGate::replying([]),
            PermissionPolicy::default(),
        );
        let mut conversation = vec![Message::system("You are a browser assistant.")];
        let answer = h.agent.run(&mut conversation, "what's in my cart?").await.unwrap();

        assert_eq!(answer, "The cart has 3 items.");
        assert_eq!(h.transport.requests.load(Ordering::Relaxed), 1);
        // system + user only; the final answer is returned, not appended
        assert_eq!(conversation.len(), 2);
    }

    #[tokio::test]
    async fn endless_tool_calls_stop_at_the_ceiling() {
        let h = harness(
            ScriptedTransport::repeating(call_response("read_page", "{}")),
            ScriptedGate::replying([]),
            PermissionPolicy::default(),
        );
        let mut conversation = Vec::new();
        let answer = h.agent.run(&mut conversation, "keep reading").await.unwrap();

        assert_eq!(answer, MAX_ITERATIONS_MESSAGE);
        assert_eq!(
            h.transport.requests.load(Ordering::Relaxed),
            DEFAULT_MAX_ITERATIONS
        );
        assert_eq!(h.browser.recorded().len(), DEFAULT_MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn empty_response_yields_the_fixed_notice() {
        let h = harness(
            ScriptedTransport::repeating(ChatResponse { choices: vec![] }),
            ScriptedGate::replying([]),
            PermissionPolicy::default(),
        );
        let answer = h.agent.run(&mut Vec::new(), "hello").await.unwrap();
        assert_eq!(answer, NO_RESPONSE_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_timeout_denies_and_audits() {
        let h = harness(
            ScriptedTransport::new(vec![
                Ok(call_response("click", r##"{"selector": "#buy"}"##)),
                Ok(text_response("I could not click that.")),
            ]),
            ScriptedGate::silent(),
            PermissionPolicy::default(),
        );
        let answer = h.agent.run(&mut Vec::new(), "buy it").await.unwrap();

        assert_eq!(answer, "I could not click that.");
        assert_eq!(h.gate.prompts_seen(), 1);
        // never executed
        assert!(h.browser.recorded().is_empty());

        let entries = h.audit.recent();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, Outcome::Denied);
        assert_eq!(entries[0].decision, Decision::Ask);
        assert_eq!(entries[0].site, "shop.example.com");
    }

    #[tokio::test]
    async fn full_trust_skips_the_prompt() {
        let policy = PermissionPolicy::default()
            .with_site("shop.example.com", SiteTrust::level(TrustLevel::Full));
        let h = harness(
            ScriptedTransport::new(vec![
                Ok(call_response("click", r##"{"selector": "#buy"}"##)),
                Ok(text_response("Clicked.")),
            ]),
            ScriptedGate::replying([]),
            policy,
        );
        let answer = h.agent.run(&mut Vec::new(), "click buy").await.unwrap();

        assert_eq!(answer, "Clicked.");
        assert_eq!(h.gate.prompts_seen(), 0);
        assert_eq!(h.browser.recorded(), vec!["click #buy".to_string()]);
        assert_eq!(h.audit.recent()[0].outcome, Outcome::Ok);
        assert_eq!(h.audit.recent()[0].decision, Decision::AutoApprove);
    }

    #[tokio::test]
    async fn tag_fallback_executes_and_feeds_back_a_user_turn() {
        let h = harness(
            ScriptedTransport::new(vec![
                Ok(text_response(r#"Looking now. <search_web query="shoes"/>"#)),
                Ok(text_response("Found three stores.")),
            ]),
            ScriptedGate::replying([GateReply::Approve]),
            PermissionPolicy::default(),
        );
        let mut conversation = Vec::new();
        let answer = h.agent.run(&mut conversation, "find shoes").await.unwrap();

        assert_eq!(answer, "Found three stores.");
        assert_eq!(h.browser.recorded(), vec!["search shoes".to_string()]);

        // user, raw assistant text, synthetic user result turn
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation[1].role, crate::llm::Role::Assistant);
        assert_eq!(conversation[2].role, crate::llm::Role::User);
        let feedback = conversation[2].content.as_deref().unwrap();
        assert!(feedback.starts_with("Result of search_web:"));
    }

    #[tokio::test]
    async fn schema_rejection_retries_without_tools() {
        let h = harness(
            ScriptedTransport::new(vec![
                Err(TransportError::ToolSchemaRejected),
                Ok(text_response("Hi there.")),
            ]),
            ScriptedGate::replying([]),
            PermissionPolicy::default(),
        );
        let answer = h.agent.run(&mut Vec::new(), "hi").await.unwrap();

        assert_eq!(answer, "Hi there.");
        let tools = h.transport.tools_per_request.lock().unwrap().clone();
        assert_eq!(tools[0], 9);
        assert_eq!(tools[1], 0);
    }

    #[tokio::test]
    async fn approve_for_site_records_a_grant() {
        let h = harness(
            ScriptedTransport::new(vec![
                Ok(call_response("click", r##"{"selector": "#buy"}"##)),
                Ok(call_response("click", r##"{"selector": "#buy"}"##)),
                Ok(text_response("Done.")),
            ]),
            ScriptedGate::replying([GateReply::ApproveForSite]),
            PermissionPolicy::default(),
        );
        let answer = h.agent.run(&mut Vec::new(), "click twice").await.unwrap();

        assert_eq!(answer, "Done.");
        // second click auto-approves off the recorded grant
        assert_eq!(h.gate.prompts_seen(), 1);
        assert_eq!(h.browser.recorded().len(), 2);
    }

    #[tokio::test]
    async fn unknown_structured_tool_feeds_back_an_error_result() {
        let h = harness(
            ScriptedTransport::new(vec![
                Ok(call_response("teleport", "{}")),
                Ok(text_response("That tool does not exist.")),
            ]),
            ScriptedGate::replying([]),
            PermissionPolicy::default(),
        );
        let mut conversation = Vec::new();
        let answer = h.agent.run(&mut conversation, "teleport").await.unwrap();

        assert_eq!(answer, "That tool does not exist.");
        let tool_turn = conversation
            .iter()
            .find(|m| m.role == crate::llm::Role::Tool)
            .unwrap();
        assert!(tool_turn.content.as_deref().unwrap().contains("unknown tool"));
        // no tier to attribute, so no audit entry
        assert!(h.audit.recent().is_empty());
    }

    #[tokio::test]
    async fn cancellation_short_circuits_before_the_first_request() {
        let h = harness(
            ScriptedTransport::repeating(text_response("unused")),
            ScriptedGate::replying([]),
            PermissionPolicy::default(),
        );
        h.agent.cancel_token().cancel();
        let answer = h.agent.run(&mut Vec::new(), "anything").await.unwrap();

        assert_eq!(answer, CANCELLED_MESSAGE);
        assert_eq!(h.transport.requests.load(Ordering::Relaxed), 0);
    }
}
