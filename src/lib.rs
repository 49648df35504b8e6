//! Tabpilot - a tool-calling agent core for browser automation
//!
//! The crate drives one conversation turn end to end: ask the model, pull
//! tool invocations out of the reply (structured calls or inline tags),
//! check each against the user's permission policy, prompt when the policy
//! says ask, execute what was approved, and feed results back until the
//! model answers in plain text.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabpilot::{
//!     AgentLoop, Config, HttpTransport, MemoryAuditSink, Message, PermissionPolicy,
//!     PolicyStore, ToolRegistry,
//! };
//!
//! # struct MyBrowser;
//! # #[async_trait::async_trait]
//! # impl tabpilot::Browser for MyBrowser {
//! #     async fn context(&self) -> anyhow::Result<tabpilot::PageContext> { unimplemented!() }
//! #     async fn navigate(&self, _: &str) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn go_back(&self) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn read_page(&self) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn find_elements(&self, _: &str) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn click(&self, _: &str) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn fill(&self, _: &str, _: &str) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn select_option(&self, _: &str, _: &str) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn submit(&self, _: &str) -> anyhow::Result<String> { unimplemented!() }
//! #     async fn search(&self, _: &str) -> anyhow::Result<String> { unimplemented!() }
//! # }
//! # struct AlwaysDeny;
//! # #[async_trait::async_trait]
//! # impl tabpilot::PermissionGate for AlwaysDeny {
//! #     async fn request(&self, _: tabpilot::PromptRequest) -> tabpilot::GateReply {
//! #         tabpilot::GateReply::Deny
//! #     }
//! # }
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let browser = Arc::new(MyBrowser);
//!     let agent = AgentLoop::new(
//!         Arc::new(HttpTransport::from_env(&config.model.base_url, &config.model.model)?),
//!         browser.clone(),
//!         ToolRegistry::standard(browser),
//!         Arc::new(PolicyStore::in_memory(PermissionPolicy::default())),
//!         Arc::new(AlwaysDeny),
//!         Arc::new(MemoryAuditSink::new(config.general.audit_capacity)),
//!         config.loop_config(),
//!     );
//!
//!     let mut conversation = vec![Message::system("You are a browser assistant.")];
//!     let answer = agent.run(&mut conversation, "what's on this page?").await?;
//!     println!("{answer}");
//!     Ok(())
//! }
//! ```

mod agent;
mod audit;
mod browser;
mod config;
mod exec;
mod extract;
mod llm;
mod permission;
mod policy;
mod tools;

pub use agent::{
    AgentLoop, AgentLoopConfig, CancelToken, CANCELLED_MESSAGE, DEFAULT_MAX_ITERATIONS,
    MAX_ITERATIONS_MESSAGE, NO_RESPONSE_MESSAGE,
};
pub use audit::{ActionLogEntry, AuditSink, MemoryAuditSink, NullAuditSink, Outcome};
pub use browser::{site_of, Browser, PageContext};
pub use config::{Config, GeneralConfig, ModelConfig};
pub use exec::ToolExecutor;
pub use extract::{Extractor, RawModelTurn, ToolInvocation};
pub use llm::{
    ChatResponse, ChatTransport, Choice, FunctionCall, FunctionSchema, HttpTransport, Message,
    ResponseMessage, Role, StructuredCall, ToolSchema, TransportError,
};
pub use permission::{
    request_with_timeout, ChannelGate, GateReply, PermissionGate, PromptRequest,
};
pub use policy::{
    decide, Decision, JsonFilePersistence, PermissionPolicy, PolicyPersistence, PolicyStore,
    SiteTrust, ToolOverride, TrustLevel,
};
pub use tools::{names, ParamKind, ParamSpec, PermissionTier, Tool, ToolRegistry};

/// Initialize tracing from `RUST_LOG`, defaulting to info for this crate
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tabpilot=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
