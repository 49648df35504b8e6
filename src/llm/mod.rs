//! Chat transport contract and wire types

mod client;
mod types;

pub use client::{ChatTransport, HttpTransport};
pub use types::{
    ChatResponse, Choice, FunctionCall, FunctionSchema, Message, ResponseMessage, Role,
    StructuredCall, ToolSchema, TransportError,
};
