//! External AI-agent invocation.
//!
//! Agents are opaque CLI executables (claude, codex, gemini, ...) described
//! by an argv template. This module spawns them, delivers the prompt,
//! enforces timeouts, classifies failures for retry, and parses the JSON
//! analysis out of their raw output.

mod invoker;
mod parse;
mod retry;

pub use invoker::{AgentDescriptor, AgentInvocation, AgentInvoker, InvokeOptions};
pub use parse::{NOT_ANALYZED_REASONING, ParseFailure, ParsedAnalysis, parse_agent_response};
pub use retry::{
    RetryDecision, RetryPolicy, calculate_backoff, decide, is_transient_error, with_retry,
};
