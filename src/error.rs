//! Domain error types for mixtape.
//!
//! Typed errors at the agent loop's two seams — the tool registry and
//! the completion endpoint — so the loop can pattern-match instead of
//! inspecting strings.

use thiserror::Error;

/// Failures from dispatching a model-requested tool call.
///
/// Never propagated out of a turn: the agent loop converts each variant
/// into an `{"error": ...}` tool result so the conversation stays
/// well-formed even when the model hallucinates a tool name or its
/// arguments.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("undefined tool: '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool execution failed: {0}")]
    Execution(String),
}

/// Failures from the completion endpoint.
///
/// Every variant is fatal for the current turn: the loop emits a single
/// apology event carrying the pre-call history and stops. The
/// conversation remains usable on the next user turn.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request to chat endpoint failed: {0}")]
    Transport(String),

    #[error("chat endpoint returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode chat endpoint response: {0}")]
    Decode(String),
}
