//! Conversation entry types for mixtape's history.
//!
//! A history is an ordered, append-only `Vec<Entry>` owned by the caller
//! and extended by the agent loop. Entries are tagged for serde so a
//! persisted history round-trips losslessly and re-seeds future turns
//! verbatim.

use serde::{Deserialize, Serialize};

/// A single entry in a conversation history.
///
/// `ToolCall` and `ToolResult` are always appended as a pair: every
/// result's `call_id` matches exactly one earlier call, and the result
/// follows its call before the model is queried again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    /// A message typed by the user.
    User { text: String },
    /// Natural-language output from the model, intermediate or final.
    Assistant { text: String },
    /// The model declined to answer. Stored distinctly from normal text
    /// but rendered similarly to the user.
    Refusal { text: String },
    /// The model's request to invoke a named tool.
    ToolCall {
        /// Opaque id minted by the model; echoed back on the result.
        call_id: String,
        name: String,
        /// Raw JSON arguments exactly as the model produced them.
        arguments: String,
    },
    /// The textual outcome of executing a tool call.
    ToolResult { call_id: String, output: String },
}

impl Entry {
    pub fn user(text: impl Into<String>) -> Self {
        Self::User { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::Assistant { text: text.into() }
    }

    pub fn refusal(text: impl Into<String>) -> Self {
        Self::Refusal { text: text.into() }
    }

    pub fn tool_call(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self::ToolCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    pub fn tool_result(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            output: output.into(),
        }
    }

    /// Label used when replaying history in the terminal.
    pub fn label(&self) -> &'static str {
        match self {
            Entry::User { .. } => "you",
            Entry::Assistant { .. } | Entry::Refusal { .. } => "mixtape",
            Entry::ToolCall { .. } | Entry::ToolResult { .. } => "tool",
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Entry::User { .. })
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Entry::ToolCall { .. })
    }
}
