//! Completion endpoint boundary.
//!
//! [`CompletionPort`] is the seam between the agent loop and the LLM:
//! it takes the system instructions, tool descriptors, and conversation
//! history, and returns one decoded [`ModelTurn`]. [`OpenAiPort`]
//! implements it over any OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::CompletionError;
use crate::tools::ToolDescriptor;

/// One content item from a text-bearing model turn, in encounter order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputItem {
    Text(String),
    Refusal(String),
    /// An output shape this crate does not recognize, summarized for
    /// display rather than dropped silently.
    Unknown(String),
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRequest {
    /// Opaque id minted by the model; must be echoed on the result.
    pub call_id: String,
    pub name: String,
    /// Raw JSON arguments string, passed through verbatim.
    pub arguments: String,
}

/// One decoded model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    /// Text and/or refusal items. Ends the agent loop.
    Text(Vec<OutputItem>),
    /// One or more tool requests. Forces another round-trip, even when
    /// the same response also carried text.
    ToolCalls(Vec<ToolCallRequest>),
    /// The model returned nothing usable.
    Empty,
}

/// The boundary interface to the LLM.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(
        &self,
        instructions: &str,
        tools: &[ToolDescriptor],
        history: &[Entry],
    ) -> Result<ModelTurn, CompletionError>;
}

/// A [`CompletionPort`] backed by an OpenAI-compatible chat completions
/// endpoint.
pub struct OpenAiPort {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiPort {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

/// Convert instructions + history into chat completion wire messages.
///
/// Tool calls become assistant messages carrying a `tool_calls` array;
/// tool results become `tool`-role messages keyed by `tool_call_id`.
/// Refusals are replayed as plain assistant text — the wire format has
/// no refusal input shape.
fn to_wire_messages(instructions: &str, history: &[Entry]) -> Vec<Value> {
    let mut messages = vec![json!({ "role": "system", "content": instructions })];
    for entry in history {
        match entry {
            Entry::User { text } => {
                messages.push(json!({ "role": "user", "content": text }));
            }
            Entry::Assistant { text } | Entry::Refusal { text } => {
                messages.push(json!({ "role": "assistant", "content": text }));
            }
            Entry::ToolCall {
                call_id,
                name,
                arguments,
            } => {
                messages.push(json!({
                    "role": "assistant",
                    "tool_calls": [{
                        "id": call_id,
                        "type": "function",
                        "function": { "name": name, "arguments": arguments },
                    }],
                }));
            }
            Entry::ToolResult { call_id, output } => {
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": output,
                }));
            }
        }
    }
    messages
}

fn descriptor_to_wire(descriptor: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": descriptor.name,
            "description": descriptor.description,
            "parameters": descriptor.parameters,
            "strict": descriptor.strict,
        },
    })
}

/// Decode the first choice of a chat completions response into a
/// [`ModelTurn`].
///
/// Any tool call classifies the turn as [`ModelTurn::ToolCalls`];
/// accompanying text is not treated as final output. Content shapes the
/// taxonomy does not cover become [`OutputItem::Unknown`] diagnostics.
fn decode_turn(body: &Value) -> ModelTurn {
    let Some(message) = body.pointer("/choices/0/message") else {
        return ModelTurn::Empty;
    };

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        if !calls.is_empty() {
            let calls = calls
                .iter()
                .map(|call| ToolCallRequest {
                    call_id: call
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    name: call
                        .pointer("/function/name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    arguments: call
                        .pointer("/function/arguments")
                        .and_then(Value::as_str)
                        .unwrap_or("{}")
                        .to_string(),
                })
                .collect();
            return ModelTurn::ToolCalls(calls);
        }
    }

    let mut items = Vec::new();
    if let Some(refusal) = message.get("refusal").and_then(Value::as_str) {
        items.push(OutputItem::Refusal(refusal.to_string()));
    }
    match message.get("content") {
        Some(Value::String(text)) if !text.is_empty() => {
            items.push(OutputItem::Text(text.clone()));
        }
        // Some compatible servers return content as an array of parts.
        Some(Value::Array(parts)) => {
            for part in parts {
                match part.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(text) = part.get("text").and_then(Value::as_str) {
                            items.push(OutputItem::Text(text.to_string()));
                        }
                    }
                    Some("refusal") => {
                        if let Some(text) = part.get("refusal").and_then(Value::as_str) {
                            items.push(OutputItem::Refusal(text.to_string()));
                        }
                    }
                    other => {
                        items.push(OutputItem::Unknown(format!(
                            "Unknown output type: {}",
                            other.unwrap_or("(untyped)")
                        )));
                    }
                }
            }
        }
        Some(Value::Null) | Some(Value::String(_)) | None => {}
        Some(other) => {
            items.push(OutputItem::Unknown(format!(
                "Unknown content shape: {}",
                other
            )));
        }
    }

    if items.is_empty() {
        ModelTurn::Empty
    } else {
        ModelTurn::Text(items)
    }
}

#[async_trait]
impl CompletionPort for OpenAiPort {
    async fn complete(
        &self,
        instructions: &str,
        tools: &[ToolDescriptor],
        history: &[Entry],
    ) -> Result<ModelTurn, CompletionError> {
        let mut body = json!({
            "model": self.model,
            "messages": to_wire_messages(instructions, history),
        });
        if !tools.is_empty() {
            body["tools"] = Value::Array(tools.iter().map(descriptor_to_wire).collect());
            body["tool_choice"] = json!("auto");
        }

        debug!(model = %self.model, entries = history.len(), "calling chat endpoint");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!(%status, "chat endpoint returned an error");
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: Value =
            serde_json::from_str(&text).map_err(|e| CompletionError::Decode(e.to_string()))?;
        Ok(decode_turn(&parsed))
    }
}
