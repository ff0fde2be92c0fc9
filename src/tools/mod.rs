pub mod create_playlist;
pub mod get_liked_songs;
pub mod get_playlist_contents;
pub mod get_playlists;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::ToolError;
use crate::spotify::MusicService;

use create_playlist::CreatePlaylistTool;
use get_liked_songs::GetLikedSongsTool;
use get_playlist_contents::GetPlaylistContentsTool;
use get_playlists::GetMyPlaylistsTool;

/// Definition sent to the model so it knows what tools are available.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
    /// When true, missing or extra arguments are a hard validation
    /// failure rather than best-effort coercion.
    pub strict: bool,
}

/// Every tool implements this trait.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool.
    fn name(&self) -> &str;

    /// Human-readable description sent to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's arguments.
    fn schema(&self) -> Value;

    /// Whether arguments are validated strictly against the schema.
    fn strict(&self) -> bool {
        true
    }

    /// Execute the tool with parsed JSON arguments, returning output
    /// text. Structured output is stringified — text is the wire format
    /// the model consumes back.
    async fn execute(&self, args: Value) -> Result<String>;
}

/// Holds the capabilities available to the model for one loop
/// invocation and dispatches named calls.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Called during startup.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(Arc::from(tool));
    }

    /// Descriptors passed verbatim to the completion port on every
    /// round. Stable for the registry's lifetime.
    pub fn describe(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.schema(),
                strict: t.strict(),
            })
            .collect()
    }

    /// How many tools are registered.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Look up a tool by name, validate its arguments, and execute it.
    ///
    /// `arguments` is the raw JSON string from the model. Callers
    /// convert the error into a tool-result payload rather than
    /// aborting the turn — the conversation must stay well-formed even
    /// when the model hallucinates a tool name.
    pub async fn invoke(&self, name: &str, arguments: &str) -> Result<String, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let args: Value = serde_json::from_str(arguments).map_err(|e| {
            ToolError::InvalidArguments(format!("arguments are not valid JSON: {}", e))
        })?;
        validate_arguments(&tool.schema(), &args, tool.strict())?;

        tool.execute(args)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))
    }

    /// Create a registry with every Spotify tool registered against the
    /// given service.
    pub fn with_spotify(service: Arc<dyn MusicService>) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(GetMyPlaylistsTool::new(Arc::clone(&service))));
        registry.register(Box::new(GetPlaylistContentsTool::new(Arc::clone(&service))));
        registry.register(Box::new(GetLikedSongsTool::new(Arc::clone(&service))));
        registry.register(Box::new(CreatePlaylistTool::new(service)));
        registry
    }
}

/// Check a parsed argument object against a tool's JSON schema.
///
/// Arguments must be an object and every `required` field must be
/// present; under strict mode no field outside the schema's
/// `properties` is allowed either. Field types are left to each tool's
/// typed deserialization.
fn validate_arguments(schema: &Value, args: &Value, strict: bool) -> Result<(), ToolError> {
    let object = args
        .as_object()
        .ok_or_else(|| ToolError::InvalidArguments("arguments must be a JSON object".to_string()))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(field) {
                return Err(ToolError::InvalidArguments(format!(
                    "missing required field '{}'",
                    field
                )));
            }
        }
    }

    if strict {
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for key in object.keys() {
                if !properties.contains_key(key) {
                    return Err(ToolError::InvalidArguments(format!(
                        "unexpected field '{}'",
                        key
                    )));
                }
            }
        }
    }

    Ok(())
}
