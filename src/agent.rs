//! The agent loop — mixtape's core state machine.
//!
//! Drives repeated completion calls, dispatches model-requested tool
//! calls through the registry, appends call/result pairs to the
//! conversation history, and emits progress events until the model
//! produces a final text answer. One logical flow of control per turn:
//! tool calls returned together are dispatched one at a time, in
//! received order, because results must be correlated back to their
//! `call_id` and playlist creation is ordering-sensitive.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::constants::{APOLOGY_TEXT, MAX_TOOL_ROUNDS, NO_OUTPUT_TEXT, ROUND_LIMIT_TEXT};
use crate::entry::Entry;
use crate::model::{CompletionPort, ModelTurn, OutputItem};
use crate::tools::ToolRegistry;

/// Progress events produced while a turn runs.
///
/// A turn's event sequence is finite and single-consumer: zero or more
/// `ToolInvocation`s interleaved with model round-trips, terminated by
/// exactly one `Turn`.
#[derive(Debug)]
pub enum AgentEvent {
    /// Emitted before a tool executes, so the caller can show
    /// "running X…" feedback.
    ToolInvocation { name: String, arguments: String },
    /// Terminal event carrying the display text and the full updated
    /// history to persist.
    Turn {
        display_text: String,
        history: Vec<Entry>,
    },
}

/// Bundled collaborators for one conversation turn.
pub struct TurnParams {
    pub port: Arc<dyn CompletionPort>,
    pub registry: Arc<ToolRegistry>,
    pub instructions: String,
    /// Must already end with the newest user entry; the loop itself
    /// never appends the user's message.
    pub history: Vec<Entry>,
}

/// Run one conversation turn, returning the consuming end of its event
/// sequence.
///
/// The loop runs as a spawned task. Dropping the receiver stops it at
/// the next event boundary; tool calls already dispatched still
/// complete.
pub fn run_turn(params: TurnParams) -> mpsc::Receiver<AgentEvent> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(drive_turn(params, tx));
    rx
}

async fn drive_turn(params: TurnParams, events: mpsc::Sender<AgentEvent>) {
    let TurnParams {
        port,
        registry,
        instructions,
        mut history,
    } = params;
    let tools = registry.describe();

    for round in 0..MAX_TOOL_ROUNDS {
        info!(round, entries = history.len(), "querying model");
        let turn = match port.complete(&instructions, &tools, &history).await {
            Ok(turn) => turn,
            Err(e) => {
                // The failing call mutated nothing, so `history` is
                // exactly the pre-failure state: no dangling tool
                // calls, no partial assistant text.
                error!(error = %e, "completion request failed");
                let _ = events
                    .send(AgentEvent::Turn {
                        display_text: APOLOGY_TEXT.to_string(),
                        history,
                    })
                    .await;
                return;
            }
        };

        match turn {
            ModelTurn::Text(items) => {
                let mut lines = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        OutputItem::Text(text) => {
                            history.push(Entry::assistant(&text));
                            lines.push(text);
                        }
                        OutputItem::Refusal(text) => {
                            history.push(Entry::refusal(&text));
                            lines.push(format!("Refusal message: {}", text));
                        }
                        OutputItem::Unknown(diagnostic) => {
                            // Surfaced to the caller but never stored:
                            // a diagnostic is not part of the dialogue.
                            warn!(%diagnostic, "unrecognized model output item");
                            lines.push(diagnostic);
                        }
                    }
                }
                let _ = events
                    .send(AgentEvent::Turn {
                        display_text: lines.join("\n"),
                        history,
                    })
                    .await;
                return;
            }

            ModelTurn::Empty => {
                warn!("model returned no output");
                let _ = events
                    .send(AgentEvent::Turn {
                        display_text: NO_OUTPUT_TEXT.to_string(),
                        history,
                    })
                    .await;
                return;
            }

            ModelTurn::ToolCalls(calls) => {
                for call in calls {
                    if events
                        .send(AgentEvent::ToolInvocation {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        })
                        .await
                        .is_err()
                    {
                        // Receiver dropped; stop between suspension
                        // points rather than mid-execution.
                        return;
                    }

                    info!(tool = %call.name, "dispatching tool call");
                    history.push(Entry::tool_call(&call.call_id, &call.name, &call.arguments));
                    let output = match registry.invoke(&call.name, &call.arguments).await {
                        Ok(output) => output,
                        Err(e) => {
                            // The pair is appended anyway: an orphaned
                            // call would desynchronize the next query.
                            warn!(tool = %call.name, error = %e, "tool call failed");
                            serde_json::json!({ "error": e.to_string() }).to_string()
                        }
                    };
                    history.push(Entry::tool_result(&call.call_id, &output));
                }
                // Loop back to the model with the extended history.
            }
        }
    }

    warn!(limit = MAX_TOOL_ROUNDS, "tool round limit reached");
    let _ = events
        .send(AgentEvent::Turn {
            display_text: ROUND_LIMIT_TEXT.to_string(),
            history,
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::model::ToolCallRequest;
    use crate::spotify::{MusicService, Playlist, Track};
    use crate::tools::{Tool, ToolDescriptor};
    use anyhow::{anyhow, Result};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A [`CompletionPort`] that replays a script of turns and counts
    /// how many times it was called.
    struct ScriptedPort {
        turns: Mutex<VecDeque<Result<ModelTurn, CompletionError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedPort {
        fn new(turns: Vec<Result<ModelTurn, CompletionError>>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl CompletionPort for ScriptedPort {
        async fn complete(
            &self,
            _instructions: &str,
            _tools: &[ToolDescriptor],
            _history: &[Entry],
        ) -> Result<ModelTurn, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(ModelTurn::Empty))
        }
    }

    /// Canned [`MusicService`] recording `create_playlist` arguments.
    struct FakeMusic {
        created: Mutex<Vec<(String, String, Vec<String>)>>,
    }

    impl FakeMusic {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                created: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl MusicService for FakeMusic {
        async fn get_user_playlists(&self) -> Result<Vec<Playlist>> {
            Ok(vec![Playlist {
                name: "My Favs".to_string(),
                playlist_id: "pl_1".to_string(),
                description: String::new(),
                tracks: 20,
            }])
        }

        async fn get_liked_songs(&self) -> Result<Vec<Track>> {
            Ok(Vec::new())
        }

        async fn get_playlist_contents(&self, _playlist_id: &str) -> Result<Vec<Track>> {
            Err(anyhow!("no such playlist"))
        }

        async fn create_playlist(
            &self,
            name: &str,
            description: &str,
            track_uris: &[String],
        ) -> Result<String> {
            self.created.lock().unwrap().push((
                name.to_string(),
                description.to_string(),
                track_uris.to_vec(),
            ));
            Ok("new_id".to_string())
        }
    }

    /// A no-op tool for loop tests that don't need Spotify semantics.
    struct NullTool {
        name: &'static str,
    }

    #[async_trait::async_trait]
    impl Tool for NullTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn schema(&self) -> Value {
            json!({ "type": "object", "properties": {}, "required": [] })
        }

        fn strict(&self) -> bool {
            false
        }

        async fn execute(&self, _args: Value) -> Result<String> {
            Ok("ok".to_string())
        }
    }

    fn null_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(NullTool { name: "noop" }));
        Arc::new(registry)
    }

    fn spotify_registry(service: Arc<FakeMusic>) -> Arc<ToolRegistry> {
        Arc::new(ToolRegistry::with_spotify(service as Arc<dyn MusicService>))
    }

    fn call(call_id: &str, name: &str, arguments: &str) -> ToolCallRequest {
        ToolCallRequest {
            call_id: call_id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    async fn collect(
        port: Arc<ScriptedPort>,
        registry: Arc<ToolRegistry>,
        history: Vec<Entry>,
    ) -> Vec<AgentEvent> {
        let mut rx = run_turn(TurnParams {
            port,
            registry,
            instructions: "test instructions".to_string(),
            history,
        });
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    /// Check that every tool call in a history is immediately followed
    /// by its matching result and that no result is orphaned.
    fn assert_pairing(history: &[Entry]) {
        for (i, entry) in history.iter().enumerate() {
            match entry {
                Entry::ToolCall { call_id, .. } => match history.get(i + 1) {
                    Some(Entry::ToolResult { call_id: result_id, .. }) => {
                        assert_eq!(result_id, call_id, "result does not match call")
                    }
                    other => panic!("tool call not followed by a result: {:?}", other),
                },
                Entry::ToolResult { call_id, .. } => match history.get(i.wrapping_sub(1)) {
                    Some(Entry::ToolCall { call_id: call, .. }) if i > 0 => {
                        assert_eq!(call, call_id, "orphaned tool result")
                    }
                    _ => panic!("tool result without a preceding call"),
                },
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn scenario_playlist_roundtrip() {
        let service = FakeMusic::new();
        let port = ScriptedPort::new(vec![
            Ok(ModelTurn::ToolCalls(vec![call(
                "call_123",
                "get_my_playlists",
                "{}",
            )])),
            Ok(ModelTurn::Text(vec![OutputItem::Text(
                "Here are your playlists.".to_string(),
            )])),
        ]);

        let events = collect(
            Arc::clone(&port),
            spotify_registry(service),
            vec![Entry::user("Show my playlists")],
        )
        .await;

        assert_eq!(port.calls(), 2);
        assert_eq!(events.len(), 2);
        let AgentEvent::ToolInvocation { name, .. } = &events[0] else {
            panic!("expected tool invocation first");
        };
        assert_eq!(name, "get_my_playlists");

        let AgentEvent::Turn {
            display_text,
            history,
        } = &events[1]
        else {
            panic!("expected terminal turn");
        };
        assert_eq!(display_text, "Here are your playlists.");
        assert_eq!(history.len(), 4);
        assert!(history[0].is_user());
        assert!(history[1].is_tool_call());
        let Entry::ToolResult { call_id, output } = &history[2] else {
            panic!("expected tool result");
        };
        assert_eq!(call_id, "call_123");
        assert!(output.contains("My Favs"));
        assert_eq!(history[3], Entry::assistant("Here are your playlists."));
    }

    #[tokio::test]
    async fn scenario_transport_failure_preserves_history() {
        let port = ScriptedPort::new(vec![Err(CompletionError::Transport(
            "connection refused".to_string(),
        ))]);
        let input = vec![Entry::user("Hello")];

        let events = collect(Arc::clone(&port), null_registry(), input.clone()).await;

        assert_eq!(port.calls(), 1);
        assert_eq!(events.len(), 1);
        let AgentEvent::Turn {
            display_text,
            history,
        } = &events[0]
        else {
            panic!("expected terminal turn");
        };
        assert!(display_text.starts_with("I'm sorry"));
        assert_eq!(*history, input);
    }

    #[tokio::test]
    async fn scenario_create_playlist_arguments_pass_through() {
        let service = FakeMusic::new();
        let port = ScriptedPort::new(vec![
            Ok(ModelTurn::ToolCalls(vec![call(
                "call_9",
                "create_playlist",
                r#"{"name":"X","description":"Y","track_uris":["a"]}"#,
            )])),
            Ok(ModelTurn::Text(vec![OutputItem::Text(
                "Playlist created.".to_string(),
            )])),
        ]);

        let events = collect(
            port,
            spotify_registry(Arc::clone(&service)),
            vec![Entry::user("Create a playlist for me.")],
        )
        .await;

        let AgentEvent::Turn { history, .. } = events.last().unwrap() else {
            panic!("expected terminal turn");
        };
        let Entry::ToolResult { output, .. } = &history[2] else {
            panic!("expected tool result");
        };
        assert!(output.contains("new_id"));

        let created = service.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(
            created[0],
            ("X".to_string(), "Y".to_string(), vec!["a".to_string()])
        );
    }

    #[tokio::test]
    async fn multi_call_turn_keeps_pairs_ordered() {
        let port = ScriptedPort::new(vec![
            Ok(ModelTurn::ToolCalls(vec![
                call("c1", "noop", "{}"),
                call("c2", "noop", "{}"),
            ])),
            Ok(ModelTurn::Text(vec![OutputItem::Text("done".to_string())])),
        ]);

        let events = collect(port, null_registry(), vec![Entry::user("go")]).await;

        let AgentEvent::Turn { history, .. } = events.last().unwrap() else {
            panic!("expected terminal turn");
        };
        assert_eq!(history.len(), 6);
        assert_pairing(history);
        assert!(matches!(&history[1], Entry::ToolCall { call_id, .. } if call_id == "c1"));
        assert!(matches!(&history[3], Entry::ToolCall { call_id, .. } if call_id == "c2"));
    }

    #[tokio::test]
    async fn termination_counts_match_rounds() {
        // N tool-call turns then a text turn: N+1 completion calls,
        // N invocation events, one terminal turn.
        let n = 3;
        let mut script: Vec<Result<ModelTurn, CompletionError>> = (0..n)
            .map(|i| {
                Ok(ModelTurn::ToolCalls(vec![call(
                    &format!("c{}", i),
                    "noop",
                    "{}",
                )]))
            })
            .collect();
        script.push(Ok(ModelTurn::Text(vec![OutputItem::Text(
            "final".to_string(),
        )])));
        let port = ScriptedPort::new(script);

        let events = collect(Arc::clone(&port), null_registry(), vec![Entry::user("go")]).await;

        assert_eq!(port.calls(), n + 1);
        let invocations = events
            .iter()
            .filter(|e| matches!(e, AgentEvent::ToolInvocation { .. }))
            .count();
        assert_eq!(invocations, n);
        assert!(matches!(events.last(), Some(AgentEvent::Turn { .. })));
        assert_eq!(events.len(), n + 1);
    }

    #[tokio::test]
    async fn unknown_tool_still_produces_a_result() {
        let port = ScriptedPort::new(vec![
            Ok(ModelTurn::ToolCalls(vec![call(
                "c1",
                "play_music",
                "{}",
            )])),
            Ok(ModelTurn::Text(vec![OutputItem::Text("ok".to_string())])),
        ]);

        let events = collect(Arc::clone(&port), null_registry(), vec![Entry::user("go")]).await;

        // The loop queried the model again instead of aborting.
        assert_eq!(port.calls(), 2);
        let AgentEvent::Turn { history, .. } = events.last().unwrap() else {
            panic!("expected terminal turn");
        };
        assert_pairing(history);
        let Entry::ToolResult { output, .. } = &history[2] else {
            panic!("expected tool result");
        };
        assert!(output.contains("error"));
        assert!(output.contains("play_music"));
    }

    #[tokio::test]
    async fn invalid_arguments_still_produce_a_result() {
        let service = FakeMusic::new();
        let port = ScriptedPort::new(vec![
            Ok(ModelTurn::ToolCalls(vec![call(
                "c1",
                "create_playlist",
                r#"{"name":"X"}"#,
            )])),
            Ok(ModelTurn::Text(vec![OutputItem::Text("ok".to_string())])),
        ]);

        let events = collect(
            port,
            spotify_registry(Arc::clone(&service)),
            vec![Entry::user("go")],
        )
        .await;

        let AgentEvent::Turn { history, .. } = events.last().unwrap() else {
            panic!("expected terminal turn");
        };
        let Entry::ToolResult { output, .. } = &history[2] else {
            panic!("expected tool result");
        };
        assert!(output.contains("error"));
        // Validation failed before the side effect could run.
        assert!(service.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_turn_ends_with_notice() {
        let port = ScriptedPort::new(vec![Ok(ModelTurn::Empty)]);
        let input = vec![Entry::user("go")];

        let events = collect(port, null_registry(), input.clone()).await;

        assert_eq!(events.len(), 1);
        let AgentEvent::Turn {
            display_text,
            history,
        } = &events[0]
        else {
            panic!("expected terminal turn");
        };
        assert_eq!(display_text, NO_OUTPUT_TEXT);
        assert_eq!(*history, input);
    }

    #[tokio::test]
    async fn text_items_join_with_newlines_but_stay_distinct() {
        let port = ScriptedPort::new(vec![Ok(ModelTurn::Text(vec![
            OutputItem::Text("First.".to_string()),
            OutputItem::Refusal("Not that.".to_string()),
        ]))]);

        let events = collect(port, null_registry(), vec![Entry::user("go")]).await;

        let AgentEvent::Turn {
            display_text,
            history,
        } = &events[0]
        else {
            panic!("expected terminal turn");
        };
        assert_eq!(display_text, "First.\nRefusal message: Not that.");
        assert_eq!(history[1], Entry::assistant("First."));
        assert_eq!(history[2], Entry::refusal("Not that."));
    }

    #[tokio::test]
    async fn unknown_output_is_surfaced_but_not_stored() {
        let port = ScriptedPort::new(vec![Ok(ModelTurn::Text(vec![OutputItem::Unknown(
            "Unknown output type: audio".to_string(),
        )]))]);
        let input = vec![Entry::user("go")];

        let events = collect(port, null_registry(), input.clone()).await;

        let AgentEvent::Turn {
            display_text,
            history,
        } = &events[0]
        else {
            panic!("expected terminal turn");
        };
        assert!(display_text.contains("Unknown output type"));
        assert_eq!(*history, input);
    }

    #[tokio::test]
    async fn round_limit_stops_a_looping_model() {
        let script: Vec<Result<ModelTurn, CompletionError>> = (0..MAX_TOOL_ROUNDS * 2)
            .map(|i| {
                Ok(ModelTurn::ToolCalls(vec![call(
                    &format!("c{}", i),
                    "noop",
                    "{}",
                )]))
            })
            .collect();
        let port = ScriptedPort::new(script);

        let events = collect(Arc::clone(&port), null_registry(), vec![Entry::user("go")]).await;

        assert_eq!(port.calls(), MAX_TOOL_ROUNDS);
        let AgentEvent::Turn {
            display_text,
            history,
        } = events.last().unwrap()
        else {
            panic!("expected terminal turn");
        };
        assert!(display_text.starts_with("I'm sorry"));
        // Every pair dispatched before the cap is intact.
        assert_pairing(history);
        assert_eq!(history.len(), 1 + MAX_TOOL_ROUNDS * 2);
    }
}
