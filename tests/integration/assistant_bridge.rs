//! Integration tests for the assistant bridge and chat transcript.
//!
//! Uses a scripted backend in place of the hosted model so the request
//! shape, reply handling and error rendering can be checked without
//! network access.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use url::Url;

use toad::assistant::{
    AssistantBridge, AssistantError, ChatRole, Conversation, DEFAULT_MODEL, GREETING,
    GeminiBackend, GenerateRequest, GenerativeBackend, NO_BOARD_CONTEXT, NO_RESPONSE,
    NOT_CONFIGURED, SEND_FAILED, SYSTEM_PROMPT,
};
use toad_proto::snapshot::{BoardSnapshot, TaskSnapshot};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Script {
    Reply(String),
    Empty,
    Api(u16, String),
    Transport(String),
    Hang,
}

/// A backend that answers from a script and records what it was sent.
#[derive(Clone)]
struct ScriptedBackend {
    script: Script,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<GenerateRequest>>>,
}

impl ScriptedBackend {
    fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().last().cloned()
    }
}

impl GenerativeBackend for ScriptedBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<Option<String>, AssistantError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        match &self.script {
            Script::Reply(text) => Ok(Some(text.clone())),
            Script::Empty => Ok(None),
            Script::Api(status, message) => Err(AssistantError::Api {
                status: *status,
                message: message.clone(),
            }),
            Script::Transport(reason) => Err(AssistantError::Transport(reason.clone())),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

fn bridge(script: Script) -> (AssistantBridge<ScriptedBackend>, ScriptedBackend) {
    let backend = ScriptedBackend::new(script);
    (AssistantBridge::new(Some(backend.clone()), DEFAULT_MODEL), backend)
}

fn board() -> BoardSnapshot {
    BoardSnapshot {
        id: "0xb0a4d".to_string(),
        name: "Roadmap".to_string(),
        description: String::new(),
        columns: vec!["Backlog".to_string(), "Done".to_string()],
        created_at_ms: 1_700_000_000_000,
        tasks: vec![TaskSnapshot {
            id: "0x7a5c".to_string(),
            title: "Write launch post".to_string(),
            description: String::new(),
            column: "Backlog".to_string(),
            priority: Some(2),
            due_at_ms: None,
            assignees: Vec::new(),
            milestone: None,
            tags: vec!["launch".to_string()],
            created_at_ms: 0,
            updated_at_ms: 0,
            is_encrypted: false,
        }],
    }
}

// ===========================================================================
// AssistantBridge::ask
// ===========================================================================

#[tokio::test]
async fn unconfigured_bridge_answers_without_a_request() {
    let bridge: AssistantBridge<ScriptedBackend> = AssistantBridge::new(None, DEFAULT_MODEL);

    assert!(!bridge.is_configured());
    assert_eq!(bridge.ask("what is blocked?", Some(&board())).await, NOT_CONFIGURED);
}

#[tokio::test]
async fn request_carries_board_json_and_question() {
    let (bridge, backend) = bridge(Script::Reply("Two tasks are open.".to_string()));

    let reply = bridge.ask("summarize", Some(&board())).await;

    assert_eq!(reply, "Two tasks are open.");
    assert_eq!(backend.calls(), 1);
    let request = backend.last_request().unwrap();
    assert_eq!(request.model, DEFAULT_MODEL);
    assert_eq!(request.system_instruction, SYSTEM_PROMPT);
    assert_eq!(request.contents.len(), 2);
    assert!(request.contents[0].starts_with("Current board state:\n{"));
    assert!(request.contents[0].contains("\"createdAtMs\": 1700000000000"));
    assert!(request.contents[0].contains("\"Write launch post\""));
    assert_eq!(request.contents[1], "User message: summarize");
}

#[tokio::test]
async fn missing_board_sends_placeholder_context() {
    let (bridge, backend) = bridge(Script::Reply("ok".to_string()));

    bridge.ask("hello", None).await;

    assert_eq!(backend.last_request().unwrap().contents[0], NO_BOARD_CONTEXT);
}

#[tokio::test]
async fn empty_reply_is_reported() {
    let (bridge, _backend) = bridge(Script::Empty);
    assert_eq!(bridge.ask("hello", None).await, NO_RESPONSE);
}

#[tokio::test]
async fn api_error_is_rendered_with_status() {
    let (bridge, _backend) = bridge(Script::Api(429, "Resource has been exhausted".to_string()));
    assert_eq!(
        bridge.ask("hello", None).await,
        "TOAD AI error: [429] Resource has been exhausted"
    );
}

#[tokio::test]
async fn transport_error_is_rendered() {
    let (bridge, _backend) = bridge(Script::Transport("connection reset".to_string()));
    assert_eq!(bridge.ask("hello", None).await, "TOAD AI error: connection reset.");
}

#[tokio::test]
async fn unreachable_endpoint_becomes_an_error_reply() {
    let backend = GeminiBackend::new(
        Url::parse("http://127.0.0.1:9/v1beta/").unwrap(),
        "test-key",
        Duration::from_secs(2),
    )
    .unwrap();
    let bridge = AssistantBridge::new(Some(backend), DEFAULT_MODEL);

    let reply = bridge.ask("hello", None).await;

    assert!(reply.starts_with("TOAD AI error: "), "{reply}");
}

// ===========================================================================
// Conversation
// ===========================================================================

#[tokio::test]
async fn conversation_appends_question_and_reply() {
    let (bridge, _backend) = bridge(Script::Reply("Done!".to_string()));
    let mut conversation = Conversation::default();

    let reply = conversation.send(&bridge, "move it", None).await.cloned();

    assert_eq!(reply.map(|m| m.text), Some("Done!".to_string()));
    let roles: Vec<ChatRole> = conversation.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![ChatRole::Assistant, ChatRole::User, ChatRole::Assistant]);
    assert_eq!(conversation.messages()[0].text, GREETING);
    assert_eq!(conversation.messages()[1].text, "move it");
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let (bridge, backend) = bridge(Script::Reply("unused".to_string()));
    let mut conversation = Conversation::default();

    assert!(conversation.send(&bridge, "   ", None).await.is_none());

    assert_eq!(conversation.messages().len(), 1);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn slow_reply_becomes_an_apology() {
    let (bridge, _backend) = bridge(Script::Hang);
    let mut conversation = Conversation::new(Duration::from_millis(20));

    let reply = conversation.send(&bridge, "hello?", None).await.cloned();

    assert_eq!(reply.map(|m| m.text), Some(SEND_FAILED.to_string()));
    assert_eq!(conversation.messages().len(), 3);
}

#[tokio::test]
async fn clear_resets_to_greeting() {
    let (bridge, _backend) = bridge(Script::Reply("hi".to_string()));
    let mut conversation = Conversation::default();
    conversation.send(&bridge, "one", None).await;
    conversation.send(&bridge, "two", None).await;
    assert_eq!(conversation.messages().len(), 5);

    conversation.clear();

    assert_eq!(conversation.messages().len(), 1);
    assert_eq!(conversation.messages()[0].role, ChatRole::Assistant);
}
