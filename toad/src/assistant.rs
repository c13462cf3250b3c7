//! Assistant bridge to a hosted generative-text endpoint.
//!
//! [`AssistantBridge::ask`] packages the current board as pretty JSON plus
//! the user's text into one request and returns the reply. It never fails:
//! every error is turned into a short message the caller can show as the
//! assistant's answer. Without an API key no request is made at all.
//!
//! [`Conversation`] is the chat transcript shown next to the board.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use toad_proto::snapshot::BoardSnapshot;

/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Reply when no API key is configured.
pub const NOT_CONFIGURED: &str = "TOAD AI is not configured. Please set GEMINI_API_KEY in your environment.";

/// Reply when the model returns no text.
pub const NO_RESPONSE: &str = "No response text from TOAD AI.";

/// First message of every conversation.
pub const GREETING: &str =
    "Hi! I'm TOAD, your on-chain workflow assistant. How can I help you with your tasks today?";

/// Shown in the transcript when no reply arrives in time.
pub const SEND_FAILED: &str = "Sorry, I encountered an error. Please try again.";

/// Board context sent when no board is loaded.
pub const NO_BOARD_CONTEXT: &str = "No board data available.";

/// System instruction sent with every request.
pub const SYSTEM_PROMPT: &str = "\
You are TOAD, the built-in assistant for a Sui-based Kanban app. Be concise, direct, and avoid markdown or decorative formatting. Always stick to what the user asked; do not describe the whole app unless they request it. Respond in plain text.

Rules:
- Keep answers short and focused on the user's request.
- Do not add bold, bullets, or long overviews unless specifically asked.
- If they ask to create a task: tell them to open Features Kanban from the left sidebar, click Add Task, then fill Summary, Description, Status, Priority, Assignee, Reporter, Tags/Due Date/Milestone, and enable Encryption if needed.
- If they ask to move/edit tasks: open Features Kanban, drag between columns or open the task and edit fields like status/priority/description.
- If they ask about wallet: top-right Connect Wallet; required to push tasks on-chain.
- If they ask about on-chain: tasks can be stored with Sui Move for transparency/immutability; mention encryption option briefly.
- If boardContext is present: summarize counts, empty statuses, missing fields (assignee/description), and offer a short suggestion.
- Offer help only when relevant, with a single short follow-up question.";

/// Errors from a generation request. Never returned by
/// [`AssistantBridge::ask`], which renders them as text.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// The API answered with an error status.
    #[error("[{status}] {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The request could not be sent or the response not read.
    #[error("{0}")]
    Transport(String),

    /// The response body was not the expected JSON.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The board snapshot could not be serialized.
    #[error("failed to encode board snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The endpoint URL could not be built.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    /// Model name.
    pub model: String,
    /// System instruction.
    pub system_instruction: String,
    /// User-turn text parts, in order.
    pub contents: Vec<String>,
}

/// A text-generation service.
pub trait GenerativeBackend: Send + Sync {
    /// Sends `request`; `Ok(None)` means the model returned no text.
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<Option<String>, AssistantError>> + Send;
}

/// [`GenerativeBackend`] for the Gemini `generateContent` REST API.
pub struct GeminiBackend {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiBackend {
    /// Creates a backend for `endpoint` (the API base URL).
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Transport`] if the HTTP client cannot be built.
    pub fn new(endpoint: Url, api_key: impl Into<String>, timeout: Duration) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistantError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Creates a backend with the key from `GEMINI_API_KEY`, or `None` if
    /// the variable is unset or empty.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Transport`] if the HTTP client cannot be built.
    pub fn from_env(endpoint: Url, timeout: Duration) -> Result<Option<Self>, AssistantError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Self::new(endpoint, key.trim(), timeout).map(Some),
            _ => Ok(None),
        }
    }

    fn url_for(&self, model: &str) -> Result<Url, AssistantError> {
        Ok(self.endpoint.join(&format!("models/{model}:generateContent"))?)
    }
}

impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, request: &GenerateRequest) -> Result<Option<String>, AssistantError> {
        let url = self.url_for(&request.model)?;
        let parts: Vec<Value> = request.contents.iter().map(|text| json!({ "text": text })).collect();
        let body = json!({
            "systemInstruction": { "parts": [{ "text": request.system_instruction }] },
            "contents": [{ "role": "user", "parts": parts }],
        });

        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| AssistantError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(api_error(status.as_u16(), status.canonical_reason(), &text));
        }
        let value: Value = serde_json::from_str(&text).map_err(|e| AssistantError::Malformed(e.to_string()))?;
        Ok(reply_text(&value))
    }
}

/// Concatenates the text parts of the first candidate.
fn reply_text(value: &Value) -> Option<String> {
    let parts = value.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts.iter().filter_map(|p| p.get("text")?.as_str()).collect();
    (!text.is_empty()).then_some(text)
}

fn api_error(status: u16, reason: Option<&str>, body: &str) -> AssistantError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
        .or_else(|| reason.map(str::to_string))
        .unwrap_or_else(|| "request failed".to_string());
    AssistantError::Api { status, message }
}

/// Asks the assistant about the current board.
pub struct AssistantBridge<B> {
    backend: Option<B>,
    model: String,
}

impl<B: GenerativeBackend> AssistantBridge<B> {
    /// Creates a bridge. With `backend == None` every question is answered
    /// with [`NOT_CONFIGURED`].
    #[must_use]
    pub fn new(backend: Option<B>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Whether a backend is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Builds the request for `text` about `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Snapshot`] if the snapshot cannot be encoded.
    pub fn build_request(
        &self,
        text: &str,
        snapshot: Option<&BoardSnapshot>,
    ) -> Result<GenerateRequest, AssistantError> {
        let context = match snapshot {
            Some(s) => format!("Current board state:\n{}", s.to_pretty_json()?),
            None => NO_BOARD_CONTEXT.to_string(),
        };
        Ok(GenerateRequest {
            model: self.model.clone(),
            system_instruction: SYSTEM_PROMPT.to_string(),
            contents: vec![context, format!("User message: {text}")],
        })
    }

    /// Asks `text` about `snapshot` and returns the reply, or a message
    /// describing why there is none.
    pub async fn ask(&self, text: &str, snapshot: Option<&BoardSnapshot>) -> String {
        let Some(backend) = &self.backend else {
            return NOT_CONFIGURED.to_string();
        };
        let result = match self.build_request(text, snapshot) {
            Ok(request) => backend.generate(&request).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(Some(reply)) => reply,
            Ok(None) => NO_RESPONSE.to_string(),
            Err(AssistantError::Api { status, message }) => {
                tracing::error!(status, %message, "assistant api error");
                format!("TOAD AI error: [{status}] {message}")
            }
            Err(e) => {
                tracing::error!(err = %e, "assistant request failed");
                format!("TOAD AI error: {e}.")
            }
        }
    }
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person using the board.
    User,
    /// The assistant.
    Assistant,
}

/// One message in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: ChatRole,
    /// Message text.
    pub text: String,
    /// When it was added, ms since epoch.
    pub timestamp_ms: i64,
}

impl ChatMessage {
    fn now(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

/// A chat transcript with the assistant.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    reply_timeout: Duration,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl Conversation {
    /// A transcript holding only the greeting. Replies slower than
    /// `reply_timeout` are replaced by [`SEND_FAILED`].
    #[must_use]
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            messages: vec![ChatMessage::now(ChatRole::Assistant, GREETING)],
            reply_timeout,
        }
    }

    /// Messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Sends `text` and appends the user message and the reply. Blank input
    /// is ignored. Returns the reply, if one was added.
    pub async fn send<B: GenerativeBackend>(
        &mut self,
        bridge: &AssistantBridge<B>,
        text: &str,
        snapshot: Option<&BoardSnapshot>,
    ) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        self.messages.push(ChatMessage::now(ChatRole::User, text));
        let reply = match tokio::time::timeout(self.reply_timeout, bridge.ask(text, snapshot)).await {
            Ok(reply) => reply,
            Err(_) => {
                tracing::warn!(timeout = ?self.reply_timeout, "assistant reply timed out");
                SEND_FAILED.to_string()
            }
        };
        self.messages.push(ChatMessage::now(ChatRole::Assistant, reply));
        self.messages.last()
    }

    /// Resets the transcript to the greeting.
    pub fn clear(&mut self) {
        self.messages = vec![ChatMessage::now(ChatRole::Assistant, GREETING)];
    }
}
