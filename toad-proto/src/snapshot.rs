//! Serializable board snapshot handed to the assistant as context.
//!
//! Field names are camelCase because the snapshot is pasted verbatim into
//! the model prompt.

use serde::{Deserialize, Serialize};

/// One task as the assistant sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// Task id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Description (empty for encrypted tasks).
    pub description: String,
    /// Column display title.
    pub column: String,
    /// Priority code, `null` when unknown.
    pub priority: Option<u8>,
    /// Due date in ms since epoch.
    pub due_at_ms: Option<u64>,
    /// Assigned addresses.
    pub assignees: Vec<String>,
    /// Milestone.
    pub milestone: Option<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Creation time in ms, `0` when unknown.
    pub created_at_ms: u64,
    /// Last update in ms, `0` when unknown.
    pub updated_at_ms: u64,
    /// Whether the task body is encrypted.
    pub is_encrypted: bool,
}

/// A board and its tasks as the assistant sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    /// Board id.
    pub id: String,
    /// Board name.
    pub name: String,
    /// Board description.
    pub description: String,
    /// Column titles in order.
    pub columns: Vec<String>,
    /// Creation time in ms, `0` when unknown.
    pub created_at_ms: u64,
    /// Tasks on the board.
    pub tasks: Vec<TaskSnapshot>,
}

impl BoardSnapshot {
    /// Pretty-printed JSON used as prompt context.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
