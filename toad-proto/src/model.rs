//! Strongly-typed view model for boards, columns, tasks and members.
//!
//! Values here are produced by the mapper from raw chain records and are
//! what the rest of the client (views, assistant, overlay) works with.

use serde::{Deserialize, Serialize};

use crate::object::{Address, ObjectId, TransactionDigest};

/// Column names used when a board stores no columns of its own.
pub const DEFAULT_COLUMNS: [&str; 5] = ["Backlog", "Planned", "In Progress", "Blocked", "Done"];

/// Title used for tasks whose on-chain title is missing or empty.
pub const UNTITLED_TASK: &str = "Untitled Task";

/// Task priority. Encoded on chain as `u8` `0`/`1`/`2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Code `0`.
    Low,
    /// Code `1`. Also the fallback for unknown codes.
    #[default]
    Medium,
    /// Code `2`.
    High,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Maps an on-chain code to a priority. Unknown codes map to [`Priority::Medium`].
    #[must_use]
    pub const fn from_code(code: u64) -> Self {
        match code {
            0 => Self::Low,
            2 => Self::High,
            _ => Self::Medium,
        }
    }

    /// The on-chain `u8` code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Board member role. Ordinal `0` is the highest privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Ordinal `0`: manages members and columns.
    Admin,
    /// Ordinal `1`: creates and edits tasks. Default for invited members.
    #[default]
    Contributor,
    /// Ordinal `2`: may comment and react.
    Commenter,
    /// Ordinal `3`: read only.
    Viewer,
}

impl Role {
    /// Maps an on-chain ordinal. Values outside `0..=3` become [`Role::Viewer`].
    #[must_use]
    pub const fn from_ordinal(ordinal: u64) -> Self {
        match ordinal {
            0 => Self::Admin,
            1 => Self::Contributor,
            2 => Self::Commenter,
            _ => Self::Viewer,
        }
    }

    /// The on-chain `u8` ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Admin => 0,
            Self::Contributor => 1,
            Self::Commenter => 2,
            Self::Viewer => 3,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Contributor => write!(f, "contributor"),
            Self::Commenter => write!(f, "commenter"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" | "0" => Ok(Self::Admin),
            "contributor" | "1" => Ok(Self::Contributor),
            "commenter" | "2" => Ok(Self::Commenter),
            "viewer" | "3" => Ok(Self::Viewer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Slug identifying a column within a board (e.g. `in-progress`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    /// Wraps an already-slugified column identifier.
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Returns the slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A board as stored on chain, with its columns in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// The board object id.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Column definitions (tasks are not attached here, see [`Column`]).
    pub columns: Vec<ColumnDef>,
    /// Creation time in milliseconds since epoch, if the board reports one.
    pub created_at_ms: Option<u64>,
}

impl Board {
    /// Column display titles in order.
    #[must_use]
    pub fn column_titles(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.title.clone()).collect()
    }
}

/// A column definition derived from a column name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Slug of the title.
    pub id: ColumnId,
    /// Display title as stored on chain.
    pub title: String,
    /// Color token from the fixed column color table.
    pub color: String,
}

/// A column view with the tasks that currently sit in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column<'a> {
    /// Slug identifier.
    pub id: &'a ColumnId,
    /// Display title.
    pub title: &'a str,
    /// Color token.
    pub color: &'a str,
    /// Label shown on status pills (same as the title).
    pub status_label: &'a str,
    /// Tasks in this column, in board order.
    pub tasks: Vec<&'a Task>,
}

impl Column<'_> {
    /// Number of tasks in the column.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

/// A checklist item under a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    /// Subtask id (object id on chain, local id for overlay-created items).
    pub id: String,
    /// Title.
    pub title: String,
    /// Whether the item is checked off.
    pub completed: bool,
}

/// A comment on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment id.
    pub id: String,
    /// Body text.
    pub text: String,
    /// Author address or display name.
    pub author: String,
    /// RFC 3339 creation time.
    pub created_at: String,
}

/// Where a task lives on chain.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainProvenance {
    /// Object id of the task.
    pub object_id: Option<ObjectId>,
    /// Owning address, for address-owned task objects.
    pub owner: Option<Address>,
    /// Last transaction that touched the task object.
    pub last_tx_digest: Option<TransactionDigest>,
}

/// A task in the view model.
///
/// The task's column is stored once; [`Task::status`] and
/// [`Task::column_id`] both read it, so they cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task id.
    pub id: ObjectId,
    /// Board the task belongs to.
    pub board_id: ObjectId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    column: ColumnId,
    /// Priority.
    pub priority: Priority,
    /// Assigned addresses.
    pub assignees: Vec<Address>,
    /// Tags.
    pub tags: Vec<String>,
    /// Milestone name.
    pub milestone: Option<String>,
    /// Due date as an RFC 3339 string.
    pub due_date: Option<String>,
    /// Checklist.
    pub subtasks: Vec<Subtask>,
    /// Comments.
    pub comments: Vec<Comment>,
    /// Whether the task body is stored encrypted.
    pub is_encrypted: bool,
    /// Creation time in ms, when reported.
    pub created_at_ms: Option<u64>,
    /// Last update time in ms, when reported.
    pub updated_at_ms: Option<u64>,
    /// Chain provenance.
    pub chain: ChainProvenance,
}

impl Task {
    /// Creates a task in `column` with every optional field empty.
    #[must_use]
    pub fn new(id: ObjectId, board_id: ObjectId, title: impl Into<String>, column: ColumnId) -> Self {
        Self {
            id,
            board_id,
            title: title.into(),
            description: String::new(),
            column,
            priority: Priority::default(),
            assignees: Vec::new(),
            tags: Vec::new(),
            milestone: None,
            due_date: None,
            subtasks: Vec::new(),
            comments: Vec::new(),
            is_encrypted: false,
            created_at_ms: None,
            updated_at_ms: None,
            chain: ChainProvenance::default(),
        }
    }

    /// The column the task is in.
    #[must_use]
    pub const fn column_id(&self) -> &ColumnId {
        &self.column
    }

    /// The task status, which is its column.
    #[must_use]
    pub const fn status(&self) -> &ColumnId {
        &self.column
    }

    /// Moves the task to another column, updating status and column together.
    pub fn set_column(&mut self, column: ColumnId) {
        self.column = column;
    }
}

/// A board member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Wallet address.
    pub address: Address,
    /// Role on the board.
    pub role: Role,
}

/// Sorts members highest privilege first, then by address.
pub fn sort_members(members: &mut [Member]) {
    members.sort_by(|a, b| a.role.cmp(&b.role).then_with(|| a.address.cmp(&b.address)));
}
