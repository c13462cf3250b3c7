//! The in-memory copy of board, task and member state.

use std::collections::HashMap;

use toad_proto::model::{Board, Column, Member, Task};
use toad_proto::object::ObjectId;
use toad_proto::snapshot::{BoardSnapshot, TaskSnapshot};

use crate::identity::Identity;
use crate::mapper;
use crate::sync::{BoardContents, SyncState};

/// What the client currently shows.
///
/// Task and member lists are kept per board and are only ever replaced
/// wholesale by a hydration; local overlay edits change them in place until
/// the next hydration of that board.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    identity: Option<Identity>,
    boards: Vec<Board>,
    current_board: Option<ObjectId>,
    tasks: HashMap<ObjectId, Vec<Task>>,
    members: HashMap<ObjectId, Vec<Member>>,
    sync_state: SyncState,
    last_error: Option<String>,
    pending_local_edits: HashMap<ObjectId, usize>,
}

impl Snapshot {
    /// The connected identity.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Boards in discovery order.
    #[must_use]
    pub fn boards(&self) -> &[Board] {
        &self.boards
    }

    /// A board by id.
    #[must_use]
    pub fn board(&self, id: &ObjectId) -> Option<&Board> {
        self.boards.iter().find(|b| &b.id == id)
    }

    /// The selected board, or the first board when none is selected.
    #[must_use]
    pub fn current_board(&self) -> Option<&Board> {
        self.current_board
            .as_ref()
            .and_then(|id| self.board(id))
            .or_else(|| self.boards.first())
    }

    /// Tasks of a board, in board order.
    #[must_use]
    pub fn tasks(&self, board_id: &ObjectId) -> &[Task] {
        self.tasks.get(board_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Members of a board, highest privilege first.
    #[must_use]
    pub fn members(&self, board_id: &ObjectId) -> &[Member] {
        self.members.get(board_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Column views of a board.
    #[must_use]
    pub fn columns(&self, board_id: &ObjectId) -> Vec<Column<'_>> {
        self.board(board_id)
            .map(|board| mapper::columns_for(board, self.tasks(board_id)))
            .unwrap_or_default()
    }

    /// Finds a task on any board.
    #[must_use]
    pub fn find_task(&self, task_id: &ObjectId) -> Option<&Task> {
        self.tasks.values().flatten().find(|t| &t.id == task_id)
    }

    /// Where the last sync got to.
    #[must_use]
    pub const fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    /// Message of the last failed operation, cleared by the next success.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Local edits applied to `board_id` since it was last hydrated.
    #[must_use]
    pub fn pending_local_edits(&self, board_id: &ObjectId) -> usize {
        self.pending_local_edits.get(board_id).copied().unwrap_or(0)
    }

    /// The assistant-facing snapshot of a board.
    #[must_use]
    pub fn board_snapshot(&self, board_id: &ObjectId) -> Option<BoardSnapshot> {
        let board = self.board(board_id)?;
        let tasks = self
            .tasks(board_id)
            .iter()
            .map(|t| TaskSnapshot {
                id: t.id.to_string(),
                title: t.title.clone(),
                description: t.description.clone(),
                column: mapper::title_from_slug(&board.columns, t.column_id().as_str()),
                priority: Some(t.priority.code()),
                due_at_ms: t
                    .due_date
                    .as_deref()
                    .and_then(|d| chrono::DateTime::parse_from_rfc3339(d).ok())
                    .and_then(|d| u64::try_from(d.timestamp_millis()).ok()),
                assignees: t.assignees.iter().map(ToString::to_string).collect(),
                milestone: t.milestone.clone(),
                tags: t.tags.clone(),
                created_at_ms: t.created_at_ms.unwrap_or(0),
                updated_at_ms: t.updated_at_ms.unwrap_or(0),
                is_encrypted: t.is_encrypted,
            })
            .collect();
        Some(BoardSnapshot {
            id: board.id.to_string(),
            name: board.name.clone(),
            description: board.description.clone(),
            columns: board.column_titles(),
            created_at_ms: board.created_at_ms.unwrap_or(0),
            tasks,
        })
    }

    // -- mutation, crate-internal --

    pub(crate) fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) const fn set_sync_state(&mut self, state: SyncState) {
        self.sync_state = state;
    }

    pub(crate) fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }

    pub(crate) fn select_board(&mut self, board_id: &ObjectId) -> bool {
        if self.board(board_id).is_some() {
            self.current_board = Some(board_id.clone());
            true
        } else {
            false
        }
    }

    /// Replaces every board with the result of a full sync.
    pub(crate) fn replace_all(&mut self, contents: Vec<BoardContents>) {
        self.boards.clear();
        self.tasks.clear();
        self.members.clear();
        self.pending_local_edits.clear();
        for c in contents {
            self.replace_board(c);
        }
        if let Some(current) = &self.current_board
            && self.board(current).is_none()
        {
            self.current_board = None;
        }
    }

    /// Replaces one board's definition, tasks and members.
    pub(crate) fn replace_board(&mut self, contents: BoardContents) {
        let BoardContents {
            board,
            tasks,
            members,
            ..
        } = contents;
        let id = board.id.clone();
        match self.boards.iter_mut().find(|b| b.id == id) {
            Some(existing) => *existing = board,
            None => self.boards.push(board),
        }
        self.tasks.insert(id.clone(), tasks);
        self.members.insert(id.clone(), members);
        self.pending_local_edits.remove(&id);
    }

    pub(crate) fn task_mut(&mut self, task_id: &ObjectId) -> Option<&mut Task> {
        self.tasks.values_mut().flatten().find(|t| &t.id == task_id)
    }

    pub(crate) fn tasks_mut(&mut self, board_id: &ObjectId) -> Option<&mut Vec<Task>> {
        self.tasks.get_mut(board_id)
    }

    pub(crate) fn note_local_edit(&mut self, board_id: &ObjectId) {
        *self.pending_local_edits.entry(board_id.clone()).or_default() += 1;
    }
}
