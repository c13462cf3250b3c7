//! Local, non-durable edits to the snapshot.
//!
//! These edits change only the in-memory [`Snapshot`] and are never sent to
//! the chain. Each one is counted per board; the next hydration of that
//! board replaces its tasks with chain state and drops the edits.

use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use toad_proto::model::{ColumnId, Comment, Priority, Task};
use toad_proto::object::{Address, ObjectId};

use crate::store::Snapshot;

/// Errors from local edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    /// No task with this id is loaded.
    #[error("task not found: {0}")]
    TaskNotFound(ObjectId),

    /// The task has no subtask with this id.
    #[error("subtask {subtask} not found on task {task}")]
    SubtaskNotFound {
        /// Task searched.
        task: ObjectId,
        /// Missing subtask id.
        subtask: String,
    },

    /// The task's board has no such column.
    #[error("board has no column {0}")]
    UnknownColumn(ColumnId),
}

/// Field changes for [`Snapshot::update_task_locally`]. `None` leaves a
/// field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEdit {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New tag list.
    pub tags: Option<Vec<String>>,
    /// New assignees.
    pub assignees: Option<Vec<Address>>,
    /// New milestone (`Some(None)` clears it).
    pub milestone: Option<Option<String>>,
    /// New due date (`Some(None)` clears it).
    pub due_date: Option<Option<String>>,
}

impl Snapshot {
    fn local_task(&mut self, task_id: &ObjectId) -> Result<&mut Task, OverlayError> {
        self.task_mut(task_id)
            .ok_or_else(|| OverlayError::TaskNotFound(task_id.clone()))
    }

    /// Flips a subtask's completion and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns an error if the task or subtask is not loaded.
    pub fn toggle_subtask(&mut self, task_id: &ObjectId, subtask_id: &str) -> Result<bool, OverlayError> {
        let task = self.local_task(task_id)?;
        let board_id = task.board_id.clone();
        let subtask = task
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| OverlayError::SubtaskNotFound {
                task: task_id.clone(),
                subtask: subtask_id.to_string(),
            })?;
        subtask.completed = !subtask.completed;
        let completed = subtask.completed;
        self.note_local_edit(&board_id);
        Ok(completed)
    }

    /// Appends a comment with a fresh id and the current time.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::TaskNotFound`] if the task is not loaded.
    pub fn add_comment(&mut self, task_id: &ObjectId, text: &str, author: &str) -> Result<Comment, OverlayError> {
        let comment = Comment {
            id: format!("comment-{}", Uuid::now_v7()),
            text: text.to_string(),
            author: author.to_string(),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        let task = self.local_task(task_id)?;
        let board_id = task.board_id.clone();
        task.comments.push(comment.clone());
        self.note_local_edit(&board_id);
        Ok(comment)
    }

    /// Moves a task to another column of its board.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is not loaded or its board has no such
    /// column.
    pub fn move_task_locally(&mut self, task_id: &ObjectId, column: ColumnId) -> Result<(), OverlayError> {
        let board_id = self
            .find_task(task_id)
            .map(|t| t.board_id.clone())
            .ok_or_else(|| OverlayError::TaskNotFound(task_id.clone()))?;
        if let Some(board) = self.board(&board_id)
            && !board.columns.iter().any(|c| c.id == column)
        {
            return Err(OverlayError::UnknownColumn(column));
        }
        self.local_task(task_id)?.set_column(column);
        self.note_local_edit(&board_id);
        Ok(())
    }

    /// Applies field changes to a task.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::TaskNotFound`] if the task is not loaded.
    pub fn update_task_locally(&mut self, task_id: &ObjectId, edit: TaskEdit) -> Result<(), OverlayError> {
        let task = self.local_task(task_id)?;
        if let Some(title) = edit.title {
            task.title = title;
        }
        if let Some(description) = edit.description {
            task.description = description;
        }
        if let Some(priority) = edit.priority {
            task.priority = priority;
        }
        if let Some(tags) = edit.tags {
            task.tags = tags;
        }
        if let Some(assignees) = edit.assignees {
            task.assignees = assignees;
        }
        if let Some(milestone) = edit.milestone {
            task.milestone = milestone;
        }
        if let Some(due_date) = edit.due_date {
            task.due_date = due_date;
        }
        let board_id = task.board_id.clone();
        self.note_local_edit(&board_id);
        Ok(())
    }

    /// Removes a task from its board's list and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`OverlayError::TaskNotFound`] if the task is not loaded.
    pub fn remove_task_locally(&mut self, task_id: &ObjectId) -> Result<Task, OverlayError> {
        let board_id = self
            .find_task(task_id)
            .map(|t| t.board_id.clone())
            .ok_or_else(|| OverlayError::TaskNotFound(task_id.clone()))?;
        let tasks = self
            .tasks_mut(&board_id)
            .ok_or_else(|| OverlayError::TaskNotFound(task_id.clone()))?;
        let index = tasks
            .iter()
            .position(|t| &t.id == task_id)
            .ok_or_else(|| OverlayError::TaskNotFound(task_id.clone()))?;
        let removed = tasks.remove(index);
        self.note_local_edit(&board_id);
        Ok(removed)
    }
}
