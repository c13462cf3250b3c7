//! Loading one board with its members and tasks.

use std::time::Duration;

use serde_json::{Value, json};

use toad_proto::contract::Contract;
use toad_proto::model::{Board, Member, Task};
use toad_proto::object::{Address, DynamicFieldName, ObjectId, RawObject};

use crate::chain::{ChainError, ChainReader, with_timeout};
use crate::mapper;

use super::SyncError;

/// A board with everything the client shows for it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardContents {
    /// The board and its columns.
    pub board: Board,
    /// Tasks in board order.
    pub tasks: Vec<Task>,
    /// Members, highest privilege first.
    pub members: Vec<Member>,
    /// The object as read, for provenance checks.
    pub object: RawObject,
}

/// Fetches `board_id` and loads its members and tasks.
///
/// Member entries and tasks that fail to load are logged and skipped.
///
/// # Errors
///
/// Returns [`SyncError::Chain`] if the board object cannot be read and
/// [`SyncError::EmptyBoard`] if it has no fields.
pub async fn hydrate_board<C: ChainReader>(
    chain: &C,
    contract: &Contract,
    board_id: &ObjectId,
    timeout: Duration,
) -> Result<BoardContents, SyncError> {
    let object = with_timeout(timeout, chain.get_object(board_id)).await?;
    let Some(fields) = object.fields.as_ref() else {
        return Err(SyncError::EmptyBoard(board_id.clone()));
    };
    let board = mapper::map_board(board_id, fields);

    let members = match mapper::members_table_id(fields) {
        Some(table) => load_members(chain, &table, timeout).await,
        None => Vec::new(),
    };

    let mut ids = mapper::task_ids(fields);
    if ids.is_empty() {
        ids = task_ids_from_dynamic_fields(chain, board_id, timeout).await;
    }

    let mut tasks = Vec::with_capacity(ids.len());
    for task_id in &ids {
        match load_task(chain, contract, board_id, task_id, timeout).await {
            Ok(Some(task)) => tasks.push(task),
            Ok(None) => tracing::warn!(board = %board_id, task = %task_id, "task has no fields"),
            Err(e) => tracing::warn!(board = %board_id, task = %task_id, err = %e, "failed to load task"),
        }
    }

    tracing::debug!(
        board = %board_id,
        tasks = tasks.len(),
        members = members.len(),
        "board hydrated"
    );
    Ok(BoardContents {
        board,
        tasks,
        members,
        object,
    })
}

async fn load_members<C: ChainReader>(chain: &C, table: &ObjectId, timeout: Duration) -> Vec<Member> {
    let entries = match with_timeout(timeout, chain.get_dynamic_fields(table)).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(%table, err = %e, "failed to list members table");
            return Vec::new();
        }
    };

    let mut loaded = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(addr) = entry.name.value.as_str().filter(|a| !a.is_empty()) else {
            continue;
        };
        let address = Address::new(addr);
        let key = DynamicFieldName::address(&address);
        match with_timeout(timeout, chain.get_dynamic_field_object(table, &key)).await {
            Ok(obj) => {
                let role = mapper::map_role(obj.field("value"));
                loaded.push((address, role));
            }
            Err(e) => tracing::warn!(%table, member = %address, err = %e, "failed to load member entry"),
        }
    }
    mapper::map_members(loaded)
}

async fn task_ids_from_dynamic_fields<C: ChainReader>(
    chain: &C,
    board_id: &ObjectId,
    timeout: Duration,
) -> Vec<ObjectId> {
    match with_timeout(timeout, chain.get_dynamic_fields(board_id)).await {
        Ok(fields) => fields
            .into_iter()
            .filter(|f| f.name.type_.contains("TaskKey"))
            .map(|f| {
                f.name
                    .value
                    .get("task_id")
                    .and_then(mapper::normalize_id)
                    .map_or(f.object_id, ObjectId::new)
            })
            .collect(),
        Err(e) => {
            tracing::warn!(board = %board_id, err = %e, "failed to list board dynamic fields");
            Vec::new()
        }
    }
}

/// Loads one task: the task object directly, or through the board's
/// `TaskKey` dynamic field when the object is missing or carries no fields.
async fn load_task<C: ChainReader>(
    chain: &C,
    contract: &Contract,
    board_id: &ObjectId,
    task_id: &ObjectId,
    timeout: Duration,
) -> Result<Option<Task>, ChainError> {
    let direct = match with_timeout(timeout, chain.get_object(task_id)).await {
        Ok(object) => Some(object),
        Err(ChainError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };
    if let Some(object) = direct.as_ref()
        && let Some(fields) = object.fields.as_ref()
    {
        return Ok(Some(mapper::map_task(task_id, board_id, fields, Some(object))));
    }

    let key = DynamicFieldName {
        type_: contract.task_key_type(),
        value: json!({ "task_id": task_id.as_str() }),
    };
    let wrapped = match with_timeout(timeout, chain.get_dynamic_field_object(board_id, &key)).await {
        Ok(wrapped) => wrapped,
        Err(e) => {
            tracing::warn!(board = %board_id, task = %task_id, err = %e, "task dynamic field fetch failed");
            return Ok(None);
        }
    };
    let provenance = direct.as_ref().unwrap_or(&wrapped);
    let fields = wrapped
        .field("value")
        .map(|v| v.get("fields").unwrap_or(v))
        .filter(|v| v.is_object());
    Ok(fields.map(|f: &Value| mapper::map_task(task_id, board_id, f, Some(provenance))))
}
