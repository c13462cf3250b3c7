//! Raw chain records to view model.
//!
//! Chain field bags are loosely typed: ids arrive as strings or wrapped in
//! `{id}` / `{bytes}` / `{value}` objects, options arrive as `null`, a bare
//! value, or `{"vec": [..]}`, and u64 values arrive as numbers or decimal
//! strings. Everything in this module tolerates those shapes and never
//! panics; unreadable values fall back to the documented defaults.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use toad_proto::model::{
    Board, ColumnDef, ColumnId, Column, Comment, DEFAULT_COLUMNS, Member, Priority, Role,
    Subtask, Task, UNTITLED_TASK, sort_members,
};
use toad_proto::object::{Address, ObjectId, RawObject};

/// Lower-cases `name` and replaces each run of whitespace with one `-`.
///
/// Case and spacing variants of the same name collide on purpose: `"In
/// Progress"` and `"in  progress"` both map to `in-progress`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
        } else {
            slug.push(c);
            in_space = false;
        }
    }
    slug
}

/// Color token for a column slug.
#[must_use]
pub fn column_color(slug: &str) -> &'static str {
    match slug {
        "planned" => "blue",
        "in-progress" => "amber",
        "blocked" => "red",
        "done" => "emerald",
        _ => "slate",
    }
}

/// The title of the column with id `slug`, or the slug with dashes turned
/// into spaces when no column matches.
#[must_use]
pub fn title_from_slug(columns: &[ColumnDef], slug: &str) -> String {
    columns
        .iter()
        .find(|c| c.id.as_str() == slug)
        .map_or_else(|| slug.replace('-', " "), |c| c.title.clone())
}

/// Normalizes an identifier that may be a bare string or wrapped in an
/// object under `id`, `bytes` or `value` (one nested level allowed).
///
/// Empty strings, `{}` and any other shape yield `None`.
#[must_use]
pub fn normalize_id(value: &Value) -> Option<String> {
    normalize_id_depth(value, 1)
}

fn normalize_id_depth(value: &Value, depth: u8) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => ["id", "bytes", "value"].iter().find_map(|key| match map.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            nested @ Value::Object(_) if depth > 0 => normalize_id_depth(nested, depth - 1),
            _ => None,
        }),
        _ => None,
    }
}

/// Unwraps a chain option: `null` and `{"vec": []}` are `None`,
/// `{"vec": [v]}` is `v`, any other value is itself.
#[must_use]
pub fn unwrap_option(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if map.len() == 1 && map.contains_key("vec") => {
            map.get("vec").and_then(Value::as_array).and_then(|v| v.first())
        }
        other => Some(other),
    }
}

/// Reads a u64 from a JSON number or a decimal string.
#[must_use]
pub fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads an optional u64 field, unwrapping chain options.
fn option_u64(fields: &Value, key: &str) -> Option<u64> {
    fields.get(key).and_then(unwrap_option).and_then(as_u64)
}

fn option_string(fields: &Value, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(unwrap_option)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_or_empty(fields: &Value, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list(fields: &Value, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Formats epoch milliseconds as an RFC 3339 UTC timestamp.
#[must_use]
pub fn ms_to_rfc3339(ms: u64) -> Option<String> {
    let ms = i64::try_from(ms).ok()?;
    DateTime::<Utc>::from_timestamp_millis(ms).map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Column names for a new board: `names`, or the default columns when empty.
#[must_use]
pub fn board_column_names(names: Vec<String>) -> Vec<String> {
    if names.is_empty() {
        DEFAULT_COLUMNS.iter().map(ToString::to_string).collect()
    } else {
        names
    }
}

/// Builds the column definitions for a list of column names.
///
/// An empty list yields the default columns.
#[must_use]
pub fn column_defs(names: &[String]) -> Vec<ColumnDef> {
    let names: Vec<&str> = if names.is_empty() {
        DEFAULT_COLUMNS.to_vec()
    } else {
        names.iter().map(String::as_str).collect()
    };
    names
        .into_iter()
        .map(|title| {
            let slug = slugify(title);
            ColumnDef {
                color: column_color(&slug).to_string(),
                id: ColumnId::new(slug),
                title: title.to_string(),
            }
        })
        .collect()
}

/// Maps a board object's fields.
#[must_use]
pub fn map_board(id: &ObjectId, fields: &Value) -> Board {
    let names = string_list(fields, "columns");
    Board {
        id: id.clone(),
        name: string_or_empty(fields, "name"),
        description: string_or_empty(fields, "description"),
        columns: column_defs(&names),
        created_at_ms: option_u64(fields, "created_at_ms"),
    }
}

/// Reads the members table id from a board's fields (`members.id`).
#[must_use]
pub fn members_table_id(fields: &Value) -> Option<ObjectId> {
    let members = fields.get("members")?;
    let id = members
        .get("fields")
        .and_then(|f| f.get("id"))
        .or_else(|| members.get("id"))?;
    normalize_id(id).map(ObjectId::new)
}

/// Reads the board's task ids, dropping entries that are not ids.
#[must_use]
pub fn task_ids(fields: &Value) -> Vec<ObjectId> {
    fields
        .get("task_ids")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(normalize_id)
                .map(ObjectId::new)
                .collect()
        })
        .unwrap_or_default()
}

/// Maps a task record.
///
/// `fields` is the task's own field bag (already unwrapped from any dynamic
/// field wrapper); `object` supplies chain provenance.
#[must_use]
pub fn map_task(task_id: &ObjectId, board_id: &ObjectId, fields: &Value, object: Option<&RawObject>) -> Task {
    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTITLED_TASK);
    let column = fields
        .get("column")
        .and_then(Value::as_str)
        .map_or_else(|| slugify(DEFAULT_COLUMNS[0]), slugify);

    let mut task = Task::new(task_id.clone(), board_id.clone(), title, ColumnId::new(column));
    task.description = string_or_empty(fields, "description");
    task.priority = option_u64(fields, "priority").map_or(Priority::Medium, Priority::from_code);
    task.due_date = option_u64(fields, "due_at_ms").and_then(ms_to_rfc3339);
    task.tags = string_list(fields, "tags");
    task.assignees = string_list(fields, "assignees")
        .into_iter()
        .map(Address::new)
        .collect();
    task.milestone = option_string(fields, "milestone");
    task.is_encrypted = fields
        .get("is_encrypted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    task.created_at_ms = option_u64(fields, "created_at_ms");
    task.updated_at_ms = option_u64(fields, "updated_at_ms");
    task.subtasks = map_subtasks(fields);
    task.comments = map_comments(fields);

    task.chain.object_id = Some(task_id.clone());
    if let Some(object) = object {
        task.chain.owner = object.owner.as_ref().and_then(|o| o.address()).cloned();
        task.chain.last_tx_digest.clone_from(&object.previous_transaction);
    }
    task
}

fn entry_fields(entry: &Value) -> &Value {
    entry.get("fields").unwrap_or(entry)
}

fn map_subtasks(fields: &Value) -> Vec<Subtask> {
    let Some(items) = fields.get("subtasks").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let f = entry_fields(item);
            Subtask {
                id: f
                    .get("id")
                    .and_then(normalize_id)
                    .unwrap_or_else(|| i.to_string()),
                title: string_or_empty(f, "title"),
                completed: f
                    .get("done")
                    .or_else(|| f.get("completed"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            }
        })
        .collect()
}

fn map_comments(fields: &Value) -> Vec<Comment> {
    let Some(items) = fields.get("comments").and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let f = entry_fields(item);
            Comment {
                id: f
                    .get("id")
                    .and_then(normalize_id)
                    .unwrap_or_else(|| i.to_string()),
                text: f
                    .get("body")
                    .or_else(|| f.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                author: string_or_empty(f, "author"),
                created_at: option_u64(f, "created_at_ms")
                    .and_then(ms_to_rfc3339)
                    .unwrap_or_default(),
            }
        })
        .collect()
}

/// Maps a member role value; a missing value is the contributor default.
#[must_use]
pub fn map_role(value: Option<&Value>) -> Role {
    value
        .and_then(unwrap_option)
        .and_then(as_u64)
        .map_or(Role::Contributor, Role::from_ordinal)
}

/// Collects members and sorts them highest privilege first.
#[must_use]
pub fn map_members(entries: impl IntoIterator<Item = (Address, Role)>) -> Vec<Member> {
    let mut members: Vec<Member> = entries
        .into_iter()
        .map(|(address, role)| Member { address, role })
        .collect();
    sort_members(&mut members);
    members
}

/// Builds the column views of `board`, each holding the tasks whose column
/// id matches, in task order.
///
/// Tasks whose column matches none of the board's columns are not shown.
#[must_use]
pub fn columns_for<'a>(board: &'a Board, tasks: &'a [Task]) -> Vec<Column<'a>> {
    board
        .columns
        .iter()
        .map(|def| Column {
            id: &def.id,
            title: &def.title,
            color: &def.color,
            status_label: &def.title,
            tasks: tasks.iter().filter(|t| t.column_id() == &def.id).collect(),
        })
        .collect()
}
