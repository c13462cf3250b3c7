//! Builders for every entry point of the `kanban` board contract.
//!
//! Each builder returns exactly one [`MoveCall`] with its arguments in the
//! order the contract declares them. The contract aborts on a wrong order or
//! a missing shared object, and nothing here can detect that, so the order
//! is fixed in code and the shared clock / registry objects are always
//! attached where the entry point takes them.

use serde::{Deserialize, Serialize};

use crate::call::{CallArg, ContractFunction, MoveCall, PureValue, TypeTag};
use crate::model::{Priority, Role};
use crate::object::{Address, ObjectId};

/// Module name of the board contract.
pub const DEFAULT_MODULE: &str = "kanban";

/// Id of the shared system clock object.
pub const CLOCK_OBJECT_ID: &str = "0x6";

/// Where the board contract lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Package id.
    pub package_id: ObjectId,
    /// Module name (normally `kanban`).
    pub module: String,
    /// Shared clock object.
    pub clock_id: ObjectId,
    /// Shared board registry object.
    pub registry_id: ObjectId,
}

impl Default for Contract {
    fn default() -> Self {
        Self {
            package_id: ObjectId::new("0x0"),
            module: DEFAULT_MODULE.to_string(),
            clock_id: ObjectId::new(CLOCK_OBJECT_ID),
            registry_id: ObjectId::new("0x0"),
        }
    }
}

/// Parameters of `create_task`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskParams {
    /// Board to add the task to.
    pub board_id: ObjectId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Column display name (not the slug).
    pub column: String,
    /// Priority, if chosen.
    pub priority: Option<Priority>,
    /// Due date in ms since epoch.
    pub due_at_ms: Option<u64>,
    /// Assigned addresses.
    pub assignees: Vec<Address>,
    /// Milestone name.
    pub milestone: Option<String>,
    /// Tags.
    pub tags: Vec<String>,
    /// Whether `ciphertext` carries the real task body.
    pub is_encrypted: bool,
    /// Encrypted body (`iv || ciphertext`).
    pub ciphertext: Option<Vec<u8>>,
    /// Team identifier; `0` when unused.
    pub team_id: u64,
}

impl Default for CreateTaskParams {
    /// An untitled task on the placeholder board `0x0`, in the default column.
    fn default() -> Self {
        Self {
            board_id: ObjectId::new("0x0"),
            title: String::new(),
            description: String::new(),
            column: String::new(),
            priority: None,
            due_at_ms: None,
            assignees: Vec::new(),
            milestone: None,
            tags: Vec::new(),
            is_encrypted: false,
            ciphertext: None,
            team_id: 0,
        }
    }
}

impl Contract {
    /// Creates a contract reference with the default module and clock.
    #[must_use]
    pub fn new(package_id: ObjectId, registry_id: ObjectId) -> Self {
        Self {
            package_id,
            registry_id,
            ..Self::default()
        }
    }

    /// Fully qualified struct type `<package>::<module>::<name>`.
    #[must_use]
    pub fn struct_type(&self, name: &str) -> String {
        format!("{}::{}::{name}", self.package_id, self.module)
    }

    /// Type of board objects.
    #[must_use]
    pub fn board_type(&self) -> String {
        self.struct_type("Board")
    }

    /// Type of the capability object proving board ownership.
    #[must_use]
    pub fn owner_cap_type(&self) -> String {
        self.struct_type("BoardOwnerCap")
    }

    /// Type of the dynamic-field key under which tasks are stored on a board.
    #[must_use]
    pub fn task_key_type(&self) -> String {
        self.struct_type("TaskKey")
    }

    /// Whether a shared registry is configured.
    #[must_use]
    pub fn has_registry(&self) -> bool {
        !self.registry_id.is_placeholder()
    }

    fn call(&self, function: ContractFunction, arguments: Vec<CallArg>) -> MoveCall {
        MoveCall {
            package: self.package_id.clone(),
            module: self.module.clone(),
            function,
            arguments,
        }
    }

    fn clock(&self) -> CallArg {
        CallArg::object(self.clock_id.clone())
    }

    fn registry(&self) -> CallArg {
        CallArg::object(self.registry_id.clone())
    }

    /// `create_board(name, description, columns, registry, clock)`
    #[must_use]
    pub fn create_board(&self, name: &str, description: &str, columns: &[String]) -> MoveCall {
        self.call(
            ContractFunction::CreateBoard,
            vec![
                string(name),
                string(description),
                CallArg::pure(PureValue::StringVec(columns.to_vec())),
                self.registry(),
                self.clock(),
            ],
        )
    }

    /// `delete_board(board, cap)`
    #[must_use]
    pub fn delete_board(&self, board_id: &ObjectId, cap_id: &ObjectId) -> MoveCall {
        self.call(
            ContractFunction::DeleteBoard,
            vec![object(board_id), object(cap_id)],
        )
    }

    /// `update_board_columns(board, cap, columns)`
    #[must_use]
    pub fn update_board_columns(
        &self,
        board_id: &ObjectId,
        cap_id: &ObjectId,
        columns: &[String],
    ) -> MoveCall {
        self.call(
            ContractFunction::UpdateBoardColumns,
            vec![
                object(board_id),
                object(cap_id),
                CallArg::pure(PureValue::StringVec(columns.to_vec())),
            ],
        )
    }

    /// `add_member(board, cap, address, role, registry)`
    #[must_use]
    pub fn add_member(
        &self,
        board_id: &ObjectId,
        cap_id: &ObjectId,
        member: &Address,
        role: Role,
    ) -> MoveCall {
        self.call(
            ContractFunction::AddMember,
            vec![
                object(board_id),
                object(cap_id),
                address(member),
                CallArg::pure(PureValue::U8(role.ordinal())),
                self.registry(),
            ],
        )
    }

    /// `update_member_role(board, cap, address, role)`
    #[must_use]
    pub fn update_member_role(
        &self,
        board_id: &ObjectId,
        cap_id: &ObjectId,
        member: &Address,
        role: Role,
    ) -> MoveCall {
        self.call(
            ContractFunction::UpdateMemberRole,
            vec![
                object(board_id),
                object(cap_id),
                address(member),
                CallArg::pure(PureValue::U8(role.ordinal())),
            ],
        )
    }

    /// `remove_member(board, cap, address)`
    #[must_use]
    pub fn remove_member(&self, board_id: &ObjectId, cap_id: &ObjectId, member: &Address) -> MoveCall {
        self.call(
            ContractFunction::RemoveMember,
            vec![object(board_id), object(cap_id), address(member)],
        )
    }

    /// `create_task(board, title, description, column, priority, due_at_ms,
    /// assignees, milestone, tags, is_encrypted, ciphertext, team_id, clock)`
    #[must_use]
    pub fn create_task(&self, params: &CreateTaskParams) -> MoveCall {
        let priority = PureValue::option(
            TypeTag::U8,
            params.priority.map(|p| PureValue::U8(p.code())),
        );
        let due_at_ms = PureValue::option(TypeTag::U64, params.due_at_ms.map(PureValue::U64));
        let milestone = PureValue::option(
            TypeTag::String,
            params.milestone.clone().map(PureValue::String),
        );
        let ciphertext = PureValue::option(
            TypeTag::Vector(Box::new(TypeTag::U8)),
            params.ciphertext.clone().map(PureValue::Bytes),
        );

        self.call(
            ContractFunction::CreateTask,
            vec![
                object(&params.board_id),
                string(&params.title),
                string(&params.description),
                string(&params.column),
                CallArg::pure(priority),
                CallArg::pure(due_at_ms),
                CallArg::pure(PureValue::AddressVec(params.assignees.clone())),
                CallArg::pure(milestone),
                CallArg::pure(PureValue::StringVec(params.tags.clone())),
                CallArg::pure(PureValue::Bool(params.is_encrypted)),
                CallArg::pure(ciphertext),
                CallArg::pure(PureValue::U64(params.team_id)),
                self.clock(),
            ],
        )
    }

    /// `update_task_position(board, task, column, clock)`
    #[must_use]
    pub fn update_task_position(
        &self,
        board_id: &ObjectId,
        task_id: &ObjectId,
        new_column: &str,
    ) -> MoveCall {
        self.call(
            ContractFunction::UpdateTaskPosition,
            vec![object(board_id), id(task_id), string(new_column), self.clock()],
        )
    }

    /// `update_task_details(board, task, title, description, clock)`
    #[must_use]
    pub fn update_task_details(
        &self,
        board_id: &ObjectId,
        task_id: &ObjectId,
        title: &str,
        description: &str,
    ) -> MoveCall {
        self.call(
            ContractFunction::UpdateTaskDetails,
            vec![
                object(board_id),
                id(task_id),
                string(title),
                string(description),
                self.clock(),
            ],
        )
    }

    /// `set_task_due_date(board, task, due_at_ms, clock)`
    #[must_use]
    pub fn set_task_due_date(&self, board_id: &ObjectId, task_id: &ObjectId, due_at_ms: u64) -> MoveCall {
        self.call(
            ContractFunction::SetTaskDueDate,
            vec![
                object(board_id),
                id(task_id),
                CallArg::pure(PureValue::U64(due_at_ms)),
                self.clock(),
            ],
        )
    }

    /// `assign_task(board, task, assignees, clock)`
    #[must_use]
    pub fn assign_task(&self, board_id: &ObjectId, task_id: &ObjectId, assignees: &[Address]) -> MoveCall {
        self.call(
            ContractFunction::AssignTask,
            vec![
                object(board_id),
                id(task_id),
                CallArg::pure(PureValue::AddressVec(assignees.to_vec())),
                self.clock(),
            ],
        )
    }

    /// `set_task_milestone(board, task, milestone, clock)`
    #[must_use]
    pub fn set_task_milestone(&self, board_id: &ObjectId, task_id: &ObjectId, milestone: &str) -> MoveCall {
        self.call(
            ContractFunction::SetTaskMilestone,
            vec![object(board_id), id(task_id), string(milestone), self.clock()],
        )
    }

    /// `set_task_tags(board, task, tags, clock)`
    #[must_use]
    pub fn set_task_tags(&self, board_id: &ObjectId, task_id: &ObjectId, tags: &[String]) -> MoveCall {
        self.call(
            ContractFunction::SetTaskTags,
            vec![
                object(board_id),
                id(task_id),
                CallArg::pure(PureValue::StringVec(tags.to_vec())),
                self.clock(),
            ],
        )
    }

    /// `set_task_priority(board, task, priority, clock)`
    #[must_use]
    pub fn set_task_priority(&self, board_id: &ObjectId, task_id: &ObjectId, priority: Priority) -> MoveCall {
        self.call(
            ContractFunction::SetTaskPriority,
            vec![
                object(board_id),
                id(task_id),
                CallArg::pure(PureValue::U8(priority.code())),
                self.clock(),
            ],
        )
    }

    /// `delete_task(board, task)`
    #[must_use]
    pub fn delete_task(&self, board_id: &ObjectId, task_id: &ObjectId) -> MoveCall {
        self.call(
            ContractFunction::DeleteTask,
            vec![object(board_id), id(task_id)],
        )
    }

    /// `create_subtask(board, task, title, clock)`
    #[must_use]
    pub fn create_subtask(&self, board_id: &ObjectId, task_id: &ObjectId, title: &str) -> MoveCall {
        self.call(
            ContractFunction::CreateSubtask,
            vec![object(board_id), id(task_id), string(title), self.clock()],
        )
    }

    /// `toggle_subtask_done(board, task, subtask)`
    #[must_use]
    pub fn toggle_subtask_done(
        &self,
        board_id: &ObjectId,
        task_id: &ObjectId,
        subtask_id: &ObjectId,
    ) -> MoveCall {
        self.call(
            ContractFunction::ToggleSubtaskDone,
            vec![object(board_id), id(task_id), id(subtask_id)],
        )
    }

    /// `add_comment(board, task, body, is_encrypted, ciphertext, clock)`
    #[must_use]
    pub fn add_comment(
        &self,
        board_id: &ObjectId,
        task_id: &ObjectId,
        body: &str,
        ciphertext: Option<&[u8]>,
    ) -> MoveCall {
        let encrypted = PureValue::option(
            TypeTag::Vector(Box::new(TypeTag::U8)),
            ciphertext.map(|c| PureValue::Bytes(c.to_vec())),
        );
        self.call(
            ContractFunction::AddComment,
            vec![
                object(board_id),
                id(task_id),
                string(body),
                CallArg::pure(PureValue::Bool(ciphertext.is_some())),
                CallArg::pure(encrypted),
                self.clock(),
            ],
        )
    }

    /// `add_reaction(board, task, comment, emoji, clock)`
    #[must_use]
    pub fn add_reaction(
        &self,
        board_id: &ObjectId,
        task_id: &ObjectId,
        comment_id: &ObjectId,
        emoji: &str,
    ) -> MoveCall {
        self.call(
            ContractFunction::AddReaction,
            vec![
                object(board_id),
                id(task_id),
                id(comment_id),
                string(emoji),
                self.clock(),
            ],
        )
    }
}

fn object(id: &ObjectId) -> CallArg {
    CallArg::object(id.clone())
}

fn id(id: &ObjectId) -> CallArg {
    CallArg::pure(PureValue::Id(id.clone()))
}

fn string(s: &str) -> CallArg {
    CallArg::pure(PureValue::String(s.to_string()))
}

fn address(addr: &Address) -> CallArg {
    CallArg::pure(PureValue::Address(addr.clone()))
}
