//! Declarative contract call descriptors.
//!
//! A [`MoveCall`] names one entry point of the board contract and carries its
//! positional arguments. The descriptor is handed to an external signer; this
//! crate never encodes or signs it.

use serde::{Deserialize, Serialize};

use crate::object::{Address, ObjectId};

/// Move type of a pure argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    /// `bool`
    Bool,
    /// `u8`
    U8,
    /// `u64`
    U64,
    /// `address`
    Address,
    /// `0x2::object::ID`
    Id,
    /// `0x1::string::String`
    String,
    /// `vector<T>`
    Vector(Box<TypeTag>),
    /// `0x1::option::Option<T>`
    Option(Box<TypeTag>),
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::U8 => write!(f, "u8"),
            Self::U64 => write!(f, "u64"),
            Self::Address => write!(f, "address"),
            Self::Id => write!(f, "id"),
            Self::String => write!(f, "string"),
            Self::Vector(inner) => write!(f, "vector<{inner}>"),
            Self::Option(inner) => write!(f, "option<{inner}>"),
        }
    }
}

/// A typed pure value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PureValue {
    /// `bool`
    Bool(bool),
    /// `u8`
    U8(u8),
    /// `u64`, carried as a decimal string on the wire.
    U64(#[serde(with = "u64_string")] u64),
    /// `address`
    Address(Address),
    /// `ID`
    Id(ObjectId),
    /// UTF-8 string.
    String(String),
    /// `vector<string>`
    StringVec(Vec<String>),
    /// `vector<address>`
    AddressVec(Vec<Address>),
    /// `vector<u8>`
    Bytes(Vec<u8>),
    /// `option<T>`; the inner type is kept even when the option is empty.
    Option {
        /// Inner type of the option.
        inner: TypeTag,
        /// The value, if present.
        value: Option<Box<PureValue>>,
    },
}

impl PureValue {
    /// Builds `option<T>` from an optional value.
    #[must_use]
    pub fn option(inner: TypeTag, value: Option<Self>) -> Self {
        Self::Option {
            inner,
            value: value.map(Box::new),
        }
    }

    /// The Move type of this value.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Self::Bool(_) => TypeTag::Bool,
            Self::U8(_) => TypeTag::U8,
            Self::U64(_) => TypeTag::U64,
            Self::Address(_) => TypeTag::Address,
            Self::Id(_) => TypeTag::Id,
            Self::String(_) => TypeTag::String,
            Self::StringVec(_) => TypeTag::Vector(Box::new(TypeTag::String)),
            Self::AddressVec(_) => TypeTag::Vector(Box::new(TypeTag::Address)),
            Self::Bytes(_) => TypeTag::Vector(Box::new(TypeTag::U8)),
            Self::Option { inner, .. } => TypeTag::Option(Box::new(inner.clone())),
        }
    }
}

mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One positional argument of a contract call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallArg {
    /// An object input (owned or shared), resolved by the signer.
    Object {
        /// The object's id.
        id: ObjectId,
    },
    /// A pure value.
    Pure {
        /// The typed value.
        value: PureValue,
    },
}

impl CallArg {
    /// Object argument.
    #[must_use]
    pub const fn object(id: ObjectId) -> Self {
        Self::Object { id }
    }

    /// Pure argument.
    #[must_use]
    pub const fn pure(value: PureValue) -> Self {
        Self::Pure { value }
    }

    /// Returns the object id for object arguments.
    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjectId> {
        match self {
            Self::Object { id } => Some(id),
            Self::Pure { .. } => None,
        }
    }
}

/// Entry points of the board contract module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractFunction {
    /// `create_board`
    CreateBoard,
    /// `delete_board`
    DeleteBoard,
    /// `update_board_columns`
    UpdateBoardColumns,
    /// `add_member`
    AddMember,
    /// `update_member_role`
    UpdateMemberRole,
    /// `remove_member`
    RemoveMember,
    /// `create_task`
    CreateTask,
    /// `update_task_position`
    UpdateTaskPosition,
    /// `update_task_details`
    UpdateTaskDetails,
    /// `set_task_due_date`
    SetTaskDueDate,
    /// `assign_task`
    AssignTask,
    /// `set_task_milestone`
    SetTaskMilestone,
    /// `set_task_tags`
    SetTaskTags,
    /// `set_task_priority`
    SetTaskPriority,
    /// `delete_task`
    DeleteTask,
    /// `create_subtask`
    CreateSubtask,
    /// `toggle_subtask_done`
    ToggleSubtaskDone,
    /// `add_comment`
    AddComment,
    /// `add_reaction`
    AddReaction,
}

impl ContractFunction {
    /// The Move function name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreateBoard => "create_board",
            Self::DeleteBoard => "delete_board",
            Self::UpdateBoardColumns => "update_board_columns",
            Self::AddMember => "add_member",
            Self::UpdateMemberRole => "update_member_role",
            Self::RemoveMember => "remove_member",
            Self::CreateTask => "create_task",
            Self::UpdateTaskPosition => "update_task_position",
            Self::UpdateTaskDetails => "update_task_details",
            Self::SetTaskDueDate => "set_task_due_date",
            Self::AssignTask => "assign_task",
            Self::SetTaskMilestone => "set_task_milestone",
            Self::SetTaskTags => "set_task_tags",
            Self::SetTaskPriority => "set_task_priority",
            Self::DeleteTask => "delete_task",
            Self::CreateSubtask => "create_subtask",
            Self::ToggleSubtaskDone => "toggle_subtask_done",
            Self::AddComment => "add_comment",
            Self::AddReaction => "add_reaction",
        }
    }
}

impl std::fmt::Display for ContractFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contract call, ready for an external signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCall {
    /// Package that publishes the module.
    pub package: ObjectId,
    /// Module name.
    pub module: String,
    /// Entry point.
    pub function: ContractFunction,
    /// Positional arguments in contract order.
    pub arguments: Vec<CallArg>,
}

impl MoveCall {
    /// The fully qualified call target, `<package>::<module>::<function>`.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}::{}::{}", self.package, self.module, self.function)
    }

    /// The first object argument, which for every board entry point is the board.
    #[must_use]
    pub fn board_id(&self) -> Option<&ObjectId> {
        match self.function {
            ContractFunction::CreateBoard => None,
            _ => self.arguments.first().and_then(CallArg::as_object),
        }
    }
}
