//! In-memory chain for testing.
//!
//! [`InMemoryChain`] keeps objects, dynamic fields and owned-object lists in
//! process and implements both [`ChainReader`] and [`TransactionExecutor`].
//! Executing a call applies the part of the board contract's behavior that
//! the client depends on (boards, tasks, members, registry entries), so a
//! mutation followed by a re-hydration can be exercised end to end.
//!
//! Failure injection: individual object reads can be made to fail, the next
//! execution can be rejected, and written objects can stay stale for a
//! number of reads to imitate indexer lag.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde_json::{Value, json};

use toad_proto::call::{CallArg, ContractFunction, MoveCall, PureValue};
use toad_proto::contract::Contract;
use toad_proto::object::{
    Address, DynamicFieldInfo, DynamicFieldName, ObjectChange, ObjectId, Owner, RawObject,
    TransactionDigest, TransactionReceipt,
};

use super::{ChainError, ChainReader, TransactionExecutor};

#[derive(Debug, Clone)]
struct FieldEntry {
    info: DynamicFieldInfo,
    object: RawObject,
}

#[derive(Debug, Default)]
struct State {
    objects: HashMap<ObjectId, RawObject>,
    dynamic_fields: HashMap<ObjectId, Vec<FieldEntry>>,
    owned: HashMap<Address, Vec<ObjectId>>,
    failing: HashSet<ObjectId>,
    /// Object id -> (value served while stale, reads left).
    stale: HashMap<ObjectId, (Option<RawObject>, u32)>,
    receipts: HashMap<TransactionDigest, TransactionReceipt>,
    executed: Vec<MoveCall>,
    reject_next: Option<String>,
    object_reads: usize,
    next_id: u64,
    visibility_lag: u32,
}

impl State {
    fn fresh_id(&mut self, prefix: &str) -> ObjectId {
        self.next_id += 1;
        ObjectId::new(format!("0x{prefix}{:04x}", self.next_id))
    }

    /// Replace an object, keeping the previous version visible for the
    /// configured number of reads.
    fn write(&mut self, object: RawObject) {
        let id = object.object_id.clone();
        if self.visibility_lag > 0 {
            let previous = self.objects.get(&id).cloned();
            self.stale.insert(id.clone(), (previous, self.visibility_lag));
        }
        self.objects.insert(id, object);
    }

    fn read(&mut self, id: &ObjectId) -> Option<RawObject> {
        if let Some((served, left)) = self.stale.get_mut(id) {
            if *left > 0 {
                *left -= 1;
                return served.clone();
            }
            self.stale.remove(id);
        }
        self.objects.get(id).cloned()
    }

    fn fields_mut(&mut self, id: &ObjectId) -> Option<&mut serde_json::Map<String, Value>> {
        self.objects
            .get_mut(id)?
            .fields
            .as_mut()
            .and_then(Value::as_object_mut)
    }
}

/// In-process chain backed by hash maps.
pub struct InMemoryChain {
    contract: Contract,
    sender: Address,
    state: Mutex<State>,
}

impl InMemoryChain {
    /// Creates an empty chain for `contract`, executing as `sender`.
    #[must_use]
    pub fn new(contract: Contract, sender: Address) -> Self {
        Self {
            contract,
            sender,
            state: Mutex::new(State::default()),
        }
    }

    /// Keep each written object stale for `reads` subsequent reads.
    #[must_use]
    pub fn with_visibility_lag(self, reads: u32) -> Self {
        self.state.lock().visibility_lag = reads;
        self
    }

    /// The contract this chain serves.
    #[must_use]
    pub const fn contract(&self) -> &Contract {
        &self.contract
    }

    /// Insert or replace an object.
    pub fn insert_object(&self, object: RawObject) {
        self.state.lock().objects.insert(object.object_id.clone(), object);
    }

    /// Insert an object and list it as owned by `owner`.
    pub fn insert_owned(&self, owner: &Address, object: RawObject) {
        let mut state = self.state.lock();
        state
            .owned
            .entry(owner.clone())
            .or_default()
            .push(object.object_id.clone());
        state.objects.insert(object.object_id.clone(), object);
    }

    /// Attach a dynamic field under `parent`.
    pub fn insert_dynamic_field(&self, parent: &ObjectId, name: DynamicFieldName, object: RawObject) {
        let entry = FieldEntry {
            info: DynamicFieldInfo {
                name,
                object_id: object.object_id.clone(),
                object_type: object.object_type.clone(),
            },
            object,
        };
        let mut state = self.state.lock();
        let entries = state.dynamic_fields.entry(parent.clone()).or_default();
        entries.retain(|e| e.info.name != entry.info.name);
        entries.push(entry);
    }

    /// Make every read of `id` fail.
    pub fn fail_object(&self, id: &ObjectId) {
        self.state.lock().failing.insert(id.clone());
    }

    /// Reject the next [`sign_and_execute`](TransactionExecutor::sign_and_execute) call.
    pub fn reject_next_execution(&self, reason: &str) {
        self.state.lock().reject_next = Some(reason.to_string());
    }

    /// Calls executed so far, in order.
    #[must_use]
    pub fn executed_calls(&self) -> Vec<MoveCall> {
        self.state.lock().executed.clone()
    }

    /// Number of `get_object` calls served.
    #[must_use]
    pub fn object_reads(&self) -> usize {
        self.state.lock().object_reads
    }

    /// Seed a board with the given columns and task objects.
    ///
    /// Creates the board object, its members table (with `admin` as role 0),
    /// a capability object owned by `admin`, and one task object per entry
    /// in `tasks`. Returns the board id.
    pub fn seed_board(
        &self,
        admin: &Address,
        name: &str,
        columns: &[&str],
        tasks: &[(&str, &str)],
    ) -> ObjectId {
        let mut state = self.state.lock();
        let board_id = state.fresh_id("b0a4d");
        let table_id = state.fresh_id("7ab1e");
        let cap_id = state.fresh_id("ca9");

        let mut task_ids = Vec::new();
        for (title, column) in tasks {
            let task_id = state.fresh_id("7a5c");
            let task = RawObject {
                object_id: task_id.clone(),
                object_type: Some(self.contract.struct_type("Task")),
                owner: Some(Owner::ObjectOwner(board_id.clone())),
                previous_transaction: None,
                fields: Some(task_fields(title, "", column, None, None, &[])),
            };
            state.objects.insert(task_id.clone(), task);
            task_ids.push(Value::String(task_id.as_str().to_string()));
        }

        let board = RawObject {
            object_id: board_id.clone(),
            object_type: Some(self.contract.board_type()),
            owner: Some(Owner::Shared {
                initial_shared_version: 1,
            }),
            previous_transaction: None,
            fields: Some(json!({
                "id": { "id": board_id.as_str() },
                "name": name,
                "description": "",
                "columns": columns,
                "task_ids": task_ids,
                "members": { "fields": { "id": { "id": table_id.as_str() }, "size": "1" } },
                "created_at_ms": "1700000000000",
            })),
        };
        state.objects.insert(board_id.clone(), board);

        let member = member_entry(&mut state, admin, 0);
        state
            .dynamic_fields
            .entry(table_id)
            .or_default()
            .push(member);

        let cap = RawObject {
            object_id: cap_id.clone(),
            object_type: Some(self.contract.owner_cap_type()),
            owner: Some(Owner::AddressOwner(admin.clone())),
            previous_transaction: None,
            fields: Some(json!({ "id": { "id": cap_id.as_str() }, "board_id": board_id.as_str() })),
        };
        state.owned.entry(admin.clone()).or_default().push(cap_id.clone());
        state.objects.insert(cap_id, cap);

        board_id
    }

    /// Record `boards` in the shared registry under `member`.
    pub fn register_boards(&self, member: &Address, boards: &[ObjectId]) {
        let registry = self.contract.registry_id.clone();
        let mut state = self.state.lock();
        register(&mut state, &registry, member, boards);
    }

    fn apply(&self, state: &mut State, call: &MoveCall, digest: &TransactionDigest) -> Vec<ObjectChange> {
        let mut changes = Vec::new();
        match call.function {
            ContractFunction::CreateBoard => {
                let board_id = state.fresh_id("b0a4d");
                let table_id = state.fresh_id("7ab1e");
                let cap_id = state.fresh_id("ca9");
                let columns = arg_strings(call, 2);
                state.write(RawObject {
                    object_id: board_id.clone(),
                    object_type: Some(self.contract.board_type()),
                    owner: Some(Owner::Shared {
                        initial_shared_version: 1,
                    }),
                    previous_transaction: Some(digest.clone()),
                    fields: Some(json!({
                        "name": arg_string(call, 0),
                        "description": arg_string(call, 1),
                        "columns": columns,
                        "task_ids": [],
                        "members": { "fields": { "id": { "id": table_id.as_str() } } },
                    })),
                });
                let member = member_entry(state, &self.sender, 0);
                state.dynamic_fields.entry(table_id).or_default().push(member);
                state.objects.insert(
                    cap_id.clone(),
                    RawObject {
                        object_id: cap_id.clone(),
                        object_type: Some(self.contract.owner_cap_type()),
                        owner: Some(Owner::AddressOwner(self.sender.clone())),
                        previous_transaction: Some(digest.clone()),
                        fields: Some(json!({ "board_id": board_id.as_str() })),
                    },
                );
                state.owned.entry(self.sender.clone()).or_default().push(cap_id.clone());
                if self.contract.has_registry() {
                    let mut boards = registered_boards(state, &self.contract.registry_id, &self.sender);
                    boards.push(board_id.clone());
                    register(state, &self.contract.registry_id, &self.sender, &boards);
                }
                changes.push(ObjectChange::Created {
                    object_id: board_id,
                    object_type: self.contract.board_type(),
                });
                changes.push(ObjectChange::Created {
                    object_id: cap_id,
                    object_type: self.contract.owner_cap_type(),
                });
            }
            ContractFunction::CreateTask => {
                let Some(board_id) = call.board_id().cloned() else {
                    return changes;
                };
                let task_id = state.fresh_id("7a5c");
                let fields = task_fields(
                    &arg_string(call, 1),
                    &arg_string(call, 2),
                    &arg_string(call, 3),
                    arg_option_u64(call, 4),
                    arg_option_u64(call, 5),
                    &arg_strings(call, 8),
                );
                state.write(RawObject {
                    object_id: task_id.clone(),
                    object_type: Some(self.contract.struct_type("Task")),
                    owner: Some(Owner::ObjectOwner(board_id.clone())),
                    previous_transaction: Some(digest.clone()),
                    fields: Some(fields),
                });
                if let Some(mut board) = state.objects.get(&board_id).cloned() {
                    if let Some(ids) = board
                        .fields
                        .as_mut()
                        .and_then(|f| f.get_mut("task_ids"))
                        .and_then(Value::as_array_mut)
                    {
                        ids.push(Value::String(task_id.as_str().to_string()));
                    }
                    board.previous_transaction = Some(digest.clone());
                    state.write(board);
                }
                changes.push(ObjectChange::Created {
                    object_id: task_id,
                    object_type: self.contract.struct_type("Task"),
                });
                changes.push(self.mutated_board(board_id));
            }
            ContractFunction::UpdateTaskPosition => {
                if let Some(task_id) = arg_id(call, 1)
                    && let Some(mut task) = state.objects.get(&task_id).cloned()
                {
                    if let Some(fields) = task.fields.as_mut().and_then(Value::as_object_mut) {
                        fields.insert("column".to_string(), Value::String(arg_string(call, 2)));
                    }
                    task.previous_transaction = Some(digest.clone());
                    state.write(task);
                    changes.push(ObjectChange::Mutated {
                        object_id: task_id,
                        object_type: self.contract.struct_type("Task"),
                    });
                }
            }
            ContractFunction::DeleteTask => {
                if let (Some(board_id), Some(task_id)) = (call.board_id().cloned(), arg_id(call, 1)) {
                    state.objects.remove(&task_id);
                    if let Some(ids) = state
                        .fields_mut(&board_id)
                        .and_then(|f| f.get_mut("task_ids"))
                        .and_then(Value::as_array_mut)
                    {
                        ids.retain(|v| v.as_str() != Some(task_id.as_str()));
                    }
                    touch(state, &board_id, digest);
                    changes.push(ObjectChange::Deleted { object_id: task_id });
                    changes.push(self.mutated_board(board_id));
                }
            }
            ContractFunction::AddMember => {
                if let (Some(board_id), Some(PureValue::Address(member))) =
                    (call.board_id().cloned(), arg_pure(call, 2))
                {
                    let role = match arg_pure(call, 3) {
                        Some(PureValue::U8(r)) => u64::from(*r),
                        _ => 1,
                    };
                    let table = state
                        .objects
                        .get(&board_id)
                        .and_then(|b| b.field("members"))
                        .and_then(|m| m.pointer("/fields/id/id"))
                        .and_then(Value::as_str)
                        .map(ObjectId::new);
                    if let Some(table) = table {
                        let entry = member_entry(state, member, role);
                        let entries = state.dynamic_fields.entry(table).or_default();
                        entries.retain(|e| e.info.name != entry.info.name);
                        entries.push(entry);
                    }
                    if self.contract.has_registry() {
                        let mut boards = registered_boards(state, &self.contract.registry_id, member);
                        if !boards.contains(&board_id) {
                            boards.push(board_id.clone());
                        }
                        register(state, &self.contract.registry_id, member, &boards);
                    }
                    touch(state, &board_id, digest);
                    changes.push(self.mutated_board(board_id));
                }
            }
            _ => {
                if let Some(board_id) = call.board_id().cloned() {
                    touch(state, &board_id, digest);
                    changes.push(self.mutated_board(board_id));
                }
            }
        }
        changes
    }

    fn mutated_board(&self, object_id: ObjectId) -> ObjectChange {
        ObjectChange::Mutated {
            object_id,
            object_type: self.contract.board_type(),
        }
    }
}

impl ChainReader for InMemoryChain {
    async fn get_object(&self, id: &ObjectId) -> Result<RawObject, ChainError> {
        let mut state = self.state.lock();
        state.object_reads += 1;
        if state.failing.contains(id) {
            return Err(ChainError::Rpc(format!("injected failure for {id}")));
        }
        state.read(id).ok_or_else(|| ChainError::NotFound(id.clone()))
    }

    async fn get_dynamic_fields(&self, parent: &ObjectId) -> Result<Vec<DynamicFieldInfo>, ChainError> {
        let state = self.state.lock();
        Ok(state
            .dynamic_fields
            .get(parent)
            .map(|entries| entries.iter().map(|e| e.info.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_dynamic_field_object(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> Result<RawObject, ChainError> {
        let state = self.state.lock();
        state
            .dynamic_fields
            .get(parent)
            .and_then(|entries| entries.iter().find(|e| &e.info.name == name))
            .map(|e| e.object.clone())
            .ok_or_else(|| ChainError::NotFound(parent.clone()))
    }

    async fn get_owned_objects(
        &self,
        owner: &Address,
        struct_type: &str,
    ) -> Result<Vec<RawObject>, ChainError> {
        let state = self.state.lock();
        let ids = state.owned.get(owner).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| state.objects.get(id))
            .filter(|obj| obj.object_type.as_deref() == Some(struct_type))
            .cloned()
            .collect())
    }
}

impl TransactionExecutor for InMemoryChain {
    async fn sign_and_execute(&self, call: &MoveCall) -> Result<TransactionDigest, ChainError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.reject_next.take() {
            return Err(ChainError::Execution(reason));
        }
        state.executed.push(call.clone());
        let digest = TransactionDigest::new(format!("tx-{}", state.executed.len()));
        let object_changes = self.apply(&mut state, call, &digest);
        state.receipts.insert(
            digest.clone(),
            TransactionReceipt {
                digest: digest.clone(),
                object_changes,
            },
        );
        Ok(digest)
    }

    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionReceipt, ChainError> {
        self.state
            .lock()
            .receipts
            .get(digest)
            .cloned()
            .ok_or_else(|| ChainError::Execution(format!("unknown transaction {digest}")))
    }
}

fn task_fields(
    title: &str,
    description: &str,
    column: &str,
    priority: Option<u64>,
    due_at_ms: Option<u64>,
    tags: &[String],
) -> Value {
    json!({
        "title": title,
        "description": description,
        "column": column,
        "priority": priority,
        "due_at_ms": due_at_ms.map(|ms| ms.to_string()),
        "assignees": [],
        "milestone": null,
        "tags": tags,
        "is_encrypted": false,
        "created_at_ms": "1700000000000",
        "updated_at_ms": "1700000000000",
    })
}

fn member_entry(state: &mut State, member: &Address, role: u64) -> FieldEntry {
    let object_id = state.fresh_id("3e3b");
    let name = DynamicFieldName::address(member);
    FieldEntry {
        info: DynamicFieldInfo {
            name,
            object_id: object_id.clone(),
            object_type: None,
        },
        object: RawObject::with_fields(object_id, json!({ "name": member.as_str(), "value": role })),
    }
}

fn registered_boards(state: &State, registry: &ObjectId, member: &Address) -> Vec<ObjectId> {
    let name = DynamicFieldName::address(member);
    state
        .dynamic_fields
        .get(registry)
        .and_then(|entries| entries.iter().find(|e| e.info.name == name))
        .and_then(|e| e.object.fields.as_ref())
        .and_then(|f| f.pointer("/value/fields/boards"))
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_str).map(ObjectId::new).collect())
        .unwrap_or_default()
}

fn register(state: &mut State, registry: &ObjectId, member: &Address, boards: &[ObjectId]) {
    let object_id = state.fresh_id("4e9");
    let name = DynamicFieldName::address(member);
    let ids: Vec<&str> = boards.iter().map(ObjectId::as_str).collect();
    let entry = FieldEntry {
        info: DynamicFieldInfo {
            name: name.clone(),
            object_id: object_id.clone(),
            object_type: None,
        },
        object: RawObject::with_fields(
            object_id,
            json!({ "name": member.as_str(), "value": { "fields": { "boards": ids } } }),
        ),
    };
    let entries = state.dynamic_fields.entry(registry.clone()).or_default();
    entries.retain(|e| e.info.name != name);
    entries.push(entry);
}

fn touch(state: &mut State, id: &ObjectId, digest: &TransactionDigest) {
    if let Some(mut object) = state.objects.get(id).cloned() {
        object.previous_transaction = Some(digest.clone());
        state.write(object);
    }
}

fn arg_pure(call: &MoveCall, index: usize) -> Option<&PureValue> {
    match call.arguments.get(index)? {
        CallArg::Pure { value } => Some(value),
        CallArg::Object { .. } => None,
    }
}

fn arg_string(call: &MoveCall, index: usize) -> String {
    match arg_pure(call, index) {
        Some(PureValue::String(s)) => s.clone(),
        _ => String::new(),
    }
}

fn arg_strings(call: &MoveCall, index: usize) -> Vec<String> {
    match arg_pure(call, index) {
        Some(PureValue::StringVec(v)) => v.clone(),
        _ => Vec::new(),
    }
}

fn arg_id(call: &MoveCall, index: usize) -> Option<ObjectId> {
    match arg_pure(call, index)? {
        PureValue::Id(id) => Some(id.clone()),
        _ => None,
    }
}

fn arg_option_u64(call: &MoveCall, index: usize) -> Option<u64> {
    match arg_pure(call, index)? {
        PureValue::Option { value, .. } => match value.as_deref()? {
            PureValue::U8(v) => Some(u64::from(*v)),
            PureValue::U64(v) => Some(*v),
            _ => None,
        },
        _ => None,
    }
}
