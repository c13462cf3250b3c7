//! Integration tests for the mutation pipeline.
//!
//! Covers sign → execute → finality → settle → re-hydrate ordering,
//! indexer lag, per-board serialization, error recording, and how chain
//! refreshes interact with local overlay edits.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::redundant_clone)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;

use toad::chain::memory::InMemoryChain;
use toad::chain::{ChainError, ChainReader, TransactionExecutor};
use toad::identity::Identity;
use toad::store::{BoardStore, StoreError};
use toad::sync::SyncSettings;
use toad_proto::call::{ContractFunction, MoveCall};
use toad_proto::contract::{Contract, CreateTaskParams};
use toad_proto::model::{ColumnId, Priority, Role};
use toad_proto::object::{
    Address, DynamicFieldInfo, DynamicFieldName, ObjectId, RawObject, TransactionDigest,
    TransactionReceipt,
};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn alice() -> Address {
    Address::new("0xa11ce")
}

fn contract() -> Contract {
    Contract::new(ObjectId::new("0xpkg"), ObjectId::new("0xreg"))
}

fn settings() -> SyncSettings {
    SyncSettings {
        rpc_timeout: Duration::from_secs(1),
        settle_timeout: Duration::from_millis(500),
        settle_poll: Duration::from_millis(5),
    }
}

async fn connected(chain: InMemoryChain) -> (Arc<InMemoryChain>, BoardStore<InMemoryChain>) {
    let chain = Arc::new(chain);
    let store = BoardStore::new(Arc::clone(&chain), contract(), settings());
    store.connect(Identity::wallet(alice())).await.unwrap();
    (chain, store)
}

fn task_params(board_id: &ObjectId, title: &str) -> CreateTaskParams {
    CreateTaskParams {
        board_id: board_id.clone(),
        title: title.to_string(),
        ..CreateTaskParams::default()
    }
}

/// Wraps a chain and tracks how many transactions are between signing and
/// finality at once.
struct TrackingChain {
    inner: InMemoryChain,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl TrackingChain {
    fn new(inner: InMemoryChain) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl ChainReader for TrackingChain {
    async fn get_object(&self, id: &ObjectId) -> Result<RawObject, ChainError> {
        self.inner.get_object(id).await
    }

    async fn get_dynamic_fields(&self, parent: &ObjectId) -> Result<Vec<DynamicFieldInfo>, ChainError> {
        self.inner.get_dynamic_fields(parent).await
    }

    async fn get_dynamic_field_object(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> Result<RawObject, ChainError> {
        self.inner.get_dynamic_field_object(parent, name).await
    }

    async fn get_owned_objects(&self, owner: &Address, struct_type: &str) -> Result<Vec<RawObject>, ChainError> {
        self.inner.get_owned_objects(owner, struct_type).await
    }
}

impl TransactionExecutor for TrackingChain {
    async fn sign_and_execute(&self, call: &MoveCall) -> Result<TransactionDigest, ChainError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.sign_and_execute(call).await
    }

    async fn wait_for_transaction(&self, digest: &TransactionDigest) -> Result<TransactionReceipt, ChainError> {
        let receipt = self.inner.wait_for_transaction(digest).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        receipt
    }
}

// ===========================================================================
// Pipeline
// ===========================================================================

#[tokio::test]
async fn created_task_appears_after_refetch() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[("Existing", "Backlog")]);
    let (chain, store) = connected(chain).await;

    let receipt = store
        .create_task(CreateTaskParams {
            column: "in-progress".to_string(),
            priority: Some(Priority::High),
            ..task_params(&board, "Fresh")
        })
        .await
        .unwrap();

    let calls = chain.executed_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function, ContractFunction::CreateTask);
    assert_eq!(receipt.digest, TransactionDigest::new("tx-1"));

    let snap = store.snapshot();
    let tasks = snap.tasks(&board);
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[1].title, "Fresh");
    assert_eq!(tasks[1].column_id().as_str(), "in-progress");
    assert_eq!(tasks[1].priority, Priority::High);
    assert_eq!(tasks[1].chain.last_tx_digest, Some(receipt.digest.clone()));
}

#[tokio::test]
async fn empty_column_defaults_to_backlog() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &["Inbox", "Done"], &[]);
    let (_chain, store) = connected(chain).await;

    store.create_task(task_params(&board, "Triage me")).await.unwrap();

    let snap = store.snapshot();
    assert_eq!(snap.tasks(&board)[0].column_id().as_str(), "backlog");
}

#[tokio::test]
async fn settle_waits_out_indexer_lag() {
    let chain = InMemoryChain::new(contract(), alice()).with_visibility_lag(3);
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[]);
    let (chain, store) = connected(chain).await;
    let reads_before = chain.object_reads();

    store.create_task(task_params(&board, "Lagged")).await.unwrap();

    // Stale reads are spent polling, so the refetch sees the write.
    assert!(chain.object_reads() - reads_before > 4);
    let snap = store.snapshot();
    assert_eq!(snap.tasks(&board).len(), 1);
    assert_eq!(snap.tasks(&board)[0].title, "Lagged");
}

#[tokio::test]
async fn settle_gives_up_at_its_deadline() {
    let chain = InMemoryChain::new(contract(), alice()).with_visibility_lag(10_000);
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[]);
    let chain = Arc::new(chain);
    let store = BoardStore::new(
        Arc::clone(&chain),
        contract(),
        SyncSettings {
            settle_timeout: Duration::from_millis(30),
            ..settings()
        },
    );
    store.connect(Identity::wallet(alice())).await.unwrap();

    let result = store.create_task(task_params(&board, "Slow")).await;

    // The transaction succeeded; the refetch simply still sees old state.
    assert!(result.is_ok());
    assert!(store.snapshot().tasks(&board).is_empty());
    assert_eq!(store.snapshot().last_error(), None);
}

#[tokio::test]
async fn move_and_delete_update_the_board() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[("A", "Backlog"), ("B", "Backlog")]);
    let (_chain, store) = connected(chain).await;
    let ids: Vec<ObjectId> = store.snapshot().tasks(&board).iter().map(|t| t.id.clone()).collect();

    store.move_task(&board, &ids[0], &ColumnId::new("done")).await.unwrap();
    store.delete_task(&board, &ids[1]).await.unwrap();

    let snap = store.snapshot();
    let tasks = snap.tasks(&board);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, ids[0]);
    assert_eq!(tasks[0].column_id().as_str(), "done");
}

#[tokio::test]
async fn move_sends_the_column_title() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[("A", "Backlog")]);
    let (chain, store) = connected(chain).await;
    let task = store.snapshot().tasks(&board)[0].id.clone();

    store.move_task(&board, &task, &ColumnId::new("in-progress")).await.unwrap();

    let calls = chain.executed_calls();
    let column = serde_json::to_value(&calls[0].arguments[2]).unwrap();
    assert_eq!(column["value"]["value"], "In Progress");
}

#[tokio::test]
async fn unknown_board_is_rejected_before_signing() {
    let (chain, store) = connected(InMemoryChain::new(contract(), alice())).await;
    let missing = ObjectId::new("0x404");

    let err = store.create_task(task_params(&missing, "Nowhere")).await.unwrap_err();

    assert_eq!(err, StoreError::UnknownBoard(missing));
    assert!(chain.executed_calls().is_empty());
}

// ===========================================================================
// Errors
// ===========================================================================

#[tokio::test]
async fn rejection_is_recorded_then_cleared_by_success() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[("A", "Backlog")]);
    let (chain, store) = connected(chain).await;
    let task = store.snapshot().tasks(&board)[0].id.clone();

    chain.reject_next_execution("user rejected the request");
    let err = store.set_task_priority(&board, &task, Priority::Low).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Chain(ChainError::Execution("user rejected the request".to_string()))
    );
    assert!(
        store
            .snapshot()
            .last_error()
            .unwrap()
            .contains("user rejected the request")
    );
    assert!(chain.executed_calls().is_empty());

    store.set_task_priority(&board, &task, Priority::Low).await.unwrap();
    assert_eq!(store.snapshot().last_error(), None);
}

#[tokio::test]
async fn mutations_need_an_identity_for_board_creation() {
    let chain = Arc::new(InMemoryChain::new(contract(), alice()));
    let store = BoardStore::new(Arc::clone(&chain), contract(), settings());

    let err = store.create_board("Orphan", "", &[]).await.unwrap_err();

    assert_eq!(err, StoreError::NotConnected);
    assert!(chain.executed_calls().is_empty());
}

// ===========================================================================
// Board creation and membership
// ===========================================================================

#[tokio::test]
async fn create_board_invites_members_as_contributors() {
    let (chain, store) = connected(InMemoryChain::new(contract(), alice())).await;
    let bob = Address::new("0xb0b");

    let board = store.create_board("Launch", "Q3 launch", &[bob.clone()]).await.unwrap();

    let functions: Vec<ContractFunction> = chain.executed_calls().iter().map(|c| c.function).collect();
    assert_eq!(functions, vec![ContractFunction::CreateBoard, ContractFunction::AddMember]);

    let snap = store.snapshot();
    assert_eq!(snap.current_board().map(|b| &b.id), Some(&board));
    let members: Vec<(&Address, Role)> = snap.members(&board).iter().map(|m| (&m.address, m.role)).collect();
    assert_eq!(members, vec![(&alice(), Role::Admin), (&bob, Role::Contributor)]);
}

#[tokio::test]
async fn failed_invitation_keeps_the_board() {
    let (chain, store) = connected(InMemoryChain::new(contract(), alice())).await;
    let bob = Address::new("0xb0b");
    let carol = Address::new("0xca401");

    let board = store.create_board("Launch", "", &[]).await.unwrap();
    chain.reject_next_execution("declined");
    let first = store.add_member(&board, &bob, Role::Viewer).await;
    let second = store.add_member(&board, &carol, Role::Viewer).await;

    assert!(first.is_err());
    assert!(second.is_ok());
    let snap = store.snapshot();
    assert_eq!(snap.members(&board).len(), 2);
    assert_eq!(snap.members(&board)[1].address, carol);
}

// ===========================================================================
// Serialization
// ===========================================================================

#[tokio::test]
async fn same_board_mutations_do_not_overlap() {
    let inner = InMemoryChain::new(contract(), alice());
    let board = inner.seed_board(&alice(), "Roadmap", &[], &[("A", "Backlog"), ("B", "Backlog")]);
    let chain = Arc::new(TrackingChain::new(inner));
    let store = BoardStore::new(Arc::clone(&chain), contract(), settings());
    store.connect(Identity::wallet(alice())).await.unwrap();
    let ids: Vec<ObjectId> = store.snapshot().tasks(&board).iter().map(|t| t.id.clone()).collect();

    let done = ColumnId::new("done");
    let (a, b) = tokio::join!(
        store.move_task(&board, &ids[0], &done),
        store.move_task(&board, &ids[1], &done),
    );

    a.unwrap();
    b.unwrap();
    assert_eq!(chain.peak(), 1);
    let snap = store.snapshot();
    assert!(snap.tasks(&board).iter().all(|t| t.column_id() == &done));
}

#[tokio::test]
async fn different_boards_may_interleave() {
    let inner = InMemoryChain::new(contract(), alice());
    let first = inner.seed_board(&alice(), "One", &[], &[("A", "Backlog")]);
    let second = inner.seed_board(&alice(), "Two", &[], &[("B", "Backlog")]);
    let chain = Arc::new(TrackingChain::new(inner));
    let store = BoardStore::new(Arc::clone(&chain), contract(), settings());
    store.connect(Identity::wallet(alice())).await.unwrap();
    let a = store.snapshot().tasks(&first)[0].id.clone();
    let b = store.snapshot().tasks(&second)[0].id.clone();

    let (ra, rb) = tokio::join!(
        store.set_task_priority(&first, &a, Priority::High),
        store.set_task_priority(&second, &b, Priority::High),
    );

    ra.unwrap();
    rb.unwrap();
    assert_eq!(chain.peak(), 2);
}

// ===========================================================================
// Overlay vs chain state
// ===========================================================================

#[tokio::test]
async fn subtask_toggle_stays_local_until_resync() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[]);
    let task = ObjectId::new("0x7a5c99");
    chain.insert_object(RawObject::with_fields(
        board.clone(),
        json!({
            "name": "Roadmap",
            "columns": [],
            "task_ids": [task.as_str()],
        }),
    ));
    chain.insert_object(RawObject::with_fields(
        task.clone(),
        json!({
            "title": "Launch",
            "column": "Backlog",
            "subtasks": [
                { "id": "0x5b1", "title": "Draft", "done": false },
                { "id": "0x5b2", "title": "Review", "done": true },
            ],
        }),
    ));
    let (chain, store) = connected(chain).await;
    let before = store.snapshot().find_task(&task).unwrap().clone();
    let calls_before = chain.executed_calls().len();

    let completed = store
        .edit_locally(|snap| snap.toggle_subtask(&task, "0x5b1"))
        .unwrap();
    assert!(completed);

    let mut expected = before.clone();
    expected.subtasks[0].completed = true;
    let snap = store.snapshot();
    assert_eq!(snap.find_task(&task).unwrap(), &expected);
    assert_eq!(snap.pending_local_edits(&board), 1);
    assert_eq!(chain.executed_calls().len(), calls_before);

    store.refresh().await.unwrap();

    let snap = store.snapshot();
    assert_eq!(snap.find_task(&task).unwrap(), &before);
    assert_eq!(snap.pending_local_edits(&board), 0);
    assert_eq!(chain.executed_calls().len(), calls_before);
}

#[tokio::test]
async fn refresh_discards_local_edits() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[("A", "Backlog")]);
    let (_chain, store) = connected(chain).await;
    let task = store.snapshot().tasks(&board)[0].id.clone();

    store
        .edit_locally(|snap| snap.move_task_locally(&task, ColumnId::new("done")))
        .unwrap();
    store
        .edit_locally(|snap| snap.add_comment(&task, "looks good", "alice"))
        .unwrap();
    assert_eq!(store.snapshot().pending_local_edits(&board), 2);
    assert_eq!(store.snapshot().find_task(&task).unwrap().column_id().as_str(), "done");

    store.refresh().await.unwrap();

    let snap = store.snapshot();
    assert_eq!(snap.pending_local_edits(&board), 0);
    let reloaded = snap.find_task(&task).unwrap();
    assert_eq!(reloaded.column_id().as_str(), "backlog");
    assert!(reloaded.comments.is_empty());
}

#[tokio::test]
async fn mutation_replaces_the_locally_edited_task_list() {
    let chain = InMemoryChain::new(contract(), alice());
    let board = chain.seed_board(&alice(), "Roadmap", &[], &[("A", "Backlog"), ("B", "Backlog")]);
    let (_chain, store) = connected(chain).await;
    let ids: Vec<ObjectId> = store.snapshot().tasks(&board).iter().map(|t| t.id.clone()).collect();

    let removed = store
        .edit_locally(|snap| snap.remove_task_locally(&ids[1]))
        .unwrap();
    assert_eq!(removed.title, "B");
    assert_eq!(store.snapshot().tasks(&board).len(), 1);

    store.set_task_priority(&board, &ids[0], Priority::Low).await.unwrap();

    let snap = store.snapshot();
    assert_eq!(snap.tasks(&board).len(), 2);
    assert_eq!(snap.pending_local_edits(&board), 0);
}
