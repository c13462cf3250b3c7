//! Board store: snapshot ownership and the mutation pipeline.
//!
//! [`BoardStore`] owns the [`Snapshot`] and is the only thing that writes
//! chain-derived state into it. A mutation runs
//! sign → execute → finality → settle → re-hydrate, strictly in that
//! order, and mutations touching the same board are serialized with a
//! per-board async mutex. Mutations on different boards may interleave.

mod snapshot;

pub use snapshot::Snapshot;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;

use toad_proto::call::MoveCall;
use toad_proto::contract::{Contract, CreateTaskParams};
use toad_proto::model::{ColumnId, DEFAULT_COLUMNS, Priority, Role};
use toad_proto::object::{Address, ObjectChange, ObjectId, TransactionDigest, TransactionReceipt};

use crate::chain::{ChainError, ChainReader, TransactionExecutor, with_timeout};
use crate::identity::Identity;
use crate::mapper::{self, normalize_id};
use crate::sync::{self, SyncError, SyncSettings, SyncState};

/// Errors surfaced by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A chain call failed (including wallet rejection and contract aborts).
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Discovery or hydration failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The operation needs a connected identity.
    #[error("no identity connected")]
    NotConnected,

    /// The identity holds no owner capability for the board.
    #[error("no owner capability found for board {0}")]
    NoOwnerCap(ObjectId),

    /// The transaction finished without creating a board.
    #[error("transaction {0} created no board")]
    BoardNotCreated(TransactionDigest),

    /// The board is not loaded.
    #[error("unknown board {0}")]
    UnknownBoard(ObjectId),
}

/// Owns the snapshot and runs discovery, hydration and mutations.
pub struct BoardStore<C> {
    chain: Arc<C>,
    contract: Contract,
    settings: SyncSettings,
    snapshot: RwLock<Snapshot>,
    board_locks: Mutex<HashMap<ObjectId, Arc<tokio::sync::Mutex<()>>>>,
}

impl<C: ChainReader> BoardStore<C> {
    /// Creates a store with an empty snapshot.
    #[must_use]
    pub fn new(chain: Arc<C>, contract: Contract, settings: SyncSettings) -> Self {
        Self {
            chain,
            contract,
            settings,
            snapshot: RwLock::new(Snapshot::default()),
            board_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The contract this store talks to.
    #[must_use]
    pub const fn contract(&self) -> &Contract {
        &self.contract
    }

    /// A copy of the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// Reads the snapshot without copying it.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> R {
        f(&self.snapshot.read())
    }

    /// Applies a local edit to the snapshot (see [`crate::overlay`]).
    pub fn edit_locally<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        f(&mut self.snapshot.write())
    }

    /// Connects `identity` and runs a full sync.
    ///
    /// # Errors
    ///
    /// Returns the discovery error if boards cannot be listed.
    pub async fn connect(&self, identity: Identity) -> Result<(), StoreError> {
        tracing::info!(address = %identity.address, source = ?identity.source, "identity connected");
        {
            let mut snap = self.snapshot.write();
            snap.clear();
            snap.set_identity(Some(identity));
        }
        self.refresh().await
    }

    /// Disconnects the identity and clears the snapshot.
    pub fn disconnect(&self) {
        tracing::info!("identity disconnected");
        self.snapshot.write().clear();
    }

    fn identity_address(&self) -> Result<Address, StoreError> {
        self.snapshot
            .read()
            .identity()
            .map(|i| i.address.clone())
            .ok_or(StoreError::NotConnected)
    }

    fn record<T>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        let mut snap = self.snapshot.write();
        match &result {
            Ok(_) => snap.set_last_error(None),
            Err(e) => snap.set_last_error(Some(e.to_string())),
        }
        drop(snap);
        result
    }

    /// Re-discovers and re-hydrates every board of the connected identity.
    ///
    /// Boards that fail to hydrate are logged and left out. Without an
    /// identity the snapshot is reset to idle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Sync`] if discovery fails.
    pub async fn refresh(&self) -> Result<(), StoreError> {
        let Ok(address) = self.identity_address() else {
            let mut snap = self.snapshot.write();
            snap.clear();
            snap.set_sync_state(SyncState::Idle);
            return Ok(());
        };

        let phase = |state: SyncState| self.snapshot.write().set_sync_state(state);
        let loaded = match sync::discover_boards(
            self.chain.as_ref(),
            &self.contract,
            &address,
            self.settings.rpc_timeout,
            &phase,
        )
        .await
        {
            Ok(loaded) => loaded,
            Err(e) => return self.record(Err(e.into())),
        };

        {
            let mut snap = self.snapshot.write();
            // The identity may have changed while we were loading.
            if snap.identity().map(|i| &i.address) != Some(&address) {
                tracing::debug!("identity changed during refresh, discarding result");
                return Ok(());
            }
            snap.replace_all(loaded);
            snap.set_sync_state(SyncState::Ready);
        }
        self.record(Ok(()))
    }

    /// Selects a loaded board. Returns `false` if it is not loaded.
    pub fn switch_board(&self, board_id: &ObjectId) -> bool {
        self.snapshot.write().select_board(board_id)
    }

    /// Opens a board by id, loading it even if discovery did not list it.
    ///
    /// # Errors
    ///
    /// Returns an error if the board object cannot be read or has no content.
    pub async fn load_board_by_id(&self, board_id: &ObjectId) -> Result<(), StoreError> {
        let result = self.rehydrate(board_id).await;
        if result.is_ok() {
            self.snapshot.write().select_board(board_id);
        }
        self.record(result)
    }

    async fn rehydrate(&self, board_id: &ObjectId) -> Result<(), StoreError> {
        let contents =
            sync::hydrate_board(self.chain.as_ref(), &self.contract, board_id, self.settings.rpc_timeout)
                .await?;
        self.snapshot.write().replace_board(contents);
        Ok(())
    }

    /// Resolves a column given as slug or title to the board's column title.
    fn column_title(&self, board_id: &ObjectId, column: &str) -> Result<String, StoreError> {
        let snap = self.snapshot.read();
        let board = snap
            .board(board_id)
            .ok_or_else(|| StoreError::UnknownBoard(board_id.clone()))?;
        let slug = mapper::slugify(column);
        Ok(mapper::title_from_slug(&board.columns, &slug))
    }

    /// Finds the identity's owner capability for `board_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotConnected`] without an identity, or the
    /// chain error of the owned-object listing.
    pub async fn find_owner_cap(&self, board_id: &ObjectId) -> Result<Option<ObjectId>, StoreError> {
        let address = self.identity_address()?;
        let caps = with_timeout(
            self.settings.rpc_timeout,
            self.chain.get_owned_objects(&address, &self.contract.owner_cap_type()),
        )
        .await?;
        Ok(caps
            .into_iter()
            .find(|cap| cap.field("board_id").and_then(normalize_id).as_deref() == Some(board_id.as_str()))
            .map(|cap| cap.object_id))
    }
}

impl<C> BoardStore<C>
where
    C: ChainReader + TransactionExecutor,
{
    fn board_lock(&self, board_id: &ObjectId) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.board_locks.lock().entry(board_id.clone()).or_default())
    }

    /// Runs one contract call through the full mutation pipeline and
    /// re-hydrates the board it targets.
    ///
    /// # Errors
    ///
    /// Returns the chain error if signing, execution or finality fails, or
    /// the sync error if the board cannot be re-read afterwards. The error
    /// is also recorded as the snapshot's last error.
    pub async fn execute(&self, call: &MoveCall) -> Result<TransactionReceipt, StoreError> {
        let result = self.execute_inner(call).await;
        self.record(result)
    }

    async fn execute_inner(&self, call: &MoveCall) -> Result<TransactionReceipt, StoreError> {
        let lock = call.board_id().map(|id| self.board_lock(id));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let receipt = self.submit(call).await?;
        if let Some(board_id) = call.board_id() {
            self.rehydrate(board_id).await?;
        }
        Ok(receipt)
    }

    async fn submit(&self, call: &MoveCall) -> Result<TransactionReceipt, StoreError> {
        let timeout = self.settings.rpc_timeout;
        tracing::info!(function = %call.function, board = ?call.board_id(), "submitting call");
        let digest = with_timeout(timeout, self.chain.sign_and_execute(call)).await?;
        let receipt = with_timeout(timeout, self.chain.wait_for_transaction(&digest)).await?;
        self.settle(&receipt).await;
        tracing::info!(%digest, changes = receipt.object_changes.len(), "transaction final");
        Ok(receipt)
    }

    /// Polls until every created or mutated object in `receipt` reads back
    /// at the receipt's transaction, or the settle timeout passes.
    async fn settle(&self, receipt: &TransactionReceipt) {
        let mut pending: Vec<&ObjectId> = receipt
            .object_changes
            .iter()
            .filter(|c| !matches!(c, ObjectChange::Deleted { .. }))
            .map(ObjectChange::object_id)
            .collect();
        let deadline = Instant::now() + self.settings.settle_timeout;

        loop {
            let mut still_pending = Vec::with_capacity(pending.len());
            for id in pending {
                let visible = match with_timeout(self.settings.rpc_timeout, self.chain.get_object(id)).await {
                    Ok(obj) => obj.previous_transaction.as_ref() == Some(&receipt.digest),
                    Err(_) => false,
                };
                if !visible {
                    still_pending.push(id);
                }
            }
            pending = still_pending;
            if pending.is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    digest = %receipt.digest,
                    pending = pending.len(),
                    "settle timed out, refetching anyway"
                );
                return;
            }
            tokio::time::sleep(self.settings.settle_poll).await;
        }
    }

    /// Creates a board with the default columns, selects it, and invites
    /// `members` as contributors. Returns the new board id.
    ///
    /// Member invitations that fail are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if no identity is connected, the transaction fails,
    /// or its receipt shows no created board.
    pub async fn create_board(
        &self,
        name: &str,
        description: &str,
        members: &[Address],
    ) -> Result<ObjectId, StoreError> {
        let result = self.create_board_inner(name, description, members).await;
        self.record(result)
    }

    async fn create_board_inner(
        &self,
        name: &str,
        description: &str,
        members: &[Address],
    ) -> Result<ObjectId, StoreError> {
        self.identity_address()?;
        let columns = mapper::board_column_names(Vec::new());
        let call = self.contract.create_board(name, description, &columns);
        let receipt = self.submit(&call).await?;

        let suffix = format!("{}::Board", self.contract.module);
        let board_id = receipt
            .created_with_type_suffix(&suffix)
            .cloned()
            .ok_or_else(|| StoreError::BoardNotCreated(receipt.digest.clone()))?;
        tracing::info!(board = %board_id, "board created");

        self.refresh().await?;
        if !self.switch_board(&board_id) {
            // Not listed yet by discovery; open it directly.
            self.rehydrate(&board_id).await?;
            self.switch_board(&board_id);
        }

        for member in members {
            if let Err(e) = self.add_member(&board_id, member, Role::Contributor).await {
                tracing::warn!(board = %board_id, %member, err = %e, "failed to add member");
            }
        }
        Ok(board_id)
    }

    /// Adds a member to a board using the identity's owner capability.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoOwnerCap`] if the identity does not own the
    /// board, or the error of the mutation.
    pub async fn add_member(&self, board_id: &ObjectId, member: &Address, role: Role) -> Result<(), StoreError> {
        let cap = self
            .find_owner_cap(board_id)
            .await?
            .ok_or_else(|| StoreError::NoOwnerCap(board_id.clone()))?;
        let call = self.contract.add_member(board_id, &cap, member, role);
        self.execute(&call).await.map(|_| ())
    }

    /// Creates a task. `params.column` may be a column slug or title; it is
    /// sent as the board's column title.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownBoard`] if the board is not loaded, or
    /// the error of the mutation.
    pub async fn create_task(&self, mut params: CreateTaskParams) -> Result<TransactionReceipt, StoreError> {
        let column = if params.column.is_empty() {
            DEFAULT_COLUMNS[0].to_string()
        } else {
            params.column.clone()
        };
        params.column = self.column_title(&params.board_id, &column)?;
        let call = self.contract.create_task(&params);
        self.execute(&call).await
    }

    /// Moves a task to another column on chain.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownBoard`] if the board is not loaded, or
    /// the error of the mutation.
    pub async fn move_task(
        &self,
        board_id: &ObjectId,
        task_id: &ObjectId,
        column: &ColumnId,
    ) -> Result<TransactionReceipt, StoreError> {
        let title = self.column_title(board_id, column.as_str())?;
        let call = self.contract.update_task_position(board_id, task_id, &title);
        self.execute(&call).await
    }

    /// Changes a task's priority on chain.
    ///
    /// # Errors
    ///
    /// Returns the error of the mutation.
    pub async fn set_task_priority(
        &self,
        board_id: &ObjectId,
        task_id: &ObjectId,
        priority: Priority,
    ) -> Result<TransactionReceipt, StoreError> {
        let call = self.contract.set_task_priority(board_id, task_id, priority);
        self.execute(&call).await
    }

    /// Deletes a task on chain.
    ///
    /// # Errors
    ///
    /// Returns the error of the mutation.
    pub async fn delete_task(&self, board_id: &ObjectId, task_id: &ObjectId) -> Result<TransactionReceipt, StoreError> {
        let call = self.contract.delete_task(board_id, task_id);
        self.execute(&call).await
    }
}
