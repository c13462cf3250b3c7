//! Chain client abstraction.
//!
//! Defines the [`ChainReader`] trait (object reads) and the
//! [`TransactionExecutor`] trait (sign, execute, wait for finality) that the
//! sync engine and board store are generic over. Implementations:
//! - [`memory::InMemoryChain`]: in-process object store for tests
//! - [`rpc::RpcClient`]: JSON-RPC over HTTP (reads and finality only)
//!
//! Signing belongs to the wallet and is never implemented here.

pub mod memory;
pub mod rpc;

use std::future::Future;
use std::time::Duration;

use toad_proto::call::MoveCall;
use toad_proto::object::{
    Address, DynamicFieldInfo, DynamicFieldName, ObjectId, RawObject, TransactionDigest,
    TransactionReceipt,
};

/// Errors that can occur when talking to the chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The object does not exist or was deleted.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// The RPC node returned an error.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// A response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The wallet refused to sign or the contract aborted.
    #[error("transaction failed: {0}")]
    Execution(String),

    /// The call did not complete in time.
    #[error("chain call timed out after {0:?}")]
    Timeout(Duration),
}

/// Read access to chain objects.
pub trait ChainReader: Send + Sync {
    /// Fetch an object by id.
    ///
    /// An existing object with no readable content is returned with
    /// `fields: None`, not as an error.
    fn get_object(
        &self,
        id: &ObjectId,
    ) -> impl Future<Output = Result<RawObject, ChainError>> + Send;

    /// List the dynamic fields under `parent`.
    fn get_dynamic_fields(
        &self,
        parent: &ObjectId,
    ) -> impl Future<Output = Result<Vec<DynamicFieldInfo>, ChainError>> + Send;

    /// Fetch one dynamic field object by key.
    fn get_dynamic_field_object(
        &self,
        parent: &ObjectId,
        name: &DynamicFieldName,
    ) -> impl Future<Output = Result<RawObject, ChainError>> + Send;

    /// List objects owned by `owner` whose type equals `struct_type`.
    fn get_owned_objects(
        &self,
        owner: &Address,
        struct_type: &str,
    ) -> impl Future<Output = Result<Vec<RawObject>, ChainError>> + Send;
}

/// Submission of contract calls on behalf of the connected identity.
pub trait TransactionExecutor: Send + Sync {
    /// Sign and execute a call, returning the transaction digest.
    fn sign_and_execute(
        &self,
        call: &MoveCall,
    ) -> impl Future<Output = Result<TransactionDigest, ChainError>> + Send;

    /// Wait until the transaction is final and return its receipt.
    fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> impl Future<Output = Result<TransactionReceipt, ChainError>> + Send;
}

/// Runs a chain call with a deadline.
///
/// # Errors
///
/// Returns [`ChainError::Timeout`] if `fut` does not finish within `limit`,
/// otherwise whatever `fut` returns.
pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChainError::Timeout(limit))?
}
