//! Finding the boards visible to an identity.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use toad_proto::contract::Contract;
use toad_proto::object::{Address, DynamicFieldName, ObjectId};

use crate::chain::{ChainError, ChainReader, with_timeout};
use crate::mapper::normalize_id;

use super::hydrate::{BoardContents, hydrate_board};
use super::{SyncError, SyncState};

/// A strategy for listing board ids accessible to an identity.
pub trait BoardDiscovery: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// List board ids for `identity`. Order is preserved; duplicates are
    /// allowed and removed by the caller.
    fn discover<C: ChainReader>(
        &self,
        chain: &C,
        identity: &Address,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<ObjectId>, SyncError>> + Send;
}

/// Looks up the identity's entry in the shared board registry.
#[derive(Debug, Clone)]
pub struct RegistryDiscovery {
    registry_id: ObjectId,
}

impl RegistryDiscovery {
    /// Uses the registry configured on `contract`.
    #[must_use]
    pub fn new(contract: &Contract) -> Self {
        Self {
            registry_id: contract.registry_id.clone(),
        }
    }
}

impl BoardDiscovery for RegistryDiscovery {
    fn name(&self) -> &'static str {
        "registry"
    }

    async fn discover<C: ChainReader>(
        &self,
        chain: &C,
        identity: &Address,
        timeout: Duration,
    ) -> Result<Vec<ObjectId>, SyncError> {
        if self.registry_id.is_placeholder() {
            tracing::debug!("no registry configured, skipping registry discovery");
            return Ok(Vec::new());
        }
        let key = DynamicFieldName::address(identity);
        let entry = match with_timeout(
            timeout,
            chain.get_dynamic_field_object(&self.registry_id, &key),
        )
        .await
        {
            Ok(entry) => entry,
            // No entry means the identity has no registered boards yet.
            Err(ChainError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let boards = entry
            .fields
            .as_ref()
            .and_then(|f| f.get("value"))
            .map(|v| v.get("fields").unwrap_or(v))
            .and_then(|v| v.get("boards"))
            .and_then(Value::as_array);
        Ok(boards
            .map(|ids| {
                ids.iter()
                    .filter_map(normalize_id)
                    .map(ObjectId::new)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Scans the identity's owned objects for board owner capabilities.
#[derive(Debug, Clone)]
pub struct CapabilityScanDiscovery {
    cap_type: String,
}

impl CapabilityScanDiscovery {
    /// Scans for the capability type of `contract`.
    #[must_use]
    pub fn new(contract: &Contract) -> Self {
        Self {
            cap_type: contract.owner_cap_type(),
        }
    }
}

impl BoardDiscovery for CapabilityScanDiscovery {
    fn name(&self) -> &'static str {
        "capability-scan"
    }

    async fn discover<C: ChainReader>(
        &self,
        chain: &C,
        identity: &Address,
        timeout: Duration,
    ) -> Result<Vec<ObjectId>, SyncError> {
        let caps = with_timeout(timeout, chain.get_owned_objects(identity, &self.cap_type)).await?;
        Ok(caps
            .iter()
            .filter_map(|cap| cap.field("board_id"))
            .filter_map(normalize_id)
            .map(ObjectId::new)
            .collect())
    }
}

/// Loads the boards visible to `identity`.
///
/// The registry is tried first. Its ids are resolved to board objects, and
/// only when none of them resolve (or the registry fails or lists nothing)
/// is the capability scan run and resolved the same way. Boards that fail
/// to load are logged and dropped; duplicate ids are loaded once.
/// `phase` is told when discovery or hydration starts.
///
/// # Errors
///
/// Returns the capability scan's error if the registry produced no boards
/// and the scan failed.
pub async fn discover_boards<C: ChainReader>(
    chain: &C,
    contract: &Contract,
    identity: &Address,
    timeout: Duration,
    phase: &(dyn Fn(SyncState) + Sync),
) -> Result<Vec<BoardContents>, SyncError> {
    phase(SyncState::Discovering);
    let registry = RegistryDiscovery::new(contract);
    let ids = match registry.discover(chain, identity, timeout).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(%identity, err = %e, "registry discovery failed");
            Vec::new()
        }
    };
    phase(SyncState::Hydrating);
    let mut boards = resolve_boards(chain, contract, ids, timeout).await;
    let mut source = registry.name();

    if boards.is_empty() {
        phase(SyncState::Discovering);
        let scan = CapabilityScanDiscovery::new(contract);
        let ids = scan.discover(chain, identity, timeout).await?;
        phase(SyncState::Hydrating);
        boards = resolve_boards(chain, contract, ids, timeout).await;
        source = scan.name();
    }

    tracing::info!(%identity, source, count = boards.len(), "boards discovered");
    Ok(boards)
}

async fn resolve_boards<C: ChainReader>(
    chain: &C,
    contract: &Contract,
    mut ids: Vec<ObjectId>,
    timeout: Duration,
) -> Vec<BoardContents> {
    let mut seen = HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));

    let mut loaded = Vec::with_capacity(ids.len());
    for id in &ids {
        match hydrate_board(chain, contract, id, timeout).await {
            Ok(contents) => loaded.push(contents),
            Err(e) => tracing::warn!(board = %id, err = %e, "dropping board that failed to load"),
        }
    }
    loaded
}
