//! Board discovery and hydration.
//!
//! Discovery finds the boards an identity can see: the shared registry is
//! consulted first and the identity's owner capabilities are scanned when
//! none of the registry's boards can be loaded. Hydration loads one board
//! with its members and tasks. Individual member and task records that fail
//! to load are logged and skipped; only the board object itself is required.

pub mod discovery;
pub mod hydrate;

use std::time::Duration;

use serde::Serialize;

use toad_proto::object::ObjectId;

use crate::chain::ChainError;

pub use discovery::{BoardDiscovery, CapabilityScanDiscovery, RegistryDiscovery, discover_boards};
pub use hydrate::{BoardContents, hydrate_board};

/// Where a sync run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No identity connected.
    #[default]
    Idle,
    /// Looking up which boards the identity can see.
    Discovering,
    /// Loading board contents.
    Hydrating,
    /// Snapshot published.
    Ready,
}

/// Errors that abort a sync step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// A required chain read failed.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The board object exists but carries no fields.
    #[error("board {0} has no readable content")]
    EmptyBoard(ObjectId),
}

/// Timing knobs for chain reads and post-transaction settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Deadline for each individual chain call.
    pub rpc_timeout: Duration,
    /// Upper bound on waiting for a transaction's writes to become readable.
    pub settle_timeout: Duration,
    /// Delay between settle polls.
    pub settle_poll: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(15),
            settle_timeout: Duration::from_millis(5000),
            settle_poll: Duration::from_millis(250),
        }
    }
}
