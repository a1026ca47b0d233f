//! VaultSync Sync - Sync round coordination
//!
//! Provides:
//! - Ports for the local store, the remote vault and the apply engine
//! - A per-account serialized sync round (fetch, diff, apply)
//! - A transactional reference vault with pluggable content merge
//! - In-memory and JSON-file adapters
//!
//! ## Modules
//!
//! - [`coordinator`] - Runs sync rounds, one at a time per account
//! - [`apply`] - Applies a diff to a vault state as one transaction
//! - [`memory`] - In-memory adapter for all three ports
//! - [`file_store`] - JSON-file adapter (atomic writes)

pub mod apply;
pub mod coordinator;
pub mod file_store;
pub mod memory;
pub mod ports;

use thiserror::Error;

use vaultsync_core::domain::ItemId;
use vaultsync_diff::DiffError;

pub use apply::{default_revision_step, FieldUnionMerge, MergeHook, VaultState};
pub use coordinator::{SyncCoordinator, SyncReport};
pub use file_store::JsonFileVault;
pub use memory::MemoryVault;
pub use ports::{ApplyOutcome, IApplyEngine, ILocalVaultStore, IRemoteVault};

/// Errors that can occur during a sync round
#[derive(Debug, Error)]
pub enum SyncError {
    /// The diff engine rejected its inputs
    #[error("Diff error: {0}")]
    Diff(#[from] DiffError),

    /// Loading the local replica failed
    #[error("Local store error: {0:#}")]
    LocalStore(anyhow::Error),

    /// Fetching the remote snapshot failed
    #[error("Remote error: {0:#}")]
    Remote(anyhow::Error),

    /// Applying the diff failed; nothing was committed
    #[error("Apply failed for item {item}: {reason}")]
    Apply { item: ItemId, reason: String },

    /// The apply port itself failed
    #[error("Apply engine error: {0:#}")]
    ApplyEngine(anyhow::Error),

    /// An I/O error occurred while reading or writing vault files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A vault file could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
