//! Driven ports of a sync round
//!
//! The diff engine performs no I/O. A sync round reads both sides through
//! these traits and hands the diff to an apply engine.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage and transport errors are
//!   adapter-specific.
//! - Items cross the ports by value: the diff moves them into its action
//!   lists and the apply engine consumes them.

use async_trait::async_trait;
use serde::Serialize;

use vaultsync_core::domain::AccountId;
use vaultsync_diff::SyncDiff;

/// Counts of what an apply engine actually executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// Remote items written into the local replica
    pub pulled: usize,
    /// Local items written to the remote (creates and updates)
    pub pushed: usize,
    /// Items reconciled through the merge hook
    pub merged: usize,
    /// Local replica entries removed
    pub deleted_local: usize,
    /// Remote items removed
    pub deleted_remote: usize,
}

impl ApplyOutcome {
    /// Total number of executed actions
    pub fn total(&self) -> usize {
        self.pulled + self.pushed + self.merged + self.deleted_local + self.deleted_remote
    }
}

/// Supplies the decrypted local replica of an account
#[async_trait]
pub trait ILocalVaultStore<L: Send + 'static>: Send + Sync {
    /// Loads every local item of the account, tombstones included
    async fn load_items(&self, account: AccountId) -> anyhow::Result<Vec<L>>;
}

/// Supplies the server snapshot of an account
#[async_trait]
pub trait IRemoteVault<R: Send + 'static>: Send + Sync {
    /// Fetches every remote item of the account
    async fn fetch_snapshot(&self, account: AccountId) -> anyhow::Result<Vec<R>>;
}

/// Executes a diff against local storage and the remote
///
/// Implementations must apply all five lists as one transaction and keep
/// each local item's remembered remote state current after every push or
/// pull.
#[async_trait]
pub trait IApplyEngine<L: Send + 'static, R: Send + 'static>: Send + Sync {
    async fn apply(&self, account: AccountId, diff: SyncDiff<L, R>) -> anyhow::Result<ApplyOutcome>;
}
