//! In-memory vault adapter
//!
//! [`MemoryVault`] keeps one [`VaultState`] per account and implements all
//! three sync ports on top of it. Used by tests and by callers embedding
//! the engine without persistence.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use tracing::debug;

use vaultsync_core::domain::{AccountId, LocalVaultItem, RemoteVaultItem};
use vaultsync_diff::SyncDiff;

use crate::apply::{default_revision_step, FieldUnionMerge, MergeHook, VaultState};
use crate::ports::{ApplyOutcome, IApplyEngine, ILocalVaultStore, IRemoteVault};

/// Per-account vault states held in memory
pub struct MemoryVault {
    accounts: DashMap<AccountId, VaultState>,
    hook: Arc<dyn MergeHook>,
    revision_step: Duration,
    apply_calls: AtomicUsize,
}

impl MemoryVault {
    /// Creates an empty vault using [`FieldUnionMerge`]
    pub fn new() -> Self {
        Self::with_merge_hook(Arc::new(FieldUnionMerge))
    }

    pub fn with_merge_hook(hook: Arc<dyn MergeHook>) -> Self {
        Self {
            accounts: DashMap::new(),
            hook,
            revision_step: default_revision_step(),
            apply_calls: AtomicUsize::new(0),
        }
    }

    /// Minimum distance between a merge result and its inputs
    pub fn with_revision_step(mut self, step: Duration) -> Self {
        self.revision_step = step;
        self
    }

    /// Replaces the whole state of an account
    pub fn seed(&self, account: AccountId, state: VaultState) {
        self.accounts.insert(account, state);
    }

    /// Snapshot of an account's state (empty if unknown)
    pub fn state(&self, account: AccountId) -> VaultState {
        self.accounts
            .get(&account)
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    /// Mutates an account's state in place, as a user or another client would
    pub fn update<T>(&self, account: AccountId, f: impl FnOnce(&mut VaultState) -> T) -> T {
        let mut state = self.accounts.entry(account).or_default();
        f(&mut *state)
    }

    /// Number of times the apply port was invoked
    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryVault {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ILocalVaultStore<LocalVaultItem> for MemoryVault {
    async fn load_items(&self, account: AccountId) -> anyhow::Result<Vec<LocalVaultItem>> {
        Ok(self
            .accounts
            .get(&account)
            .map(|state| state.local_items())
            .unwrap_or_default())
    }
}

#[async_trait]
impl IRemoteVault<RemoteVaultItem> for MemoryVault {
    async fn fetch_snapshot(&self, account: AccountId) -> anyhow::Result<Vec<RemoteVaultItem>> {
        Ok(self
            .accounts
            .get(&account)
            .map(|state| state.remote_items())
            .unwrap_or_default())
    }
}

#[async_trait]
impl IApplyEngine<LocalVaultItem, RemoteVaultItem> for MemoryVault {
    async fn apply(
        &self,
        account: AccountId,
        diff: SyncDiff<LocalVaultItem, RemoteVaultItem>,
    ) -> anyhow::Result<ApplyOutcome> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.accounts.entry(account).or_default();
        let outcome = state.apply_diff(diff, self.hook.as_ref(), self.revision_step)?;
        debug!(account = %account, actions = outcome.total(), "Applied diff in memory");
        Ok(outcome)
    }
}
