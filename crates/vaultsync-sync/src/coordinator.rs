//! Sync round coordinator
//!
//! The [`SyncCoordinator`] runs one sync round per call:
//!
//! 1. **Fetch**: read the server snapshot
//! 2. **Load**: read the local replica
//! 3. **Diff**: classify every item (pure, no I/O)
//! 4. **Apply**: hand the diff to the apply engine as one transaction
//!
//! Rounds for the same account are serialized through a per-account lock,
//! so a second round always sees the bookkeeping of the first. Rounds for
//! different accounts run in parallel. A lock entry lives only while a
//! round for its account is running or waiting.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use vaultsync_core::domain::AccountId;
use vaultsync_diff::{DiffEngine, DiffStats, LocalLens, OverwritePolicy, RemoteLens, SyncDiff, TieBreak};

use crate::ports::{ApplyOutcome, IApplyEngine, ILocalVaultStore, IRemoteVault};
use crate::SyncError;

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of a completed sync round
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub account: AccountId,
    /// What the apply engine executed (all zero when nothing had to move)
    pub outcome: ApplyOutcome,
    /// Recovered conditions seen while diffing
    pub stats: DiffStats,
    /// Number of actions in the diff
    pub actions: usize,
    /// Whether the apply engine was invoked
    pub applied: bool,
    /// Wall-clock duration of the round in milliseconds
    pub duration_ms: u64,
}

// ============================================================================
// SyncCoordinator
// ============================================================================

/// Runs sync rounds against a local store, a remote and an apply engine
pub struct SyncCoordinator<L: Send + 'static, R: Send + 'static> {
    local_store: Arc<dyn ILocalVaultStore<L>>,
    remote: Arc<dyn IRemoteVault<R>>,
    applier: Arc<dyn IApplyEngine<L, R>>,
    engine: DiffEngine,
    policy: Arc<dyn OverwritePolicy<L, R>>,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl<L, R> SyncCoordinator<L, R>
where
    L: LocalLens + Send + 'static,
    R: RemoteLens + Send + 'static,
{
    /// Creates a coordinator with the default diff engine and
    /// [`TieBreak::KeepSynced`]
    pub fn new(
        local_store: Arc<dyn ILocalVaultStore<L>>,
        remote: Arc<dyn IRemoteVault<R>>,
        applier: Arc<dyn IApplyEngine<L, R>>,
    ) -> Self {
        Self {
            local_store,
            remote,
            applier,
            engine: DiffEngine::default(),
            policy: Arc::new(TieBreak::KeepSynced),
            locks: DashMap::new(),
        }
    }

    pub fn with_engine(mut self, engine: DiffEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn OverwritePolicy<L, R>>) -> Self {
        self.policy = policy;
        self
    }

    pub fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    /// Runs one full round for `account`
    ///
    /// An empty diff skips the apply engine entirely.
    ///
    /// # Errors
    /// Returns a [`SyncError`] naming the step that failed. A failed round
    /// commits nothing; the next round starts from the same state.
    #[tracing::instrument(skip(self, account), fields(account = %account))]
    pub async fn sync_account(&self, account: AccountId) -> Result<SyncReport, SyncError> {
        let lock = self.account_lock(account);
        let result = {
            let _guard = lock.lock().await;
            self.run_round(account).await
        };
        drop(lock);
        self.release_lock(account);
        result
    }

    async fn run_round(&self, account: AccountId) -> Result<SyncReport, SyncError> {
        let start = Instant::now();
        info!("Starting sync round");

        let diff = self.compute(account).await?;
        let stats = *diff.stats();
        let actions = diff.len();

        let (outcome, applied) = if diff.is_empty() {
            debug!("Nothing to apply");
            (ApplyOutcome::default(), false)
        } else {
            let outcome = self
                .applier
                .apply(account, diff)
                .await
                .map_err(SyncError::ApplyEngine)?;
            (outcome, true)
        };

        let report = SyncReport {
            account,
            outcome,
            stats,
            actions,
            applied,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            pulled = outcome.pulled,
            pushed = outcome.pushed,
            merged = outcome.merged,
            deleted_local = outcome.deleted_local,
            deleted_remote = outcome.deleted_remote,
            retry_blocked = stats.retry_blocked,
            duration_ms = report.duration_ms,
            "Sync round complete"
        );

        Ok(report)
    }

    /// Computes the diff a round would apply, without applying it
    ///
    /// # Errors
    /// Same as [`SyncCoordinator::sync_account`] minus apply failures.
    #[tracing::instrument(skip(self, account), fields(account = %account))]
    pub async fn preview(&self, account: AccountId) -> Result<SyncDiff<L, R>, SyncError> {
        let lock = self.account_lock(account);
        let result = {
            let _guard = lock.lock().await;
            self.compute(account).await
        };
        drop(lock);
        self.release_lock(account);
        result
    }

    async fn compute(&self, account: AccountId) -> Result<SyncDiff<L, R>, SyncError> {
        let remote_items = self
            .remote
            .fetch_snapshot(account)
            .await
            .map_err(SyncError::Remote)?;
        let local_items = self
            .local_store
            .load_items(account)
            .await
            .map_err(SyncError::LocalStore)?;

        debug!(
            remote = remote_items.len(),
            local = local_items.len(),
            "Inputs loaded"
        );

        Ok(self
            .engine
            .diff_with(local_items, remote_items, self.policy.as_ref())?)
    }

    fn account_lock(&self, account: AccountId) -> Arc<Mutex<()>> {
        self.locks.entry(account).or_default().clone()
    }

    /// Drops the account's lock entry unless another round still holds it
    fn release_lock(&self, account: AccountId) {
        self.locks
            .remove_if(&account, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of accounts with a round running or waiting
    pub fn active_accounts(&self) -> usize {
        self.locks.len()
    }
}
