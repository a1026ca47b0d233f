//! JSON-file vault adapter
//!
//! One file holds the local replica (array of local items), another the
//! server snapshot (array of remote items). A missing file reads as an
//! empty list. Applying a diff rewrites both files through write-to-temp
//! + rename, so a crash never leaves a half-written file behind.
//!
//! A file pair serves a single account; the account passed to the ports
//! is only used for logging.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use vaultsync_core::domain::{AccountId, LocalVaultItem, RemoteVaultItem};
use vaultsync_diff::SyncDiff;

use crate::apply::{default_revision_step, FieldUnionMerge, MergeHook, VaultState};
use crate::ports::{ApplyOutcome, IApplyEngine, ILocalVaultStore, IRemoteVault};
use crate::SyncError;

/// Vault backed by two JSON files
pub struct JsonFileVault {
    vault_path: PathBuf,
    snapshot_path: PathBuf,
    hook: Arc<dyn MergeHook>,
    revision_step: Duration,
    /// Serializes read-modify-write cycles on the file pair
    write_lock: Mutex<()>,
}

impl JsonFileVault {
    pub fn new(vault_path: impl Into<PathBuf>, snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            vault_path: vault_path.into(),
            snapshot_path: snapshot_path.into(),
            hook: Arc::new(FieldUnionMerge),
            revision_step: default_revision_step(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_merge_hook(mut self, hook: Arc<dyn MergeHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Minimum distance between a merge result and its inputs
    pub fn with_revision_step(mut self, step: Duration) -> Self {
        self.revision_step = step;
        self
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Reads both files into a [`VaultState`]
    pub async fn read_state(&self) -> Result<VaultState, SyncError> {
        let local: Vec<LocalVaultItem> = read_json_list(&self.vault_path).await?;
        let remote: Vec<RemoteVaultItem> = read_json_list(&self.snapshot_path).await?;
        Ok(VaultState::from_items(local, remote))
    }

    /// Writes both sides of `state` atomically, file by file
    pub async fn write_state(&self, state: &VaultState) -> Result<(), SyncError> {
        write_json_atomic(&self.vault_path, &state.local_items()).await?;
        write_json_atomic(&self.snapshot_path, &state.remote_items()).await?;
        Ok(())
    }
}

#[async_trait]
impl ILocalVaultStore<LocalVaultItem> for JsonFileVault {
    #[instrument(skip(self), fields(path = %self.vault_path.display()))]
    async fn load_items(&self, account: AccountId) -> anyhow::Result<Vec<LocalVaultItem>> {
        let items = read_json_list(&self.vault_path).await?;
        debug!(items = items.len(), "Loaded local vault");
        Ok(items)
    }
}

#[async_trait]
impl IRemoteVault<RemoteVaultItem> for JsonFileVault {
    #[instrument(skip(self), fields(path = %self.snapshot_path.display()))]
    async fn fetch_snapshot(&self, account: AccountId) -> anyhow::Result<Vec<RemoteVaultItem>> {
        let items = read_json_list(&self.snapshot_path).await?;
        debug!(items = items.len(), "Loaded remote snapshot");
        Ok(items)
    }
}

#[async_trait]
impl IApplyEngine<LocalVaultItem, RemoteVaultItem> for JsonFileVault {
    #[instrument(skip(self, diff), fields(actions = diff.len()))]
    async fn apply(
        &self,
        account: AccountId,
        diff: SyncDiff<LocalVaultItem, RemoteVaultItem>,
    ) -> anyhow::Result<ApplyOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.read_state().await?;
        let outcome = state.apply_diff(diff, self.hook.as_ref(), self.revision_step)?;
        self.write_state(&state).await?;
        debug!(actions = outcome.total(), "Vault files updated");
        Ok(outcome)
    }
}

async fn read_json_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SyncError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Vault file missing, treating as empty");
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

async fn write_json_atomic<T: Serialize>(target: &Path, value: &T) -> Result<(), SyncError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let data = serde_json::to_vec_pretty(value)?;

    // Same directory, so the rename stays on one filesystem
    let tmp_path = {
        let mut p = target.as_os_str().to_owned();
        p.push(".tmp");
        PathBuf::from(p)
    };

    debug!(?tmp_path, bytes = data.len(), "Writing temporary file");
    tokio::fs::write(&tmp_path, &data).await?;
    tokio::fs::rename(&tmp_path, target).await?;
    Ok(())
}
