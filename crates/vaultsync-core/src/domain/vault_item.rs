//! Vault item records
//!
//! The reconciliation engine only ever sees items through its lens traits,
//! but the rest of the system needs concrete shapes for the decrypted
//! records handed over by the storage and transport layers:
//!
//! - [`LocalVaultItem`] - a record in the local replica, with the remote
//!   state it remembers from its last successful sync
//! - [`RemoteVaultItem`] - a record in the server's snapshot
//! - [`SyncFailure`] - why the last push of a local record failed, and
//!   whether it may be retried

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::ItemId;

/// Version of the local on-disk encoding
///
/// Local records written with an older version are rewritten from the
/// remote copy on the next sync, regardless of their content state.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Number of push attempts after which a failed revision is no longer retried
pub const MAX_PUSH_ATTEMPTS: u32 = 5;

// ============================================================================
// VaultPayload
// ============================================================================

/// Decrypted content of a vault item
///
/// The sync core never looks inside; only merge hooks and overwrite
/// predicates do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPayload {
    /// Display name of the item
    pub name: String,
    /// Free-form notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Named fields (username, password, uri, ...)
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Whether the user marked the item as a favorite
    #[serde(default)]
    pub favorite: bool,
}

impl VaultPayload {
    /// Creates a payload with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds or replaces a field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Sets the notes
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the favorite flag
    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = favorite;
        self
    }
}

// ============================================================================
// RememberedRemote
// ============================================================================

/// The remote state a local record observed at its last successful sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedRemote {
    /// Server id of the linked remote item
    pub id: ItemId,
    /// Remote revision date at the last sync
    pub revision_date: DateTime<Utc>,
    /// Remote deletion date at the last sync
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_date: Option<DateTime<Utc>>,
}

impl RememberedRemote {
    /// Creates a remembered state with no deletion date
    pub fn new(id: ItemId, revision_date: DateTime<Utc>) -> Self {
        Self {
            id,
            revision_date,
            deleted_date: None,
        }
    }

    /// Sets the remembered deletion date
    pub fn with_deleted_date(mut self, deleted_date: DateTime<Utc>) -> Self {
        self.deleted_date = Some(deleted_date);
        self
    }

    /// Captures the current state of a remote item
    pub fn of(remote: &RemoteVaultItem) -> Self {
        Self {
            id: remote.id.clone(),
            revision_date: remote.revision_date,
            deleted_date: remote.deleted_date,
        }
    }
}

// ============================================================================
// SyncFailure
// ============================================================================

/// Information about a failed push of a local record
///
/// Retry timing (backoff) belongs to the transport; this only records
/// whether the failed revision is still worth pushing at all. The check
/// never reads the wall clock, so diffs stay reproducible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    /// Error code for categorization (e.g., "NETWORK_ERROR", "REJECTED")
    code: String,
    /// Human-readable error message
    message: String,
    /// Local revision date that failed to push
    revision_date: DateTime<Utc>,
    /// Number of push attempts made for this revision
    attempts: u32,
    /// The server rejected the revision for good
    permanent: bool,
}

impl SyncFailure {
    /// Creates a retryable failure for the given local revision
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        revision_date: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            revision_date,
            attempts: 1,
            permanent: false,
        }
    }

    /// Creates a failure that must not be retried for this revision
    pub fn permanent(
        code: impl Into<String>,
        message: impl Into<String>,
        revision_date: DateTime<Utc>,
    ) -> Self {
        Self {
            permanent: true,
            ..Self::new(code, message, revision_date)
        }
    }

    /// Returns the error code
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the revision date that failed
    pub fn revision_date(&self) -> DateTime<Utc> {
        self.revision_date
    }

    /// Returns the number of attempts made
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns true if the server rejected the revision for good
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// Records another failed attempt for the same revision
    pub fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Whether a push of the item at `as_of_revision` may be attempted
    ///
    /// A revision other than the one that failed is always retryable: the
    /// user edited the item after the failure. The failed revision itself is
    /// retried until it is rejected permanently or runs out of attempts.
    pub fn can_retry(&self, as_of_revision: DateTime<Utc>) -> bool {
        if as_of_revision != self.revision_date {
            return true;
        }
        !self.permanent && self.attempts < MAX_PUSH_ATTEMPTS
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if self.attempts > 1 {
            write!(f, " (attempts: {})", self.attempts)?;
        }
        Ok(())
    }
}

// ============================================================================
// RemoteVaultItem
// ============================================================================

/// A vault item as present in the server's snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVaultItem {
    id: ItemId,
    revision_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_date: Option<DateTime<Utc>>,
    #[serde(default)]
    payload: VaultPayload,
}

impl RemoteVaultItem {
    /// Creates a live remote item
    pub fn new(id: ItemId, revision_date: DateTime<Utc>, payload: VaultPayload) -> Self {
        Self {
            id,
            revision_date,
            deleted_date: None,
            payload,
        }
    }

    /// Marks the item as soft-deleted on the server
    pub fn with_deleted_date(mut self, deleted_date: DateTime<Utc>) -> Self {
        self.deleted_date = Some(deleted_date);
        self
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn revision_date(&self) -> DateTime<Utc> {
        self.revision_date
    }

    pub fn deleted_date(&self) -> Option<DateTime<Utc>> {
        self.deleted_date
    }

    pub fn payload(&self) -> &VaultPayload {
        &self.payload
    }

    /// Returns true if the item is soft-deleted on the server
    pub fn is_deleted(&self) -> bool {
        self.deleted_date.is_some()
    }
}

// ============================================================================
// LocalVaultItem
// ============================================================================

/// A vault item in the local replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVaultItem {
    /// Stable identity inside the local replica
    local_id: ItemId,
    /// Remote state observed at the last sync (None if never synced)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote: Option<RememberedRemote>,
    /// Local revision date
    revision_date: DateTime<Utc>,
    /// Local soft-delete marker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_date: Option<DateTime<Utc>>,
    /// Version of the on-disk encoding
    schema_version: u32,
    /// Whether a content merge may replace an outright overwrite
    #[serde(default)]
    mergeable: bool,
    /// Last push failure, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sync_failure: Option<SyncFailure>,
    #[serde(default)]
    payload: VaultPayload,
}

impl LocalVaultItem {
    /// Creates a never-synced local item with a fresh local id
    pub fn new(payload: VaultPayload, revision_date: DateTime<Utc>) -> Self {
        Self {
            local_id: ItemId::generate(),
            remote: None,
            revision_date,
            deleted_date: None,
            schema_version: CURRENT_SCHEMA_VERSION,
            mergeable: false,
            sync_failure: None,
            payload,
        }
    }

    /// Creates a local copy of a remote item, as if just pulled
    pub fn from_remote(remote: &RemoteVaultItem) -> Self {
        let mut item = Self::new(remote.payload.clone(), remote.revision_date);
        item.adopt_remote(remote);
        item
    }

    /// Replaces the generated local id
    pub fn with_local_id(mut self, local_id: ItemId) -> Self {
        self.local_id = local_id;
        self
    }

    /// Links the item to a remembered remote state
    pub fn linked_to(mut self, remote: RememberedRemote) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Marks the item as soft-deleted locally
    pub fn with_deleted_date(mut self, deleted_date: DateTime<Utc>) -> Self {
        self.deleted_date = Some(deleted_date);
        self
    }

    pub fn with_schema_version(mut self, schema_version: u32) -> Self {
        self.schema_version = schema_version;
        self
    }

    pub fn with_mergeable(mut self, mergeable: bool) -> Self {
        self.mergeable = mergeable;
        self
    }

    pub fn with_sync_failure(mut self, failure: SyncFailure) -> Self {
        self.sync_failure = Some(failure);
        self
    }

    pub fn local_id(&self) -> &ItemId {
        &self.local_id
    }

    pub fn remote(&self) -> Option<&RememberedRemote> {
        self.remote.as_ref()
    }

    pub fn revision_date(&self) -> DateTime<Utc> {
        self.revision_date
    }

    pub fn deleted_date(&self) -> Option<DateTime<Utc>> {
        self.deleted_date
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn is_mergeable(&self) -> bool {
        self.mergeable
    }

    pub fn sync_failure(&self) -> Option<&SyncFailure> {
        self.sync_failure.as_ref()
    }

    pub fn payload(&self) -> &VaultPayload {
        &self.payload
    }

    /// Returns true if the item is soft-deleted locally
    pub fn is_deleted(&self) -> bool {
        self.deleted_date.is_some()
    }

    /// Applies a local user edit: new content and a new revision date
    pub fn edit(&mut self, payload: VaultPayload, revision_date: DateTime<Utc>) {
        self.payload = payload;
        self.revision_date = revision_date;
    }

    /// Soft-deletes the item locally
    pub fn mark_deleted(&mut self, deleted_date: DateTime<Utc>) {
        self.deleted_date = Some(deleted_date);
    }

    /// Records a failed push of the current revision
    ///
    /// Repeated failures of the same revision accumulate attempts; a failure
    /// of a newer revision starts over.
    pub fn record_failure(&mut self, code: &str, message: &str, permanent: bool) {
        let revision_date = self.revision_date;
        let same_revision = self
            .sync_failure
            .as_ref()
            .is_some_and(|f| f.revision_date() == revision_date);

        if same_revision && !permanent {
            if let Some(existing) = self.sync_failure.as_mut() {
                existing.record_attempt();
            }
            return;
        }

        self.sync_failure = Some(if permanent {
            SyncFailure::permanent(code, message, revision_date)
        } else {
            SyncFailure::new(code, message, revision_date)
        });
    }

    /// Bookkeeping after a successful push: the server now holds `remote`
    ///
    /// The local dates follow the server's copy so the next diff sees the
    /// item as settled even if the server rounded the revision date.
    pub fn confirm_push(&mut self, remote: &RemoteVaultItem) {
        self.revision_date = remote.revision_date;
        self.deleted_date = remote.deleted_date;
        self.remote = Some(RememberedRemote::of(remote));
        self.schema_version = CURRENT_SCHEMA_VERSION;
        self.sync_failure = None;
    }

    /// Bookkeeping after a pull: content, dates and encoding follow `remote`
    pub fn adopt_remote(&mut self, remote: &RemoteVaultItem) {
        self.payload = remote.payload.clone();
        self.confirm_push(remote);
    }

    /// Replaces the content without touching the dates
    pub fn set_payload(&mut self, payload: VaultPayload) {
        self.payload = payload;
    }
}
