//! Read-only accessors the diff engine uses to look at items
//!
//! The engine never depends on a concrete storage schema: any local type
//! implementing [`LocalLens`] and any remote type implementing
//! [`RemoteLens`] can be reconciled. Lens methods must be pure.

use chrono::{DateTime, Utc};

use vaultsync_core::domain::{
    ItemId, LocalVaultItem, RememberedRemote, RemoteVaultItem, SyncFailure,
};

use crate::clock::effective_date;

/// The `canRetry` facet of a failed push
pub trait RetryGate {
    /// Whether a push of the item at `as_of_revision` may be attempted now
    fn can_retry(&self, as_of_revision: DateTime<Utc>) -> bool;
}

impl RetryGate for SyncFailure {
    fn can_retry(&self, as_of_revision: DateTime<Utc>) -> bool {
        SyncFailure::can_retry(self, as_of_revision)
    }
}

/// Accessors for items in the server snapshot
pub trait RemoteLens {
    /// Server id of the item
    fn remote_id(&self) -> &ItemId;

    /// Server revision date
    fn revision_date(&self) -> DateTime<Utc>;

    /// Server deletion date (soft delete)
    fn deleted_date(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// `max(revision, deleted)`
    fn effective_date(&self) -> DateTime<Utc> {
        effective_date(self.revision_date(), self.deleted_date())
    }
}

/// Accessors for items in the local replica
pub trait LocalLens {
    /// Identity inside the local replica
    fn local_id(&self) -> &ItemId;

    /// Linked remote id and the remote dates seen at the last sync,
    /// or `None` if the item was never synced
    fn remembered_remote(&self) -> Option<RememberedRemote>;

    /// Local revision date
    fn revision_date(&self) -> DateTime<Utc>;

    /// Local deletion date (tombstone)
    fn deleted_date(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Version of the on-disk encoding
    fn schema_version(&self) -> u32;

    /// Whether a content merge may replace an outright overwrite
    fn merge_eligible(&self) -> bool {
        false
    }

    /// Last push failure, if any
    fn retry_gate(&self) -> Option<&dyn RetryGate> {
        None
    }

    /// `max(revision, deleted)`
    fn effective_date(&self) -> DateTime<Utc> {
        effective_date(self.revision_date(), self.deleted_date())
    }

    /// True unless a recorded failure forbids pushing at `as_of_revision`
    fn push_allowed(&self, as_of_revision: DateTime<Utc>) -> bool {
        self.retry_gate()
            .map_or(true, |gate| gate.can_retry(as_of_revision))
    }
}

impl RemoteLens for RemoteVaultItem {
    fn remote_id(&self) -> &ItemId {
        self.id()
    }

    fn revision_date(&self) -> DateTime<Utc> {
        RemoteVaultItem::revision_date(self)
    }

    fn deleted_date(&self) -> Option<DateTime<Utc>> {
        RemoteVaultItem::deleted_date(self)
    }
}

impl LocalLens for LocalVaultItem {
    fn local_id(&self) -> &ItemId {
        LocalVaultItem::local_id(self)
    }

    fn remembered_remote(&self) -> Option<RememberedRemote> {
        self.remote().cloned()
    }

    fn revision_date(&self) -> DateTime<Utc> {
        LocalVaultItem::revision_date(self)
    }

    fn deleted_date(&self) -> Option<DateTime<Utc>> {
        LocalVaultItem::deleted_date(self)
    }

    fn schema_version(&self) -> u32 {
        LocalVaultItem::schema_version(self)
    }

    fn merge_eligible(&self) -> bool {
        self.is_mergeable()
    }

    fn retry_gate(&self) -> Option<&dyn RetryGate> {
        self.sync_failure().map(|f| f as &dyn RetryGate)
    }
}
