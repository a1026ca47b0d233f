//! Diff result aggregation
//!
//! A [`SyncDiff`] is the one-shot output of a diff pass: five action lists
//! the apply engine executes inside a single storage transaction, plus
//! [`DiffStats`] counters describing conditions that were recovered from
//! rather than reported as errors.

use serde::Serialize;

/// Local item must be deleted from the remote, then dropped locally
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteDelete<L, R> {
    pub local: L,
    pub remote: R,
}

/// Local replica entry must be removed
///
/// Emitted for resolved local tombstones, for items the remote no longer
/// has, and for duplicate local records that lost the freshness tie-break.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalDelete<L, R> {
    pub local: L,
    pub remote: Option<R>,
}

/// Local content must be pushed to the remote (create when `remote` is None)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemotePut<L, R> {
    pub local: L,
    pub remote: Option<R>,
    /// Push even though the revision dates alone would not require it
    pub force: bool,
}

/// Remote content must be written into the local replica
/// (create when `local` is None, otherwise update or schema migration)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalPut<L, R> {
    pub local: Option<L>,
    pub remote: R,
    pub force: bool,
}

/// Both sides changed since the last sync; a merge hook must reconcile them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Merge<L, R> {
    pub local: L,
    pub remote: R,
}

/// Counters for recovered, non-fatal conditions seen during a diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    /// Pairs verified as already synchronized
    pub in_sync: usize,
    /// Local duplicates dropped in favor of the freshest record
    pub duplicates_dropped: usize,
    /// Equal ordinals whose raw effective dates differed
    pub rounding_discrepancies: usize,
    /// Pulls forced by an outdated local schema version
    pub schema_migrations: usize,
    /// Pushes withheld because a recorded failure forbids retrying
    pub retry_blocked: usize,
}

/// Result of a diff pass
///
/// Immutable once built; consume it with [`SyncDiff::into_parts`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncDiff<L, R> {
    remote_deleted: Vec<RemoteDelete<L, R>>,
    local_deleted: Vec<LocalDelete<L, R>>,
    remote_put: Vec<RemotePut<L, R>>,
    local_put: Vec<LocalPut<L, R>>,
    merge: Vec<Merge<L, R>>,
    stats: DiffStats,
}

/// The five action lists of a [`SyncDiff`], by value
#[derive(Debug)]
pub struct DiffParts<L, R> {
    pub remote_deleted: Vec<RemoteDelete<L, R>>,
    pub local_deleted: Vec<LocalDelete<L, R>>,
    pub remote_put: Vec<RemotePut<L, R>>,
    pub local_put: Vec<LocalPut<L, R>>,
    pub merge: Vec<Merge<L, R>>,
}

impl<L, R> SyncDiff<L, R> {
    pub fn remote_deleted(&self) -> &[RemoteDelete<L, R>] {
        &self.remote_deleted
    }

    pub fn local_deleted(&self) -> &[LocalDelete<L, R>] {
        &self.local_deleted
    }

    pub fn remote_put(&self) -> &[RemotePut<L, R>] {
        &self.remote_put
    }

    pub fn local_put(&self) -> &[LocalPut<L, R>] {
        &self.local_put
    }

    pub fn merge(&self) -> &[Merge<L, R>] {
        &self.merge
    }

    pub fn stats(&self) -> &DiffStats {
        &self.stats
    }

    /// Total number of actions across all lists
    pub fn len(&self) -> usize {
        self.remote_deleted.len()
            + self.local_deleted.len()
            + self.remote_put.len()
            + self.local_put.len()
            + self.merge.len()
    }

    /// True when nothing needs to move
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the diff, returning its action lists
    pub fn into_parts(self) -> DiffParts<L, R> {
        DiffParts {
            remote_deleted: self.remote_deleted,
            local_deleted: self.local_deleted,
            remote_put: self.remote_put,
            local_put: self.local_put,
            merge: self.merge,
        }
    }
}

/// Accumulates classifications during a diff pass
pub(crate) struct DiffBuilder<L, R> {
    diff: SyncDiff<L, R>,
}

impl<L, R> DiffBuilder<L, R> {
    pub(crate) fn new() -> Self {
        Self {
            diff: SyncDiff {
                remote_deleted: Vec::new(),
                local_deleted: Vec::new(),
                remote_put: Vec::new(),
                local_put: Vec::new(),
                merge: Vec::new(),
                stats: DiffStats::default(),
            },
        }
    }

    pub(crate) fn delete_remote(&mut self, local: L, remote: R) {
        self.diff.remote_deleted.push(RemoteDelete { local, remote });
    }

    pub(crate) fn delete_local(&mut self, local: L, remote: Option<R>) {
        self.diff.local_deleted.push(LocalDelete { local, remote });
    }

    pub(crate) fn put_remote(&mut self, local: L, remote: Option<R>, force: bool) {
        self.diff.remote_put.push(RemotePut {
            local,
            remote,
            force,
        });
    }

    pub(crate) fn put_local(&mut self, local: Option<L>, remote: R) {
        self.diff.local_put.push(LocalPut {
            local,
            remote,
            force: false,
        });
    }

    pub(crate) fn merge(&mut self, local: L, remote: R) {
        self.diff.merge.push(Merge { local, remote });
    }

    pub(crate) fn stats_mut(&mut self) -> &mut DiffStats {
        &mut self.diff.stats
    }

    pub(crate) fn finish(self) -> SyncDiff<L, R> {
        self.diff
    }
}
