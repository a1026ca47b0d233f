//! Diff engine
//!
//! Classifies every (local, remote) pairing into exactly one action list of
//! a [`SyncDiff`], or verifies it as already synchronized.
//!
//! ## Decision tree per remote item
//!
//! 1. No local counterpart: pull it.
//! 2. Local encoding outdated: pull it (migration beats conflict logic).
//! 3. Remote moved since the local replica last saw it: merge when both
//!    sides moved and the local item allows it, otherwise pull.
//! 4. Remote did not move: the newer side wins; equal ordinals settle on
//!    rounding drift, recorded failures, then the caller's predicates.
//!
//! Local items whose remote disappeared are dropped, and never-synced local
//! items are pushed (or dropped when already tombstoned).

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use vaultsync_core::domain::CURRENT_SCHEMA_VERSION;

use crate::clock::{effective_date, BucketedClock, ClockNormalizer};
use crate::error::DiffError;
use crate::grouping::{Linked, LocalGroups};
use crate::lens::{LocalLens, RemoteLens};
use crate::result::{DiffBuilder, SyncDiff};

/// Reconciles a local replica with a remote snapshot
///
/// Stateless between calls: identical inputs always give identical output.
/// Cheap to clone and safe to share across threads.
#[derive(Clone)]
pub struct DiffEngine {
    clock: Arc<dyn ClockNormalizer>,
    schema_version: u32,
}

impl fmt::Debug for DiffEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffEngine")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            clock: Arc::new(BucketedClock::default()),
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }
}

impl DiffEngine {
    /// Creates an engine with the given clock policy and target schema version
    pub fn new(clock: impl ClockNormalizer + 'static, schema_version: u32) -> Self {
        Self {
            clock: Arc::new(clock),
            schema_version,
        }
    }

    /// Replaces the clock normalization policy
    pub fn with_clock(mut self, clock: impl ClockNormalizer + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replaces the schema version local records are migrated to
    pub fn with_schema_version(mut self, schema_version: u32) -> Self {
        self.schema_version = schema_version;
        self
    }

    /// Returns the schema version local records are migrated to
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Computes the actions that bring both sides in sync
    ///
    /// Both collections are consumed; each item ends up in at most one
    /// action list. Items verified as in sync, and pushes withheld by a
    /// recorded failure, are only counted in the stats.
    ///
    /// `should_overwrite_local` and `should_overwrite_remote` are consulted
    /// only when both sides sit at the same revision ordinal with identical
    /// raw dates.
    ///
    /// # Errors
    /// Returns [`DiffError`] when a local or remote id occurs twice in its
    /// collection.
    pub fn diff<L, R, FL, FR>(
        &self,
        local_items: impl IntoIterator<Item = L>,
        remote_items: impl IntoIterator<Item = R>,
        mut should_overwrite_local: FL,
        mut should_overwrite_remote: FR,
    ) -> Result<SyncDiff<L, R>, DiffError>
    where
        L: LocalLens,
        R: RemoteLens,
        FL: FnMut(&L, &R) -> bool,
        FR: FnMut(&L, &R) -> bool,
    {
        let local_items: Vec<L> = local_items.into_iter().collect();
        let mut remote_items: Vec<R> = remote_items.into_iter().collect();
        ensure_unique_ids(&local_items, &remote_items)?;

        // Output order follows ids, never input order
        remote_items.sort_by(|a, b| a.remote_id().cmp(b.remote_id()));

        let local_count = local_items.len();
        let remote_count = remote_items.len();

        let mut groups = LocalGroups::partition(local_items);
        let mut out = DiffBuilder::new();

        for remote in remote_items {
            let group = groups.take(remote.remote_id()).unwrap_or_default();
            match pick_freshest(group, &mut out) {
                None => {
                    debug!(remote_id = %remote.remote_id(), "New remote item, pulling");
                    out.put_local(None, remote);
                }
                Some(linked) => self.classify_pair(
                    linked,
                    remote,
                    &mut out,
                    &mut should_overwrite_local,
                    &mut should_overwrite_remote,
                ),
            }
        }

        let (leftovers, mut unlinked) = groups.into_leftovers();
        unlinked.sort_by(|a, b| a.local_id().cmp(b.local_id()));

        for (remote_id, group) in leftovers {
            for linked in group {
                debug!(
                    local_id = %linked.item.local_id(),
                    remote_id = %remote_id,
                    "Remote item no longer exists, dropping local copy"
                );
                out.delete_local(linked.item, None);
            }
        }

        for local in unlinked {
            if local.deleted_date().is_some() {
                debug!(local_id = %local.local_id(), "Never-synced item deleted locally, dropping");
                out.delete_local(local, None);
            } else if local.push_allowed(local.revision_date()) {
                debug!(local_id = %local.local_id(), "Never-synced item, creating remotely");
                out.put_remote(local, None, false);
            } else {
                debug!(local_id = %local.local_id(), "Creation withheld by recorded failure");
                out.stats_mut().retry_blocked += 1;
            }
        }

        let diff = out.finish();
        let stats = diff.stats();
        info!(
            local_items = local_count,
            remote_items = remote_count,
            remote_deleted = diff.remote_deleted().len(),
            local_deleted = diff.local_deleted().len(),
            remote_put = diff.remote_put().len(),
            local_put = diff.local_put().len(),
            merge = diff.merge().len(),
            in_sync = stats.in_sync,
            duplicates_dropped = stats.duplicates_dropped,
            rounding_discrepancies = stats.rounding_discrepancies,
            retry_blocked = stats.retry_blocked,
            "Diff computed"
        );

        Ok(diff)
    }

    /// Classifies a local item against its remote counterpart
    fn classify_pair<L, R, FL, FR>(
        &self,
        linked: Linked<L>,
        remote: R,
        out: &mut DiffBuilder<L, R>,
        should_overwrite_local: &mut FL,
        should_overwrite_remote: &mut FR,
    ) where
        L: LocalLens,
        R: RemoteLens,
        FL: FnMut(&L, &R) -> bool,
        FR: FnMut(&L, &R) -> bool,
    {
        let Linked { item: local, remembered } = linked;

        if local.schema_version() < self.schema_version {
            debug!(
                local_id = %local.local_id(),
                from = local.schema_version(),
                to = self.schema_version,
                "Outdated local encoding, pulling remote copy"
            );
            out.stats_mut().schema_migrations += 1;
            out.put_local(Some(local), remote);
            return;
        }

        let local_date = local.effective_date();
        let remote_date = remote.effective_date();
        let local_ordinal = self.ordinal(local_date);
        let remote_ordinal = self.ordinal(remote_date);
        let remembered_ordinal =
            self.ordinal(effective_date(remembered.revision_date, remembered.deleted_date));

        if remote_ordinal != remembered_ordinal {
            if remembered_ordinal != local_ordinal && local.merge_eligible() {
                debug!(
                    local_id = %local.local_id(),
                    remote_id = %remote.remote_id(),
                    "Both sides changed since last sync, merging"
                );
                out.merge(local, remote);
            } else {
                debug!(
                    local_id = %local.local_id(),
                    remote_id = %remote.remote_id(),
                    "Remote changed since last sync, pulling"
                );
                out.put_local(Some(local), remote);
            }
            return;
        }

        match local_ordinal.cmp(&remote_ordinal) {
            Ordering::Less => {
                debug!(local_id = %local.local_id(), "Remote is newer, pulling");
                out.put_local(Some(local), remote);
            }
            Ordering::Greater => {
                if local.deleted_date().is_some() {
                    debug!(local_id = %local.local_id(), "Local deletion is newer, deleting remotely");
                    out.delete_remote(local, remote);
                } else if local.push_allowed(local_date) {
                    debug!(local_id = %local.local_id(), "Local is newer, pushing");
                    out.put_remote(local, Some(remote), false);
                } else {
                    debug!(local_id = %local.local_id(), "Push withheld by recorded failure");
                    out.stats_mut().retry_blocked += 1;
                }
            }
            Ordering::Equal => self.settle_equal(
                local,
                remote,
                local_date,
                remote_date,
                out,
                should_overwrite_local,
                should_overwrite_remote,
            ),
        }
    }

    /// Both sides share an ordinal: decide whether anything must move
    #[allow(clippy::too_many_arguments)]
    fn settle_equal<L, R, FL, FR>(
        &self,
        local: L,
        remote: R,
        local_date: DateTime<Utc>,
        remote_date: DateTime<Utc>,
        out: &mut DiffBuilder<L, R>,
        should_overwrite_local: &mut FL,
        should_overwrite_remote: &mut FR,
    ) where
        L: LocalLens,
        R: RemoteLens,
        FL: FnMut(&L, &R) -> bool,
        FR: FnMut(&L, &R) -> bool,
    {
        if local_date != remote_date {
            // The local record cannot be trusted to match what the server
            // rounded it to, so take the server's copy.
            warn!(
                local_id = %local.local_id(),
                remote_id = %remote.remote_id(),
                local_date = %local_date,
                remote_date = %remote_date,
                "Rounding discrepancy between local and remote revision, pulling"
            );
            out.stats_mut().rounding_discrepancies += 1;
            out.put_local(Some(local), remote);
            return;
        }

        // NOTE: any recorded failure routes here, including retryable ones,
        // so a pending local edit at an equal ordinal is overwritten by the
        // remote copy. Revisit once failures carry their own push intent.
        if local.retry_gate().is_some() {
            debug!(local_id = %local.local_id(), "Local item carries a sync failure, pulling");
            out.put_local(Some(local), remote);
            return;
        }

        if should_overwrite_local(&local, &remote) {
            debug!(local_id = %local.local_id(), "Predicate requested local overwrite");
            out.put_local(Some(local), remote);
        } else if should_overwrite_remote(&local, &remote) {
            debug!(local_id = %local.local_id(), "Predicate requested forced remote overwrite");
            out.put_remote(local, Some(remote), true);
        } else {
            out.stats_mut().in_sync += 1;
        }
    }

    fn ordinal(&self, timestamp: DateTime<Utc>) -> i64 {
        self.clock.ordinal(timestamp)
    }
}

/// Keeps the group member with the latest effective date (first one on ties)
/// and queues every other member for local deletion
fn pick_freshest<L, R>(group: Vec<Linked<L>>, out: &mut DiffBuilder<L, R>) -> Option<Linked<L>>
where
    L: LocalLens,
{
    let mut best: Option<(usize, DateTime<Utc>)> = None;
    for (index, linked) in group.iter().enumerate() {
        let date = linked.item.effective_date();
        match best {
            Some((_, best_date)) if best_date >= date => {}
            _ => best = Some((index, date)),
        }
    }
    let (keep, _) = best?;

    if group.len() > 1 {
        warn!(
            remote_id = %group[keep].remembered.id,
            count = group.len(),
            "Multiple local records linked to one remote item, keeping the freshest"
        );
    }

    let mut kept = None;
    for (index, linked) in group.into_iter().enumerate() {
        if index == keep {
            kept = Some(linked);
        } else {
            out.stats_mut().duplicates_dropped += 1;
            out.delete_local(linked.item, None);
        }
    }
    kept
}

fn ensure_unique_ids<L: LocalLens, R: RemoteLens>(
    local_items: &[L],
    remote_items: &[R],
) -> Result<(), DiffError> {
    let mut seen = HashSet::with_capacity(local_items.len());
    for item in local_items {
        if !seen.insert(item.local_id()) {
            return Err(DiffError::DuplicateLocalId(item.local_id().clone()));
        }
    }

    let mut seen = HashSet::with_capacity(remote_items.len());
    for item in remote_items {
        if !seen.insert(item.remote_id()) {
            return Err(DiffError::DuplicateRemoteId(item.remote_id().clone()));
        }
    }

    Ok(())
}
