//! Reference apply engine
//!
//! [`VaultState`] holds one account's local replica and a simulated server
//! side. [`VaultState::apply_diff`] executes a diff against a working copy
//! and commits it only when every action succeeded, so a failed apply
//! leaves both sides untouched.
//!
//! ## Bookkeeping
//!
//! After any push or pull the local record's dates and remembered remote
//! state equal the remote record, its failure is cleared and its schema
//! version is current. The simulated server keeps revision dates at
//! millisecond precision, which is coarser than the local clock.
//!
//! ## Merges
//!
//! A merged item is written at a revision strictly newer than both inputs,
//! at least one revision step past the later one, so every other replica
//! sees the remote move and pulls the merged content. A tombstone on either
//! side survives the merge: the merged record is written as deleted.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vaultsync_core::domain::{ItemId, LocalVaultItem, RemoteVaultItem, VaultPayload};
use vaultsync_diff::{LocalLens, RemoteLens, SyncDiff, DEFAULT_GRANULARITY_MS};

use crate::ports::ApplyOutcome;
use crate::SyncError;

// ============================================================================
// Merge hooks
// ============================================================================

/// Combines two diverged payloads into one
pub trait MergeHook: Send + Sync {
    fn merge(&self, local: &VaultPayload, remote: &VaultPayload) -> VaultPayload;
}

/// Union of both sides' fields, remote winning on conflicting keys
///
/// Name and notes come from the remote; the item is a favorite if either
/// side marked it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldUnionMerge;

impl MergeHook for FieldUnionMerge {
    fn merge(&self, local: &VaultPayload, remote: &VaultPayload) -> VaultPayload {
        let mut fields = local.fields.clone();
        fields.extend(remote.fields.iter().map(|(k, v)| (k.clone(), v.clone())));

        VaultPayload {
            name: remote.name.clone(),
            notes: remote.notes.clone(),
            fields,
            favorite: local.favorite || remote.favorite,
        }
    }
}

/// Default distance between a merge result and the later of its inputs
///
/// Must be at least the bucket width of the replicas' diff engines, or a
/// merge can land in the bucket other replicas already remember.
pub fn default_revision_step() -> Duration {
    Duration::milliseconds(DEFAULT_GRANULARITY_MS)
}

// ============================================================================
// VaultState
// ============================================================================

/// Local replica plus simulated server state of one account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VaultState {
    local: BTreeMap<ItemId, LocalVaultItem>,
    remote: BTreeMap<ItemId, RemoteVaultItem>,
}

impl VaultState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from item lists; a repeated id keeps the last item
    pub fn from_items(
        local: impl IntoIterator<Item = LocalVaultItem>,
        remote: impl IntoIterator<Item = RemoteVaultItem>,
    ) -> Self {
        Self {
            local: local
                .into_iter()
                .map(|item| (item.local_id().clone(), item))
                .collect(),
            remote: remote
                .into_iter()
                .map(|item| (item.id().clone(), item))
                .collect(),
        }
    }

    /// Local items in local id order
    pub fn local_items(&self) -> Vec<LocalVaultItem> {
        self.local.values().cloned().collect()
    }

    /// Remote items in remote id order
    pub fn remote_items(&self) -> Vec<RemoteVaultItem> {
        self.remote.values().cloned().collect()
    }

    pub fn local(&self, local_id: &ItemId) -> Option<&LocalVaultItem> {
        self.local.get(local_id)
    }

    pub fn local_mut(&mut self, local_id: &ItemId) -> Option<&mut LocalVaultItem> {
        self.local.get_mut(local_id)
    }

    pub fn remote(&self, remote_id: &ItemId) -> Option<&RemoteVaultItem> {
        self.remote.get(remote_id)
    }

    /// Finds the local item linked to `remote_id`
    pub fn local_for_remote(&self, remote_id: &ItemId) -> Option<&LocalVaultItem> {
        self.local
            .values()
            .find(|item| item.remote().is_some_and(|r| &r.id == remote_id))
    }

    /// Inserts or replaces a local item
    pub fn upsert_local(&mut self, item: LocalVaultItem) {
        self.local.insert(item.local_id().clone(), item);
    }

    /// Inserts or replaces a remote item, as another client would
    pub fn upsert_remote(&mut self, item: RemoteVaultItem) {
        self.remote.insert(item.id().clone(), item);
    }

    pub fn remove_remote(&mut self, remote_id: &ItemId) -> Option<RemoteVaultItem> {
        self.remote.remove(remote_id)
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    pub fn remote_len(&self) -> usize {
        self.remote.len()
    }

    /// Applies every action of `diff` as one transaction
    ///
    /// `revision_step` is the minimum distance between a merge result and
    /// the later of its inputs; see [`default_revision_step`].
    ///
    /// # Errors
    /// Returns [`SyncError::Apply`] when an action refers to a local or
    /// remote item that no longer exists; nothing is committed then.
    pub fn apply_diff(
        &mut self,
        diff: SyncDiff<LocalVaultItem, RemoteVaultItem>,
        hook: &dyn MergeHook,
        revision_step: Duration,
    ) -> Result<ApplyOutcome, SyncError> {
        let mut next = self.clone();
        let outcome = next.apply_all(diff, hook, revision_step)?;
        *self = next;
        Ok(outcome)
    }

    fn apply_all(
        &mut self,
        diff: SyncDiff<LocalVaultItem, RemoteVaultItem>,
        hook: &dyn MergeHook,
        revision_step: Duration,
    ) -> Result<ApplyOutcome, SyncError> {
        let parts = diff.into_parts();
        let mut outcome = ApplyOutcome::default();

        for entry in parts.remote_deleted {
            let remote_id = entry.remote.remote_id();
            if self.remote.remove(remote_id).is_none() {
                return Err(vanished(remote_id, "remote item to delete"));
            }
            self.local.remove(entry.local.local_id());
            debug!(remote_id = %remote_id, "Deleted remote item");
            outcome.deleted_remote += 1;
        }

        for entry in parts.local_deleted {
            if self.local.remove(entry.local.local_id()).is_none() {
                warn!(local_id = %entry.local.local_id(), "Local item already gone");
            }
            outcome.deleted_local += 1;
        }

        for entry in parts.remote_put {
            let mut local = self.current_local(&entry.local)?;
            let remote_id = match &entry.remote {
                Some(existing) => {
                    if !self.remote.contains_key(existing.id()) {
                        return Err(vanished(existing.id(), "remote item to update"));
                    }
                    existing.id().clone()
                }
                None => ItemId::generate(),
            };

            let mut pushed = RemoteVaultItem::new(
                remote_id,
                server_date(local.revision_date()),
                local.payload().clone(),
            );
            if let Some(deleted) = local.deleted_date() {
                pushed = pushed.with_deleted_date(server_date(deleted));
            }

            debug!(
                local_id = %local.local_id(),
                remote_id = %pushed.id(),
                force = entry.force,
                "Pushed local item"
            );
            local.confirm_push(&pushed);
            self.upsert_remote(pushed);
            self.upsert_local(local);
            outcome.pushed += 1;
        }

        for entry in parts.local_put {
            let local = match &entry.local {
                Some(local) => {
                    let mut current = self.current_local(local)?;
                    current.adopt_remote(&entry.remote);
                    current
                }
                None => LocalVaultItem::from_remote(&entry.remote),
            };
            debug!(
                local_id = %local.local_id(),
                remote_id = %entry.remote.id(),
                "Pulled remote item"
            );
            self.upsert_local(local);
            outcome.pulled += 1;
        }

        for entry in parts.merge {
            let mut local = self.current_local(&entry.local)?;
            if !self.remote.contains_key(entry.remote.id()) {
                return Err(vanished(entry.remote.id(), "remote item to merge"));
            }

            let merged = hook.merge(local.payload(), entry.remote.payload());
            let latest = LocalLens::effective_date(&local).max(RemoteLens::effective_date(&entry.remote));
            let revision = merge_revision(latest, revision_step, Utc::now());
            let deleted = local.deleted_date().is_some() || entry.remote.is_deleted();

            let mut pushed = RemoteVaultItem::new(entry.remote.id().clone(), revision, merged);
            if deleted {
                pushed = pushed.with_deleted_date(revision);
            }

            debug!(
                local_id = %local.local_id(),
                remote_id = %pushed.id(),
                deleted,
                "Merged diverged item"
            );
            local.adopt_remote(&pushed);
            self.upsert_remote(pushed);
            self.upsert_local(local);
            outcome.merged += 1;
        }

        Ok(outcome)
    }

    /// The stored copy of `item`, which must still exist
    fn current_local(&self, item: &LocalVaultItem) -> Result<LocalVaultItem, SyncError> {
        self.local
            .get(item.local_id())
            .cloned()
            .ok_or_else(|| vanished(item.local_id(), "local item"))
    }
}

/// The server stores revision dates at millisecond precision
fn server_date(date: DateTime<Utc>) -> DateTime<Utc> {
    date.trunc_subsecs(3)
}

/// Revision of a merge result: the later of `now` and one step past `latest`
fn merge_revision(latest: DateTime<Utc>, step: Duration, now: DateTime<Utc>) -> DateTime<Utc> {
    let step = step.max(Duration::milliseconds(1));
    (server_date(latest) + step).max(server_date(now))
}

fn vanished(item: &ItemId, what: &str) -> SyncError {
    SyncError::Apply {
        item: item.clone(),
        reason: format!("{what} no longer exists"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use vaultsync_core::domain::RememberedRemote;
    use vaultsync_diff::diff;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn id(s: &str) -> ItemId {
        ItemId::new(s).unwrap()
    }

    fn never(_: &LocalVaultItem, _: &RemoteVaultItem) -> bool {
        false
    }

    fn round(state: &mut VaultState) -> ApplyOutcome {
        let result = diff(state.local_items(), state.remote_items(), never, never).unwrap();
        state.apply_diff(result, &FieldUnionMerge, default_revision_step()).unwrap()
    }

    #[test]
    fn test_field_union_merge() {
        let local = VaultPayload::named("old")
            .with_field("username", "alice")
            .with_field("password", "local-secret")
            .with_favorite(true);
        let remote = VaultPayload::named("new")
            .with_field("password", "remote-secret")
            .with_field("uri", "https://example.com")
            .with_notes("remote notes");

        let merged = FieldUnionMerge.merge(&local, &remote);
        assert_eq!(merged.name, "new");
        assert_eq!(merged.notes.as_deref(), Some("remote notes"));
        assert!(merged.favorite);
        assert_eq!(merged.fields.len(), 3);
        assert_eq!(merged.fields["password"], "remote-secret");
        assert_eq!(merged.fields["username"], "alice");
    }

    #[test]
    fn test_push_truncates_to_millis_and_settles() {
        let rev = t() + Duration::nanoseconds(1_234_567_891);
        let local = LocalVaultItem::new(VaultPayload::named("a"), rev).with_local_id(id("a"));
        let mut state = VaultState::from_items(vec![local], vec![]);

        let outcome = round(&mut state);
        assert_eq!(outcome.pushed, 1);

        let stored = state.local(&id("a")).unwrap();
        let remembered = stored.remote().unwrap();
        let remote = state.remote(&remembered.id).unwrap();
        assert_eq!(remote.revision_date(), t() + Duration::milliseconds(1_234));
        assert_eq!(stored.revision_date(), remote.revision_date());

        assert_eq!(round(&mut state).total(), 0);
    }

    #[test]
    fn test_pull_creates_linked_local_copy() {
        let remote = RemoteVaultItem::new(id("r1"), t(), VaultPayload::named("server"));
        let mut state = VaultState::from_items(vec![], vec![remote]);

        assert_eq!(round(&mut state).pulled, 1);
        let local = state.local_for_remote(&id("r1")).unwrap();
        assert_eq!(local.payload().name, "server");
        assert_eq!(local.revision_date(), t());
    }

    #[test]
    fn test_merge_revision_is_past_both_inputs() {
        let latest = t() + Duration::nanoseconds(8_000_400_000);
        let step = Duration::milliseconds(100);

        // Old data: one step past the later input, on the millisecond grid
        let revision = merge_revision(latest, step, t());
        assert_eq!(revision, t() + Duration::milliseconds(8_100));

        // Current data: the apply-time clock is later still
        let now = t() + Duration::hours(1);
        assert_eq!(merge_revision(latest, step, now), now);

        // A zero step still moves forward
        assert!(merge_revision(t(), Duration::zero(), t()) > t());
    }

    #[test]
    fn test_merge_pushes_union_at_newer_revision() {
        let local = LocalVaultItem::new(VaultPayload::named("l").with_field("username", "alice"), t() + Duration::seconds(5))
            .with_local_id(id("l1"))
            .with_mergeable(true)
            .linked_to(RememberedRemote::new(id("r1"), t()));
        let remote = RemoteVaultItem::new(
            id("r1"),
            t() + Duration::seconds(8),
            VaultPayload::named("r").with_field("password", "hunter2"),
        );
        let mut state = VaultState::from_items(vec![local], vec![remote]);

        assert_eq!(round(&mut state).merged, 1);

        let remote = state.remote(&id("r1")).unwrap();
        assert!(remote.revision_date() >= t() + Duration::seconds(8) + default_revision_step());
        assert!(!remote.is_deleted());
        assert_eq!(remote.payload().fields.len(), 2);
        assert_eq!(state.local(&id("l1")).unwrap().payload(), remote.payload());
        assert_eq!(round(&mut state).total(), 0);
    }

    #[test]
    fn test_merge_reaches_replica_holding_the_remote_revision() {
        let remote = RemoteVaultItem::new(
            id("r1"),
            t() + Duration::seconds(8),
            VaultPayload::named("r").with_field("password", "p"),
        );
        let edited = LocalVaultItem::new(
            VaultPayload::named("l").with_field("username", "alice"),
            t() + Duration::seconds(5),
        )
        .with_local_id(id("a1"))
        .with_mergeable(true)
        .linked_to(RememberedRemote::new(id("r1"), t()));

        // Replica B already pulled the remote revision A is about to merge with
        let mut replica_b = VaultState::from_items(
            vec![LocalVaultItem::from_remote(&remote).with_local_id(id("b1"))],
            vec![remote.clone()],
        );
        let mut replica_a = VaultState::from_items(vec![edited], vec![remote]);
        assert_eq!(round(&mut replica_a).merged, 1);

        // B sees A's merge in the next snapshot and pulls it
        let merged = replica_a.remote(&id("r1")).unwrap().clone();
        replica_b.upsert_remote(merged.clone());
        let outcome = round(&mut replica_b);
        assert_eq!(outcome.pulled, 1);

        let local_b = replica_b.local(&id("b1")).unwrap();
        assert_eq!(local_b.payload(), merged.payload());
        assert_eq!(local_b.payload().fields["username"], "alice");
        assert_eq!(round(&mut replica_b).total(), 0);
    }

    #[test]
    fn test_merge_keeps_local_tombstone() {
        let deleted = LocalVaultItem::new(VaultPayload::named("l"), t())
            .with_local_id(id("l1"))
            .with_mergeable(true)
            .linked_to(RememberedRemote::new(id("r1"), t()))
            .with_deleted_date(t() + Duration::seconds(5));
        let remote = RemoteVaultItem::new(id("r1"), t() + Duration::seconds(8), VaultPayload::named("r"));
        let mut state = VaultState::from_items(vec![deleted], vec![remote]);

        assert_eq!(round(&mut state).merged, 1);

        let remote = state.remote(&id("r1")).unwrap();
        assert!(remote.is_deleted());
        let local = state.local(&id("l1")).unwrap();
        assert!(local.is_deleted());
        assert_eq!(local.deleted_date(), remote.deleted_date());
        assert_eq!(round(&mut state).total(), 0);
    }

    #[test]
    fn test_remote_delete_removes_both_sides() {
        let local = LocalVaultItem::new(VaultPayload::named("x"), t())
            .with_local_id(id("l1"))
            .linked_to(RememberedRemote::new(id("r1"), t()))
            .with_deleted_date(t() + Duration::seconds(2));
        let remote = RemoteVaultItem::new(id("r1"), t(), VaultPayload::named("x"));
        let mut state = VaultState::from_items(vec![local], vec![remote]);

        assert_eq!(round(&mut state).deleted_remote, 1);
        assert_eq!(state.local_len(), 0);
        assert_eq!(state.remote_len(), 0);
    }

    #[test]
    fn test_failed_apply_commits_nothing() {
        let edited = LocalVaultItem::new(VaultPayload::named("edited"), t() + Duration::seconds(3))
            .with_local_id(id("l1"))
            .linked_to(RememberedRemote::new(id("r1"), t()));
        let fresh = LocalVaultItem::new(VaultPayload::named("new"), t()).with_local_id(id("l2"));
        let remote = RemoteVaultItem::new(id("r1"), t(), VaultPayload::named("x"));
        let mut state = VaultState::from_items(vec![edited, fresh], vec![remote]);

        let result = diff(state.local_items(), state.remote_items(), never, never).unwrap();
        // Another client removes r1 between diff and apply
        state.remove_remote(&id("r1"));
        let before = state.clone();

        let err = state
            .apply_diff(result, &FieldUnionMerge, default_revision_step())
            .unwrap_err();
        assert!(matches!(err, SyncError::Apply { ref item, .. } if item.as_str() == "r1"));
        assert_eq!(state, before);
    }
}
