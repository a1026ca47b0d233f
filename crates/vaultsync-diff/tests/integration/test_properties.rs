//! Behavioral properties of the diff engine

use std::collections::HashSet;

use vaultsync_core::domain::{
    LocalVaultItem, RemoteVaultItem, SyncFailure, CURRENT_SCHEMA_VERSION,
};
use vaultsync_diff::{diff, BucketedClock, DiffEngine, DiffError, SyncDiff, TieBreak};

use crate::common::*;

/// Rebuilds both sides from a diff the way a sync round would, keeping the
/// remembered-remote bookkeeping current
///
/// Only valid when every input item appears in the diff.
fn apply_all(
    diff: SyncDiff<LocalVaultItem, RemoteVaultItem>,
) -> (Vec<LocalVaultItem>, Vec<RemoteVaultItem>) {
    let parts = diff.into_parts();
    let mut locals = Vec::new();
    let mut remotes = Vec::new();

    for entry in parts.local_put {
        let local = match entry.local {
            Some(mut local) => {
                local.adopt_remote(&entry.remote);
                local
            }
            None => LocalVaultItem::from_remote(&entry.remote),
        };
        locals.push(local);
        remotes.push(entry.remote);
    }

    for mut entry in parts.remote_put {
        let remote_id = match &entry.remote {
            Some(existing) => existing.id().clone(),
            None => id(&format!("srv-{}", entry.local.local_id())),
        };
        let pushed = RemoteVaultItem::new(
            remote_id,
            entry.local.revision_date(),
            entry.local.payload().clone(),
        );
        entry.local.confirm_push(&pushed);
        locals.push(entry.local);
        remotes.push(pushed);
    }

    // Deletions drop both copies; merges are not exercised here
    assert!(parts.merge.is_empty());
    (locals, remotes)
}

#[test]
fn test_second_pass_after_apply_is_empty() {
    let locals = vec![
        linked("l1", "r1", t() + secs(10), t()),
        linked("l2", "r2", t(), t()),
        linked("l3", "gone", t(), t()),
        unlinked("l4", t()),
        unlinked("l5", t()).with_deleted_date(t() + secs(1)),
        linked("l6", "r6", t(), t()).with_deleted_date(t() + secs(3)),
    ];
    let remotes = vec![
        remote("r1", t()),
        remote("r2", t() + secs(4)),
        remote("r6", t()),
        remote("r7", t()),
    ];

    let first = diff(locals, remotes, never, never).unwrap();
    assert!(!first.is_empty());

    let (locals, remotes) = apply_all(first);
    let second = diff(locals, remotes, never, never).unwrap();
    assert!(second.is_empty(), "expected empty diff, got {second:?}");
    assert_eq!(second.stats().in_sync, 4);
}

#[test]
fn test_every_item_lands_in_at_most_one_bucket() {
    let locals = vec![
        linked("a", "r1", t(), t()),
        linked("b", "r1", t() + secs(1), t()),
        linked("c", "r2", t(), t()),
        linked("d", "r3", t() + secs(2), t()).with_mergeable(true),
        unlinked("e", t()),
    ];
    let remotes = vec![remote("r1", t()), remote("r3", t() + secs(5)), remote("r4", t())];

    let result = diff(locals, remotes, never, never).unwrap();

    let mut local_ids = Vec::new();
    let mut remote_ids = Vec::new();
    for e in result.remote_deleted() {
        local_ids.push(e.local.local_id().to_string());
        remote_ids.push(e.remote.id().to_string());
    }
    for e in result.local_deleted() {
        local_ids.push(e.local.local_id().to_string());
        remote_ids.extend(e.remote.iter().map(|r| r.id().to_string()));
    }
    for e in result.remote_put() {
        local_ids.push(e.local.local_id().to_string());
        remote_ids.extend(e.remote.iter().map(|r| r.id().to_string()));
    }
    for e in result.local_put() {
        local_ids.extend(e.local.iter().map(|l| l.local_id().to_string()));
        remote_ids.push(e.remote.id().to_string());
    }
    for e in result.merge() {
        local_ids.push(e.local.local_id().to_string());
        remote_ids.push(e.remote.id().to_string());
    }

    let unique_locals: HashSet<_> = local_ids.iter().collect();
    let unique_remotes: HashSet<_> = remote_ids.iter().collect();
    assert_eq!(unique_locals.len(), local_ids.len());
    assert_eq!(unique_remotes.len(), remote_ids.len());

    // Every local item is accounted for, and every remote item that is not in sync
    assert_eq!(local_ids.len(), 5);
    assert_eq!(unique_remotes.len(), 3);
}

#[test]
fn test_freshest_duplicate_wins() {
    let a = linked("a", "r1", t(), t());
    let b = linked("b", "r1", t() + secs(2), t());

    for locals in [vec![a.clone(), b.clone()], vec![b.clone(), a.clone()]] {
        let result = diff(locals, vec![remote("r1", t())], never, never).unwrap();

        assert_eq!(result.local_deleted().len(), 1);
        assert_eq!(result.local_deleted()[0].local.local_id().as_str(), "a");
        assert_eq!(result.remote_put().len(), 1);
        assert_eq!(result.remote_put()[0].local.local_id().as_str(), "b");
        assert_eq!(result.stats().duplicates_dropped, 1);
    }
}

#[test]
fn test_newer_local_tombstone_never_pushed() {
    let l1 = linked("l1", "r1", t(), t()).with_deleted_date(t() + secs(30));
    let result = diff(vec![l1], vec![remote("r1", t() + secs(10))], never, never);
    // Remote moved since last sync: pulled rather than deleted
    let result = result.unwrap();
    assert!(result.remote_put().is_empty());

    let l1 = linked("l1", "r1", t(), t() + secs(10)).with_deleted_date(t() + secs(30));
    let result = diff(vec![l1], vec![remote("r1", t() + secs(10))], always, always).unwrap();
    assert_eq!(result.remote_deleted().len(), 1);
    assert!(result.remote_put().is_empty());
}

#[test]
fn test_sub_bucket_drift_counts_as_same_revision() {
    // Server truncated the local revision by less than one bucket
    let l1 = linked("l1", "r1", t() + ms(49), t());
    let result = diff(vec![l1], vec![remote("r1", t())], never, never).unwrap();
    assert!(result.remote_put().is_empty());
    assert_eq!(result.local_put().len(), 1);
    assert_eq!(result.stats().rounding_discrepancies, 1);

    // Remembered date drifted the same way: no remote move detected
    let l1 = linked("l1", "r1", t(), t() + ms(30));
    let result = diff(vec![l1], vec![remote("r1", t())], never, never).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.stats().in_sync, 1);
}

#[test]
fn test_granularity_is_injectable() {
    let engine = DiffEngine::default().with_clock(BucketedClock::new(10));
    let l1 = linked("l1", "r1", t() + ms(49), t());
    let result = engine.diff(vec![l1], vec![remote("r1", t())], never, never).unwrap();
    assert_eq!(result.remote_put().len(), 1);
}

#[test]
fn test_permanent_failure_blocks_push_until_edited() {
    let rev = t() + secs(10);
    let failed = linked("l1", "r1", rev, t())
        .with_sync_failure(SyncFailure::permanent("REJECTED", "rejected by server", rev));
    let result = diff(vec![failed.clone()], vec![remote("r1", t())], never, never).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.stats().retry_blocked, 1);

    let mut edited = failed;
    edited.edit(vault_payload("edited"), rev + secs(1));
    let result = diff(vec![edited], vec![remote("r1", t())], never, never).unwrap();
    assert_eq!(result.remote_put().len(), 1);
}

#[test]
fn test_exhausted_retries_block_creation() {
    let mut failure = SyncFailure::new("NETWORK_ERROR", "timeout", t());
    while failure.can_retry(t()) {
        failure.record_attempt();
    }
    let item = unlinked("l1", t()).with_sync_failure(failure);
    let result = diff(vec![item], Vec::new(), never, never).unwrap();
    assert!(result.is_empty());
    assert_eq!(result.stats().retry_blocked, 1);
}

#[test]
fn test_schema_migration_precedes_merge() {
    let l1 = linked("l1", "r1", t() + secs(5), t())
        .with_mergeable(true)
        .with_schema_version(CURRENT_SCHEMA_VERSION - 1);
    let result = diff(vec![l1], vec![remote("r1", t() + secs(8))], never, never).unwrap();
    assert!(result.merge().is_empty());
    assert_eq!(result.local_put().len(), 1);
    assert_eq!(result.stats().schema_migrations, 1);
}

#[test]
fn test_custom_schema_version_target() {
    let l1 = linked("l1", "r1", t(), t());
    let engine = DiffEngine::default().with_schema_version(CURRENT_SCHEMA_VERSION + 1);
    let result = engine.diff(vec![l1], vec![remote("r1", t())], never, never).unwrap();
    assert_eq!(result.local_put().len(), 1);
}

#[test]
fn test_equal_ordinal_retryable_failure_pulls_remote() {
    let l1 = linked("l1", "r1", t(), t()).with_sync_failure(SyncFailure::new("NETWORK_ERROR", "timeout", t()));
    let result = diff(vec![l1], vec![remote("r1", t())], never, always).unwrap();
    assert_eq!(result.local_put().len(), 1);
    assert!(result.remote_put().is_empty());
}

#[test]
fn test_tie_break_policy_drives_predicates() {
    let engine = DiffEngine::default();
    let pair = || (vec![linked("l1", "r1", t(), t())], vec![remote("r1", t())]);

    let (l, r) = pair();
    let result = engine.diff_with(l, r, &TieBreak::KeepSynced).unwrap();
    assert!(result.is_empty());

    let (l, r) = pair();
    let result = engine.diff_with(l, r, &TieBreak::PreferRemote).unwrap();
    assert_eq!(result.local_put().len(), 1);

    let (l, r) = pair();
    let result = engine.diff_with(l, r, &TieBreak::PreferLocal).unwrap();
    assert_eq!(result.remote_put().len(), 1);
    assert!(result.remote_put()[0].force);
}

#[test]
fn test_output_is_deterministic() {
    let build = || {
        (
            vec![
                linked("a", "r9", t(), t()),
                linked("b", "r2", t(), t()),
                unlinked("c", t()),
                unlinked("d", t()),
            ],
            vec![remote("r5", t()), remote("r4", t())],
        )
    };
    let (l, r) = build();
    let first = diff(l, r, never, never).unwrap();
    let (l, r) = build();
    let second = diff(l, r, never, never).unwrap();
    assert_eq!(first, second);

    let dropped: Vec<_> = first.local_deleted().iter().map(|e| e.local.local_id().as_str()).collect();
    assert_eq!(dropped, vec!["b", "a"]);

    // Same items in a different input order give the same diff
    let forward = diff(
        vec![
            linked("la", "r1", t() + secs(5), t()),
            linked("lb", "r2", t() + secs(5), t()),
            unlinked("lc", t()),
            unlinked("ld", t()),
        ],
        vec![remote("r1", t()), remote("r2", t()), remote("r3", t()), remote("r4", t())],
        never,
        never,
    )
    .unwrap();
    let reversed = diff(
        vec![
            unlinked("ld", t()),
            unlinked("lc", t()),
            linked("lb", "r2", t() + secs(5), t()),
            linked("la", "r1", t() + secs(5), t()),
        ],
        vec![remote("r4", t()), remote("r3", t()), remote("r2", t()), remote("r1", t())],
        never,
        never,
    )
    .unwrap();
    assert_eq!(forward, reversed);

    let pushed: Vec<_> = forward.remote_put().iter().map(|e| e.local.local_id().as_str()).collect();
    assert_eq!(pushed, vec!["la", "lb", "lc", "ld"]);
    let pulled: Vec<_> = forward.local_put().iter().map(|e| e.remote.id().as_str()).collect();
    assert_eq!(pulled, vec!["r3", "r4"]);
}

#[test]
fn test_duplicate_ids_fail_fast() {
    let err = diff(
        vec![unlinked("l1", t()), unlinked("l1", t())],
        Vec::<RemoteVaultItem>::new(),
        never,
        never,
    )
    .unwrap_err();
    assert!(matches!(err, DiffError::DuplicateLocalId(ref i) if i.as_str() == "l1"));

    let err = diff(Vec::<LocalVaultItem>::new(), vec![remote("r1", t()), remote("r1", t())], never, never)
        .unwrap_err();
    assert!(matches!(err, DiffError::DuplicateRemoteId(_)));
}

#[test]
fn test_remote_tombstone_pulled_into_local() {
    let l1 = linked("l1", "r1", t(), t());
    let gone = remote("r1", t()).with_deleted_date(t() + secs(5));
    let result = diff(vec![l1], vec![gone], never, never).unwrap();
    assert_eq!(result.local_put().len(), 1);
    assert!(result.local_put()[0].remote.is_deleted());
}

fn vault_payload(name: &str) -> vaultsync_core::domain::VaultPayload {
    vaultsync_core::domain::VaultPayload::named(name)
}
