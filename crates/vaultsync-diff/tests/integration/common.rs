//! Shared fixtures for diff integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};

use vaultsync_core::domain::{ItemId, LocalVaultItem, RememberedRemote, RemoteVaultItem, VaultPayload};

/// Reference instant, aligned to a whole second
pub fn t() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap()
}

pub fn secs(n: i64) -> Duration {
    Duration::seconds(n)
}

pub fn ms(n: i64) -> Duration {
    Duration::milliseconds(n)
}

pub fn id(s: &str) -> ItemId {
    ItemId::new(s).unwrap()
}

pub fn remote(remote_id: &str, rev: DateTime<Utc>) -> RemoteVaultItem {
    RemoteVaultItem::new(id(remote_id), rev, VaultPayload::named(format!("remote {remote_id}")))
}

/// A local record linked to `remote_id`, remembering the remote at `remembered`
pub fn linked(
    local_id: &str,
    remote_id: &str,
    rev: DateTime<Utc>,
    remembered: DateTime<Utc>,
) -> LocalVaultItem {
    LocalVaultItem::new(VaultPayload::named(format!("local {local_id}")), rev)
        .with_local_id(id(local_id))
        .linked_to(RememberedRemote::new(id(remote_id), remembered))
}

/// A never-synced local record
pub fn unlinked(local_id: &str, rev: DateTime<Utc>) -> LocalVaultItem {
    LocalVaultItem::new(VaultPayload::named(format!("local {local_id}")), rev).with_local_id(id(local_id))
}

pub fn never(_: &LocalVaultItem, _: &RemoteVaultItem) -> bool {
    false
}

pub fn always(_: &LocalVaultItem, _: &RemoteVaultItem) -> bool {
    true
}
