//! Grouping pass over the local replica
//!
//! Splits local items into never-synced ones and ones linked to a remote id,
//! and groups the linked ones by that id. The diff engine consumes groups as
//! it matches remote items; whatever is left afterwards lost its remote
//! counterpart.

use std::collections::BTreeMap;

use vaultsync_core::domain::{ItemId, RememberedRemote};

use crate::lens::LocalLens;

/// A local item together with the remote state it remembers
#[derive(Debug)]
pub struct Linked<L> {
    pub item: L,
    pub remembered: RememberedRemote,
}

/// Local items organized for matching against a remote snapshot
///
/// Groups keep the input order of their members, which is the documented
/// tie-break when duplicates share the same effective date.
#[derive(Debug)]
pub struct LocalGroups<L> {
    unlinked: Vec<L>,
    by_remote_id: BTreeMap<ItemId, Vec<Linked<L>>>,
}

impl<L: LocalLens> LocalGroups<L> {
    /// Partitions and groups the local items
    pub fn partition(items: impl IntoIterator<Item = L>) -> Self {
        let mut unlinked = Vec::new();
        let mut by_remote_id: BTreeMap<ItemId, Vec<Linked<L>>> = BTreeMap::new();

        for item in items {
            match item.remembered_remote() {
                Some(remembered) => by_remote_id
                    .entry(remembered.id.clone())
                    .or_default()
                    .push(Linked { item, remembered }),
                None => unlinked.push(item),
            }
        }

        Self {
            unlinked,
            by_remote_id,
        }
    }

    /// Removes and returns the group linked to `remote_id`
    pub fn take(&mut self, remote_id: &ItemId) -> Option<Vec<Linked<L>>> {
        self.by_remote_id.remove(remote_id)
    }

    /// Number of linked groups not yet consumed
    pub fn remaining_groups(&self) -> usize {
        self.by_remote_id.len()
    }

    /// Number of never-synced items
    pub fn unlinked_count(&self) -> usize {
        self.unlinked.len()
    }

    /// Consumes the structure, returning the unmatched linked groups
    /// (in remote id order) and the never-synced items
    pub fn into_leftovers(self) -> (Vec<(ItemId, Vec<Linked<L>>)>, Vec<L>) {
        (self.by_remote_id.into_iter().collect(), self.unlinked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use vaultsync_core::domain::{LocalVaultItem, VaultPayload};

    fn linked(local: &str, remote: &str) -> LocalVaultItem {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        LocalVaultItem::new(VaultPayload::named(local), t)
            .with_local_id(ItemId::new(local).unwrap())
            .linked_to(RememberedRemote::new(ItemId::new(remote).unwrap(), t))
    }

    fn unlinked(local: &str) -> LocalVaultItem {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        LocalVaultItem::new(VaultPayload::named(local), t).with_local_id(ItemId::new(local).unwrap())
    }

    #[test]
    fn test_partition_splits_linked_and_unlinked() {
        let groups = LocalGroups::partition(vec![linked("l1", "r1"), unlinked("l2"), linked("l3", "r3")]);
        assert_eq!(groups.remaining_groups(), 2);
        assert_eq!(groups.unlinked_count(), 1);
    }

    #[test]
    fn test_duplicates_grouped_in_input_order() {
        let mut groups =
            LocalGroups::partition(vec![linked("l1", "r1"), linked("l2", "r1"), linked("l3", "r1")]);
        let group = groups.take(&ItemId::new("r1").unwrap()).unwrap();
        let ids: Vec<&str> = group.iter().map(|l| l.item.local_id().as_str()).collect();
        assert_eq!(ids, vec!["l1", "l2", "l3"]);
    }

    #[test]
    fn test_take_consumes_group() {
        let mut groups = LocalGroups::partition(vec![linked("l1", "r1")]);
        let r1 = ItemId::new("r1").unwrap();
        assert!(groups.take(&r1).is_some());
        assert!(groups.take(&r1).is_none());
        assert_eq!(groups.remaining_groups(), 0);
    }

    #[test]
    fn test_leftovers_are_ordered_by_remote_id() {
        let groups = LocalGroups::partition(vec![linked("l1", "r9"), linked("l2", "r2"), linked("l3", "r5")]);
        let (leftovers, unlinked) = groups.into_leftovers();
        let ids: Vec<&str> = leftovers.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r5", "r9"]);
        assert!(unlinked.is_empty());
    }
}
