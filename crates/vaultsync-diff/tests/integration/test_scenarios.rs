//! Reference scenarios for the classification algorithm

use vaultsync_diff::diff;

use crate::common::*;

#[test]
fn test_new_remote_item_is_pulled() {
    let r1 = remote("r1", t());
    let result = diff(Vec::new(), vec![r1.clone()], never, never).unwrap();

    assert_eq!(result.local_put().len(), 1);
    let entry = &result.local_put()[0];
    assert!(entry.local.is_none());
    assert_eq!(entry.remote, r1);
    assert!(!entry.force);

    assert!(result.remote_deleted().is_empty());
    assert!(result.local_deleted().is_empty());
    assert!(result.remote_put().is_empty());
    assert!(result.merge().is_empty());
}

#[test]
fn test_local_edit_newer_than_unmoved_remote_is_pushed() {
    let l1 = linked("l1", "r1", t() + secs(10), t());
    let result = diff(vec![l1.clone()], vec![remote("r1", t())], never, never).unwrap();

    assert_eq!(result.len(), 1);
    let entry = &result.remote_put()[0];
    assert_eq!(entry.local, l1);
    assert_eq!(entry.remote.as_ref().map(|r| r.id().as_str()), Some("r1"));
    assert!(!entry.force);
}

#[test]
fn test_remote_deletion_drops_local_copy() {
    let l1 = linked("l1", "r1", t(), t());
    let result = diff(vec![l1.clone()], Vec::new(), never, never).unwrap();

    assert_eq!(result.len(), 1);
    let entry = &result.local_deleted()[0];
    assert_eq!(entry.local, l1);
    assert!(entry.remote.is_none());
}

#[test]
fn test_both_sides_changed_merge_eligible_item_is_merged() {
    let l1 = linked("l1", "r1", t() + secs(5), t()).with_mergeable(true);
    let result = diff(vec![l1], vec![remote("r1", t() + secs(8))], never, never).unwrap();

    assert_eq!(result.len(), 1);
    let entry = &result.merge()[0];
    assert_eq!(entry.local.local_id().as_str(), "l1");
    assert_eq!(entry.remote.id().as_str(), "r1");
}

#[test]
fn test_equal_ordinal_with_overwrite_remote_predicate_forces_push() {
    let l1 = linked("l1", "r1", t(), t());
    let result = diff(vec![l1], vec![remote("r1", t())], never, always).unwrap();

    assert_eq!(result.len(), 1);
    let entry = &result.remote_put()[0];
    assert_eq!(entry.local.local_id().as_str(), "l1");
    assert!(entry.force);
}
