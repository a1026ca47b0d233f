//! Error types for the diff engine
//!
//! Conflicts, duplicates, rounding drift and blocked retries are all modeled
//! as data in the diff result. The variants here are caller bugs: inputs the
//! engine refuses to classify.

use thiserror::Error;

use vaultsync_core::domain::ItemId;

/// Precondition violations detected before any classification happens
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DiffError {
    /// Two local records share the same local id
    #[error("duplicate local id in local items: {0}")]
    DuplicateLocalId(ItemId),

    /// Two remote records share the same remote id
    #[error("duplicate remote id in remote snapshot: {0}")]
    DuplicateRemoteId(ItemId),
}
