//! VaultSync Diff - Reconciliation of a local vault replica with a server snapshot
//!
//! Provides:
//! - Revision clock normalization ([`BucketedClock`])
//! - Read-only item lenses ([`LocalLens`], [`RemoteLens`])
//! - The pure diff algorithm ([`DiffEngine`], [`diff`])
//! - Equal-revision tie-break policies ([`TieBreak`])
//!
//! The engine performs no I/O. It takes both collections by value and
//! returns a [`SyncDiff`] the caller applies atomically.

pub mod clock;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod lens;
pub mod policy;
pub mod result;

pub use clock::{effective_date, BucketedClock, ClockNormalizer, DEFAULT_GRANULARITY_MS};
pub use engine::DiffEngine;
pub use error::DiffError;
pub use grouping::{Linked, LocalGroups};
pub use lens::{LocalLens, RemoteLens, RetryGate};
pub use policy::{OverwritePolicy, TieBreak};
pub use result::{DiffParts, DiffStats, LocalDelete, LocalPut, Merge, RemoteDelete, RemotePut, SyncDiff};

/// Computes a diff with the default engine (100 ms buckets, current schema)
///
/// # Errors
/// Returns [`DiffError`] when an id occurs twice on the same side.
pub fn diff<L, R, FL, FR>(
    local_items: impl IntoIterator<Item = L>,
    remote_items: impl IntoIterator<Item = R>,
    should_overwrite_local: FL,
    should_overwrite_remote: FR,
) -> Result<SyncDiff<L, R>, DiffError>
where
    L: LocalLens,
    R: RemoteLens,
    FL: FnMut(&L, &R) -> bool,
    FR: FnMut(&L, &R) -> bool,
{
    DiffEngine::default().diff(
        local_items,
        remote_items,
        should_overwrite_local,
        should_overwrite_remote,
    )
}
