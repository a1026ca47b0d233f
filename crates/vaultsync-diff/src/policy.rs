//! Tie-break policy for pairs that sit at the same revision
//!
//! When both sides share an ordinal and their raw dates agree, nothing in the
//! data says which copy should win. The caller decides through an
//! [`OverwritePolicy`]; [`TieBreak`] is the configurable implementation
//! driven by `conflicts.equal_revision_strategy`.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vaultsync_core::config::VALID_EQUAL_REVISION_STRATEGIES;

use crate::engine::DiffEngine;
use crate::error::DiffError;
use crate::lens::{LocalLens, RemoteLens};
use crate::result::SyncDiff;

/// The two equal-revision predicates as one object
pub trait OverwritePolicy<L, R>: Send + Sync {
    /// Pull the remote copy even though both sides look synchronized
    fn should_overwrite_local(&self, local: &L, remote: &R) -> bool;

    /// Force-push the local copy even though both sides look synchronized
    fn should_overwrite_remote(&self, local: &L, remote: &R) -> bool;
}

/// Strategy applied to synchronized-looking pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Leave the pair alone
    #[default]
    KeepSynced,
    /// Re-pull every such pair
    PreferRemote,
    /// Force-push every such pair
    PreferLocal,
}

impl TieBreak {
    /// Accepted configuration strings
    pub const VALID: &'static [&'static str] = VALID_EQUAL_REVISION_STRATEGIES;

    /// Parses a configuration string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "keep_synced" => Some(Self::KeepSynced),
            "prefer_remote" => Some(Self::PreferRemote),
            "prefer_local" => Some(Self::PreferLocal),
            _ => None,
        }
    }

    /// Parses a configuration string, falling back to `KeepSynced`
    ///
    /// An invalid string is logged and ignored.
    pub fn from_config(s: &str) -> Self {
        match Self::parse(s) {
            Some(tie_break) => {
                debug!(strategy = %tie_break, "Equal-revision strategy configured");
                tie_break
            }
            None => {
                warn!(
                    strategy = %s,
                    valid = ?Self::VALID,
                    "Invalid equal-revision strategy, using keep_synced"
                );
                Self::KeepSynced
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeepSynced => "keep_synced",
            Self::PreferRemote => "prefer_remote",
            Self::PreferLocal => "prefer_local",
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<L, R> OverwritePolicy<L, R> for TieBreak {
    fn should_overwrite_local(&self, _local: &L, _remote: &R) -> bool {
        matches!(self, Self::PreferRemote)
    }

    fn should_overwrite_remote(&self, _local: &L, _remote: &R) -> bool {
        matches!(self, Self::PreferLocal)
    }
}

impl DiffEngine {
    /// Computes a diff, taking the equal-revision predicates from `policy`
    ///
    /// # Errors
    /// See [`DiffEngine::diff`].
    pub fn diff_with<L, R, P>(
        &self,
        local_items: impl IntoIterator<Item = L>,
        remote_items: impl IntoIterator<Item = R>,
        policy: &P,
    ) -> Result<SyncDiff<L, R>, DiffError>
    where
        L: LocalLens,
        R: RemoteLens,
        P: OverwritePolicy<L, R> + ?Sized,
    {
        self.diff(
            local_items,
            remote_items,
            |local: &L, remote: &R| policy.should_overwrite_local(local, remote),
            |local: &L, remote: &R| policy.should_overwrite_remote(local, remote),
        )
    }
}
