//! Diff command - Classify a local vault file against a snapshot file
//!
//! Provides the `vaultsync diff` CLI command which reads two JSON arrays
//! (local items and remote items), runs the diff engine and prints the five
//! action lists without changing either file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use vaultsync_core::domain::{LocalVaultItem, RemoteVaultItem};
use vaultsync_diff::TieBreak;

use super::{engine_for, print_diff, read_items, CommandContext};

#[derive(Debug, Args)]
pub struct DiffCommand {
    /// JSON file with the local items
    #[arg(long)]
    pub local: PathBuf,

    /// JSON file with the remote snapshot
    #[arg(long)]
    pub remote: PathBuf,

    /// Bucket width for revision comparison (defaults to clock.granularity_ms)
    #[arg(long)]
    pub granularity_ms: Option<u64>,

    /// Equal-revision strategy (defaults to conflicts.equal_revision_strategy)
    #[arg(long)]
    pub strategy: Option<String>,
}

impl DiffCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let local: Vec<LocalVaultItem> = read_items(&self.local)?;
        let remote: Vec<RemoteVaultItem> = read_items(&self.remote)?;

        let strategy = self
            .strategy
            .as_deref()
            .unwrap_or(&ctx.config.conflicts.equal_revision_strategy);
        let policy = TieBreak::from_config(strategy);
        let engine = engine_for(&ctx.config, self.granularity_ms);

        info!(
            local = local.len(),
            remote = remote.len(),
            strategy = %policy,
            "Computing diff"
        );

        let diff = engine
            .diff_with(local, remote, &policy)
            .context("Diff rejected its inputs")?;

        print_diff(ctx, &diff)
    }
}
