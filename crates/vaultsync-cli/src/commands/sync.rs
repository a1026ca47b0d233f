//! Sync command - Run one sync round against the JSON-file vault
//!
//! Provides the `vaultsync sync` CLI command which:
//! 1. Resolves the vault and snapshot files (flags, then configuration)
//! 2. Builds a SyncCoordinator over a JsonFileVault
//! 3. Runs one round (or a dry run) and prints the report

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Args;
use tracing::info;

use vaultsync_core::domain::{AccountId, LocalVaultItem, RemoteVaultItem};
use vaultsync_diff::TieBreak;
use vaultsync_sync::{default_revision_step, JsonFileVault, SyncCoordinator, SyncReport};

use super::{engine_for, print_diff, CommandContext};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Account to sync (defaults to sync.account_id, then the nil account)
    #[arg(long)]
    pub account: Option<String>,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Local vault file (defaults to sync.vault_file)
    #[arg(long)]
    pub vault: Option<PathBuf>,

    /// Remote snapshot file (defaults to sync.snapshot_file)
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config = &ctx.config;

        let account = match &self.account {
            Some(raw) => raw
                .parse::<AccountId>()
                .with_context(|| format!("Invalid account id '{raw}'"))?,
            None => config.account_id().context("Invalid sync.account_id")?,
        };
        let vault_path = self.vault.clone().unwrap_or_else(|| config.sync.vault_file.clone());
        let snapshot_path = self
            .snapshot
            .clone()
            .unwrap_or_else(|| config.sync.snapshot_file.clone());

        info!(
            account = %account,
            vault = %vault_path.display(),
            snapshot = %snapshot_path.display(),
            "Preparing sync round"
        );

        // Merges must land outside the bucket other replicas remember
        let step = i64::try_from(config.clock.granularity_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or_else(default_revision_step);
        let vault = Arc::new(JsonFileVault::new(vault_path, snapshot_path).with_revision_step(step));
        let policy = TieBreak::from_config(&config.conflicts.equal_revision_strategy);
        let coordinator: SyncCoordinator<LocalVaultItem, RemoteVaultItem> =
            SyncCoordinator::new(vault.clone(), vault.clone(), vault)
                .with_engine(engine_for(config, None))
                .with_policy(Arc::new(policy));

        if self.dry_run {
            formatter.info("Dry run mode - no changes will be made");
            let diff = coordinator.preview(account).await.context("Dry run failed")?;
            return print_diff(ctx, &diff);
        }

        let report = coordinator
            .sync_account(account)
            .await
            .context("Sync round failed")?;
        print_report(ctx, &report)
    }
}

fn print_report(ctx: &CommandContext, report: &SyncReport) -> Result<()> {
    let formatter = ctx.formatter();

    if ctx.is_json() {
        let json = serde_json::to_value(report).context("Failed to serialize sync report")?;
        formatter.print_json(&json);
        return Ok(());
    }

    if report.applied {
        formatter.success(&format!("Sync completed in {}ms", report.duration_ms));
    } else {
        formatter.success("Already in sync");
    }
    for line in report_lines(report) {
        formatter.info(&line);
    }
    if report.stats.retry_blocked > 0 {
        formatter.warn(&format!(
            "{} push(es) withheld by recorded failures",
            report.stats.retry_blocked
        ));
    }
    Ok(())
}

fn report_lines(report: &SyncReport) -> Vec<String> {
    let o = &report.outcome;
    vec![
        format!("Pulled:         {}", o.pulled),
        format!("Pushed:         {}", o.pushed),
        format!("Merged:         {}", o.merged),
        format!("Deleted local:  {}", o.deleted_local),
        format!("Deleted remote: {}", o.deleted_remote),
        format!("In sync:        {}", report.stats.in_sync),
    ]
}
