//! CLI subcommands

pub mod config;
pub mod diff;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use vaultsync_core::config::Config;
use vaultsync_core::domain::{LocalVaultItem, RemoteVaultItem};
use vaultsync_diff::{BucketedClock, DiffEngine, SyncDiff};

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Everything a command needs from the global flags
pub struct CommandContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
    pub config: Config,
}

impl CommandContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format, self.quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }
}

/// Diff engine configured from `clock.granularity_ms`, or an explicit override
pub fn engine_for(config: &Config, granularity_ms: Option<u64>) -> DiffEngine {
    let granularity = granularity_ms.unwrap_or(config.clock.granularity_ms);
    let granularity = i64::try_from(granularity).unwrap_or(i64::MAX);
    DiffEngine::default().with_clock(BucketedClock::new(granularity))
}

/// Reads a JSON array of items from `path`
pub fn read_items<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// One line per action, for human output
pub fn describe_diff(diff: &SyncDiff<LocalVaultItem, RemoteVaultItem>) -> Vec<String> {
    let mut lines = Vec::new();

    for e in diff.remote_deleted() {
        lines.push(format!("delete remote  {} -> {}", e.local.local_id(), e.remote.id()));
    }
    for e in diff.local_deleted() {
        lines.push(format!("delete local   {}", e.local.local_id()));
    }
    for e in diff.remote_put() {
        let target = e
            .remote
            .as_ref()
            .map_or_else(|| "(new)".to_string(), |r| r.id().to_string());
        let force = if e.force { " [forced]" } else { "" };
        lines.push(format!("push           {} -> {}{}", e.local.local_id(), target, force));
    }
    for e in diff.local_put() {
        let target = e
            .local
            .as_ref()
            .map_or_else(|| "(new)".to_string(), |l| l.local_id().to_string());
        lines.push(format!("pull           {} -> {}", e.remote.id(), target));
    }
    for e in diff.merge() {
        lines.push(format!("merge          {} <> {}", e.local.local_id(), e.remote.id()));
    }

    lines
}

/// Prints a diff in the selected format
pub fn print_diff(ctx: &CommandContext, diff: &SyncDiff<LocalVaultItem, RemoteVaultItem>) -> Result<()> {
    let formatter = ctx.formatter();

    if ctx.is_json() {
        let json = serde_json::json!({
            "remote_deleted": diff.remote_deleted(),
            "local_deleted": diff.local_deleted(),
            "remote_put": diff.remote_put(),
            "local_put": diff.local_put(),
            "merge": diff.merge(),
            "stats": diff.stats(),
        });
        formatter.print_json(&json);
        return Ok(());
    }

    if diff.is_empty() {
        formatter.success("Already in sync");
    } else {
        formatter.success(&format!("{} action(s)", diff.len()));
        for line in describe_diff(diff) {
            formatter.info(&line);
        }
    }

    let stats = diff.stats();
    formatter.info("");
    formatter.info(&format!("In sync:                {}", stats.in_sync));
    if stats.duplicates_dropped > 0 {
        formatter.warn(&format!("{} duplicate local record(s) dropped", stats.duplicates_dropped));
    }
    if stats.rounding_discrepancies > 0 {
        formatter.info(&format!("Rounding discrepancies: {}", stats.rounding_discrepancies));
    }
    if stats.schema_migrations > 0 {
        formatter.info(&format!("Schema migrations:      {}", stats.schema_migrations));
    }
    if stats.retry_blocked > 0 {
        formatter.warn(&format!("{} push(es) withheld by recorded failures", stats.retry_blocked));
    }

    Ok(())
}
