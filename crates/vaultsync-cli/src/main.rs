//! VaultSync CLI - Command-line interface for VaultSync
//!
//! Provides commands for:
//! - Diffing a local vault file against a server snapshot file
//! - Running a sync round against the JSON-file vault
//! - Viewing, validating and creating the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vaultsync_core::config::Config;

mod commands;
mod output;

use commands::{config::ConfigCommand, diff::DiffCommand, sync::SyncCommand, CommandContext};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "vaultsync", version, about = "Vault replica synchronization")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Classify a local vault file against a remote snapshot file
    Diff(DiffCommand),
    /// Run one sync round against the JSON-file vault
    Sync(SyncCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Picks the tracing filter directive: `-v` wins over the configured level,
/// `-q` lowers it to errors only
fn filter_directive(verbose: u8, quiet: bool, configured: &str) -> String {
    match (verbose, quiet) {
        (0, true) => "error".to_string(),
        (0, false) => configured.to_string(),
        (1, _) => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    // Setup tracing; RUST_LOG overrides everything. Logs go to stderr so
    // JSON command output on stdout stays parseable.
    let directive = filter_directive(cli.verbose, cli.quiet, &config.logging.level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let ctx = CommandContext {
        format,
        quiet: cli.quiet,
        config_path,
        config,
    };

    match cli.command {
        Commands::Diff(cmd) => cmd.execute(&ctx).await,
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive(0, false, "warn"), "warn");
        assert_eq!(filter_directive(0, true, "info"), "error");
        assert_eq!(filter_directive(1, true, "info"), "debug");
        assert_eq!(filter_directive(3, false, "info"), "trace");
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vaultsync", "diff", "--local", "a.json", "--remote", "b.json", "--json", "-vv",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Diff(_)));
    }

    #[test]
    fn test_parse_config_subcommands() {
        let cli = Cli::try_parse_from(["vaultsync", "--config", "/tmp/c.yaml", "config", "validate"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.yaml")));
        assert!(matches!(cli.command, Commands::Config(ConfigCommand::Validate)));
    }

    #[test]
    fn test_diff_requires_both_files() {
        assert!(Cli::try_parse_from(["vaultsync", "diff", "--local", "a.json"]).is_err());
    }
}
