//! Config command - View and manage VaultSync configuration
//!
//! Provides the `vaultsync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Writes a default configuration file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use vaultsync_core::config::Config;

use super::CommandContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "clock.granularity_ms")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Set { key, value } => execute_set(ctx, key, value),
            ConfigCommand::Validate => execute_validate(ctx),
            ConfigCommand::Init { force } => execute_init(ctx, *force),
        }
    }
}

fn execute_show(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if ctx.is_json() {
        let json = serde_json::to_value(&ctx.config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        formatter.info("");

        let yaml = serde_yaml::to_string(&ctx.config)
            .context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_set(ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
    let formatter = ctx.formatter();
    let mut config = ctx.config.clone();

    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            formatter.info("  sync.vault_file                     - Local vault JSON file");
            formatter.info("  sync.snapshot_file                  - Remote snapshot JSON file");
            formatter.info("  sync.account_id                     - Account UUID");
            formatter.info("  clock.granularity_ms                - Revision bucket width (ms)");
            formatter.info("  conflicts.equal_revision_strategy   - keep_synced|prefer_remote|prefer_local");
            formatter.info("  logging.level                       - trace|debug|info|warn|error");
            formatter.info("  logging.json                        - true|false");
        }
        return Ok(());
    }

    let errors = config.validate();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": messages,
            }));
        } else {
            formatter.error(&format!("Invalid value for '{}': {}", key, messages.join("; ")));
        }
        return Ok(());
    }

    save_config(&config, &ctx.config_path)?;

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": ctx.config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Set {} = {}", key, value));
        formatter.info(&format!("Saved to {}", ctx.config_path.display()));
    }
    Ok(())
}

fn execute_validate(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let config_path = &ctx.config_path;

    // Load explicitly: a parse error must be reported, not defaulted away
    let config = match Config::load(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {e}")
            } else {
                "Configuration file not found. Using defaults.".to_string()
            };
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
                formatter.info("Run 'vaultsync config init' to create one.");
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if ctx.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!("Configuration has {} error(s)", errors.len()));
        for error in &errors {
            formatter.info(&format!("- {error}"));
        }
    }

    Ok(())
}

fn execute_init(ctx: &CommandContext, force: bool) -> Result<()> {
    let formatter = ctx.formatter();

    if ctx.config_path.exists() && !force {
        formatter.error(&format!(
            "Configuration already exists at {} (use --force to overwrite)",
            ctx.config_path.display()
        ));
        return Ok(());
    }

    save_config(&Config::default(), &ctx.config_path)?;

    if ctx.is_json() {
        formatter.print_json(&serde_json::json!({
            "success": true,
            "config_path": ctx.config_path.display().to_string(),
        }));
    } else {
        formatter.success(&format!("Wrote default configuration to {}", ctx.config_path.display()));
    }
    Ok(())
}

fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).context("Failed to write configuration file")?;
    Ok(())
}

/// Applies a dot-notation key to a configuration
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "sync.vault_file" => config.sync.vault_file = PathBuf::from(value),
        "sync.snapshot_file" => config.sync.snapshot_file = PathBuf::from(value),
        "sync.account_id" => {
            config.sync.account_id = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        "clock.granularity_ms" => {
            config.clock.granularity_ms = value
                .parse::<u64>()
                .context("Expected a positive integer for clock.granularity_ms")?;
        }
        "conflicts.equal_revision_strategy" => {
            config.conflicts.equal_revision_strategy = value.to_string();
        }
        "logging.level" => config.logging.level = value.to_string(),
        "logging.json" => {
            config.logging.json = value
                .parse::<bool>()
                .context("Expected true or false for logging.json")?;
        }
        _ => anyhow::bail!("Unknown configuration key: {key}"),
    }
    Ok(())
}
