//! Configuration module for VaultSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::AccountId;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for VaultSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub clock: ClockConfig,
    pub conflicts: ConflictsConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings for the file-backed vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// JSON file holding the local replica.
    pub vault_file: PathBuf,
    /// JSON file holding the server snapshot.
    pub snapshot_file: PathBuf,
    /// Account the vault belongs to. `None` uses the nil account.
    #[serde(default)]
    pub account_id: Option<String>,
}

/// Revision clock normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Width of an ordinal bucket in milliseconds. Revision dates that round
    /// into the same bucket count as the same revision.
    pub granularity_ms: u64,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictsConfig {
    /// What to do when both sides sit at the same revision ordinal:
    /// `keep_synced`, `prefer_remote`, or `prefer_local`.
    pub equal_revision_strategy: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit structured JSON log lines instead of human-readable ones.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/vaultsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("vaultsync")
            .join("config.yaml")
    }

    /// Parsed account id, falling back to the nil account when unset.
    pub fn account_id(&self) -> anyhow::Result<AccountId> {
        match &self.sync.account_id {
            Some(raw) => Ok(raw.parse()?),
            None => Ok(AccountId::nil()),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::default()
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.
// (clippy::derivable_impls)

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("vaultsync");
        Self {
            vault_file: data_dir.join("vault.json"),
            snapshot_file: data_dir.join("snapshot.json"),
            account_id: None,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            granularity_ms: 100,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            equal_revision_strategy: "keep_synced".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"clock.granularity_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.equal_revision_strategy`.
pub const VALID_EQUAL_REVISION_STRATEGIES: &[&str] = &["keep_synced", "prefer_remote", "prefer_local"];

/// Largest accepted bucket width (one day). Wider buckets would merge
/// unrelated edits into one revision.
const MAX_GRANULARITY_MS: u64 = 86_400_000;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.vault_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.vault_file".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.snapshot_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.snapshot_file".into(),
                message: "must not be empty".into(),
            });
        }
        if !self.sync.vault_file.as_os_str().is_empty()
            && self.sync.vault_file == self.sync.snapshot_file
        {
            errors.push(ValidationError {
                field: "sync.snapshot_file".into(),
                message: "must differ from sync.vault_file".into(),
            });
        }
        if let Some(raw) = &self.sync.account_id {
            if raw.parse::<AccountId>().is_err() {
                errors.push(ValidationError {
                    field: "sync.account_id".into(),
                    message: format!("not a valid UUID: '{raw}'"),
                });
            }
        }

        // --- clock ---
        if self.clock.granularity_ms == 0 {
            errors.push(ValidationError {
                field: "clock.granularity_ms".into(),
                message: "must be greater than 0".into(),
            });
        } else if self.clock.granularity_ms > MAX_GRANULARITY_MS {
            errors.push(ValidationError {
                field: "clock.granularity_ms".into(),
                message: format!("must not exceed {MAX_GRANULARITY_MS}"),
            });
        }

        // --- conflicts ---
        if !VALID_EQUAL_REVISION_STRATEGIES.contains(&self.conflicts.equal_revision_strategy.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.equal_revision_strategy".into(),
                message: format!(
                    "invalid strategy '{}'; valid: {}",
                    self.conflicts.equal_revision_strategy,
                    VALID_EQUAL_REVISION_STRATEGIES.join(", ")
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use vaultsync_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .clock_granularity_ms(1000)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_vault_file(mut self, path: PathBuf) -> Self {
        self.config.sync.vault_file = path;
        self
    }

    pub fn sync_snapshot_file(mut self, path: PathBuf) -> Self {
        self.config.sync.snapshot_file = path;
        self
    }

    pub fn sync_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.config.sync.account_id = Some(account_id.into());
        self
    }

    // --- clock ---

    pub fn clock_granularity_ms(mut self, ms: u64) -> Self {
        self.config.clock.granularity_ms = ms;
        self
    }

    // --- conflicts ---

    pub fn conflicts_equal_revision_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.equal_revision_strategy = strategy.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
