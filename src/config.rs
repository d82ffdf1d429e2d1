//! Harness configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults
//! reproduce the reference fixture layout; a user file overrides only the
//! keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [fixtures]
//! root = "fixtures"             # Parent of lonely/ and cluttered/
//! target_name = "test.tif"      # Target file written into both directories
//! target_shape = [1024, 1024, 2]
//! decoy_count = 50              # Decoys written into cluttered/
//! decoy_prefix = "dummy"        # dummy0.tiff, dummy1.tiff, ...
//! decoy_extension = "tiff"
//! decoy_shape = [256, 256]
//!
//! [rounds]
//! warmup = 2                    # Unmeasured rounds per check
//! measured = 5                  # Timed rounds per check
//! reset_per_round = false       # Rebuild fixtures before every round
//!
//! [processing]
//! max_processes = 4             # Scanner workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{Shape, is_stack_file};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Harness configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Fixture layout (directories, names, shapes).
    pub fixtures: FixtureConfig,
    /// Warmup and measured round counts.
    pub rounds: RoundsConfig,
    /// Parallel scanning settings.
    pub processing: ProcessingConfig,
}

impl HarnessConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fixtures = &self.fixtures;
        if !is_stack_file(Path::new(&fixtures.target_name)) {
            return Err(ConfigError::Validation(
                "fixtures.target_name must end in .tif or .tiff".into(),
            ));
        }
        if fixtures.target_name.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "fixtures.target_name must be a bare file name".into(),
            ));
        }
        if fixtures.decoy_prefix.is_empty() || fixtures.decoy_prefix.contains(['/', '\\']) {
            return Err(ConfigError::Validation(
                "fixtures.decoy_prefix must be a non-empty file name prefix".into(),
            ));
        }
        if !is_stack_file(Path::new(&format!("x.{}", fixtures.decoy_extension))) {
            return Err(ConfigError::Validation(
                "fixtures.decoy_extension must be tif or tiff".into(),
            ));
        }
        if fixtures
            .decoy_index(&fixtures.target_name)
            .is_some_and(|i| i < fixtures.decoy_count)
        {
            return Err(ConfigError::Validation(format!(
                "a decoy name collides with target {}",
                fixtures.target_name
            )));
        }
        if self.rounds.measured == 0 {
            return Err(ConfigError::Validation(
                "rounds.measured must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Fixture layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    /// Directory that holds `lonely/` and `cluttered/`.
    pub root: PathBuf,
    pub target_name: String,
    pub target_shape: Shape,
    pub decoy_count: usize,
    pub decoy_prefix: String,
    pub decoy_extension: String,
    pub decoy_shape: Shape,
}

impl FixtureConfig {
    /// File name of decoy `index`, e.g. `dummy7.tiff`.
    pub fn decoy_name(&self, index: usize) -> String {
        format!("{}{}.{}", self.decoy_prefix, index, self.decoy_extension)
    }

    /// Inverse of [`decoy_name`](Self::decoy_name): the index `name` would
    /// have as a decoy, if it has the decoy form at all.
    pub fn decoy_index(&self, name: &str) -> Option<usize> {
        let digits = name
            .strip_prefix(self.decoy_prefix.as_str())?
            .strip_suffix(self.decoy_extension.as_str())?
            .strip_suffix('.')?;
        let index: usize = digits.parse().ok()?;
        (index.to_string() == digits).then_some(index)
    }
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("fixtures"),
            target_name: "test.tif".to_string(),
            target_shape: Shape(vec![1024, 1024, 2]),
            decoy_count: 50,
            decoy_prefix: "dummy".to_string(),
            decoy_extension: "tiff".to_string(),
            decoy_shape: Shape(vec![256, 256]),
        }
    }
}

/// How many times each check runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoundsConfig {
    pub warmup: usize,
    pub measured: usize,
    /// Rebuild the fixture layout before every round instead of once per check.
    pub reset_per_round: bool,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            warmup: 2,
            measured: 5,
            reset_per_round: false,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel scan workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Stock defaults as a TOML table, the base every user file is merged onto.
pub fn stock_defaults_table() -> Result<toml::Table, ConfigError> {
    let text = toml::to_string(&HarnessConfig::default())?;
    Ok(toml::from_str(&text)?)
}

/// Merge `overlay` into `base` in place. Nested tables merge key by key;
/// any other overlay value replaces what `base` had.
pub fn merge_table(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(inner)), toml::Value::Table(nested)) => {
                merge_table(inner, nested)
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Read `dir/config.toml`; `Ok(None)` when the file does not exist.
pub fn read_user_table(dir: &Path) -> Result<Option<toml::Table>, ConfigError> {
    match fs::read_to_string(dir.join("config.toml")) {
        Ok(content) => Ok(Some(toml::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Stock defaults with `overlay` merged on top, deserialized and validated.
pub fn resolve_config(overlay: Option<toml::Table>) -> Result<HarnessConfig, ConfigError> {
    let mut table = stock_defaults_table()?;
    if let Some(overlay) = overlay {
        merge_table(&mut table, overlay);
    }
    let config: HarnessConfig = toml::Value::Table(table).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
pub fn load_config(dir: &Path) -> Result<HarnessConfig, ConfigError> {
    resolve_config(read_user_table(dir)?)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# stackread configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Fixture layout
# ---------------------------------------------------------------------------
[fixtures]
# Directory that receives lonely/ and cluttered/. Both are deleted and
# recreated on every setup, so do not point this at anything you care about.
root = "fixtures"

# Target stack written into both directories. Shape is [width, height, depth...];
# every axis after the first two multiplies the number of pages.
target_name = "test.tif"
target_shape = [1024, 1024, 2]

# Unrelated stacks written next to the target in cluttered/.
decoy_count = 50
decoy_prefix = "dummy"
decoy_extension = "tiff"
decoy_shape = [256, 256]

# ---------------------------------------------------------------------------
# Rounds
# ---------------------------------------------------------------------------
[rounds]
# Unmeasured rounds per check, run before the timed ones.
warmup = 2

# Timed rounds per check (at least 1).
measured = 5

# When true the fixtures are rebuilt before every round (setup time is not
# measured). When false they are built once per check.
reset_per_round = false

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `scan`. Omit to use all CPU cores.
# max_processes = 4
"##
}
