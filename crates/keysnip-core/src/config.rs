use crate::error::{KeysnipError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "config.json";
pub const SNIPPETS_FILENAME: &str = "snippets.json";

pub const DEFAULT_BUFFER_CAPACITY: usize = 100;
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_FAILURE_WINDOW_MS: u64 = 30_000;
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 60_000;
pub const DEFAULT_DELETION_CHUNK_SIZE: usize = 10;
pub const DEFAULT_CURSOR_BATCH_SIZE: usize = 10;

/// How metafields are filled in before a snippet is injected.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetafieldPromptKind {
    /// Ask the user through a native dialog.
    #[default]
    Dialog,
    /// Commit each field's default value without asking.
    Defaults,
}

/// Tunables for the expansion engine.
///
/// Every field has a default so a partial `config.json` is valid.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub buffer_capacity: usize,
    pub inactivity_timeout_ms: u64,
    pub health_check_interval_ms: u64,
    pub failure_window_ms: u64,
    pub quiet_period_ms: u64,
    pub clear_buffer_after_expansion: bool,
    pub deletion_chunk_size: usize,
    pub cursor_batch_size: usize,
    pub metafield_prompt: MetafieldPromptKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT_MS,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            failure_window_ms: DEFAULT_FAILURE_WINDOW_MS,
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            clear_buffer_after_expansion: true,
            deletion_chunk_size: DEFAULT_DELETION_CHUNK_SIZE,
            cursor_batch_size: DEFAULT_CURSOR_BATCH_SIZE,
            metafield_prompt: MetafieldPromptKind::Dialog,
        }
    }
}

impl EngineConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_millis(self.failure_window_ms)
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(KeysnipError::InvalidConfig(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        let intervals = [
            ("inactivity_timeout_ms", self.inactivity_timeout_ms),
            ("health_check_interval_ms", self.health_check_interval_ms),
            ("failure_window_ms", self.failure_window_ms),
            ("quiet_period_ms", self.quiet_period_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(KeysnipError::InvalidConfig(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        if self.deletion_chunk_size == 0 || self.cursor_batch_size == 0 {
            return Err(KeysnipError::InvalidConfig(
                "deletion_chunk_size and cursor_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the keysnip configuration directory
pub fn get_config_dir() -> PathBuf {
    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".keysnip"))
        .unwrap_or_else(|_| PathBuf::from(".keysnip"))
}

/// Get the path to the engine configuration file
pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILENAME)
}

/// Get the path to the snippets file
pub fn get_snippets_file_path() -> PathBuf {
    get_config_dir().join(SNIPPETS_FILENAME)
}

/// Load the engine configuration, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(EngineConfig::default());
    }

    let contents = fs::read_to_string(path)?;
    let config = if contents.trim().is_empty() {
        EngineConfig::default()
    } else {
        serde_json::from_str::<EngineConfig>(&contents)?
    };
    config.validate()?;
    Ok(config)
}
