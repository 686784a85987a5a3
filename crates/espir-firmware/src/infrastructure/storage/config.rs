//! TOML-based firmware configuration.
//!
//! Example `espir.toml`:
//!
//! ```toml
//! [firmware]
//! log_level = "info"
//! poll_interval_ms = 50
//! restart_delay_ms = 1000
//!
//! [learning]
//! default_timeout_ms = 15000
//! max_timeout_ms = 60000
//!
//! [storage]
//! path = "espir-store.bin"
//! size = 4096
//!
//! [hardware]
//! ready = true
//! learn_after_polls = 20
//!
//! [hardware.learn_fixture]
//! protocol = "NEC"
//! value = "20df10ef"
//! bits = 32
//! ```
//!
//! # Serde default values
//!
//! Every section and every field has a default, so an empty or partial file
//! works, and a missing file means "all defaults".  Fields annotated with
//! `#[serde(default = "some_fn")]` use the return value of `some_fn()` when
//! absent.

use std::path::{Path, PathBuf};

use espir_core::domain::limits::{
    DEFAULT_LEARN_TIMEOUT_MS, DEFAULT_STORE_SIZE, MAX_LEARN_TIMEOUT_MS, RESTART_DELAY_MS,
};
use espir_core::storage::codec::HEADER_SIZE;
use espir_core::IrCodeJson;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The values parse but do not make sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level firmware configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FirmwareConfig {
    #[serde(default)]
    pub firmware: FirmwareSection,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

/// Runtime behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirmwareSection {
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Control-loop tick period.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Pause between acknowledging RESET and restarting.
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
}

/// LEARN timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LearningConfig {
    #[serde(default = "default_learn_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_max_learn_timeout_ms")]
    pub max_timeout_ms: u64,
}

/// Catalog region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Region size in bytes.
    #[serde(default = "default_store_size")]
    pub size: usize,
}

/// Simulated IR front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HardwareConfig {
    #[serde(default = "default_true")]
    pub ready: bool,
    /// Learn-mode polls before the fixture is captured.
    #[serde(default = "default_learn_after_polls")]
    pub learn_after_polls: u32,
    /// Code "received" automatically during LEARN.  Kept last so it
    /// serialises as a trailing sub-table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learn_fixture: Option<IrCodeJson>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_poll_interval_ms() -> u64 {
    50
}
fn default_restart_delay_ms() -> u64 {
    RESTART_DELAY_MS
}
fn default_learn_timeout_ms() -> u64 {
    DEFAULT_LEARN_TIMEOUT_MS
}
fn default_max_learn_timeout_ms() -> u64 {
    MAX_LEARN_TIMEOUT_MS
}
fn default_store_path() -> PathBuf {
    PathBuf::from("espir-store.bin")
}
fn default_store_size() -> usize {
    DEFAULT_STORE_SIZE
}
fn default_true() -> bool {
    true
}
fn default_learn_after_polls() -> u32 {
    20
}

impl Default for FirmwareSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            poll_interval_ms: default_poll_interval_ms(),
            restart_delay_ms: default_restart_delay_ms(),
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_learn_timeout_ms(),
            max_timeout_ms: default_max_learn_timeout_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            size: default_store_size(),
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            ready: default_true(),
            learn_after_polls: default_learn_after_polls(),
            learn_fixture: None,
        }
    }
}

impl FirmwareConfig {
    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.firmware.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "firmware.poll_interval_ms must be positive".to_string(),
            ));
        }
        let learning = &self.learning;
        if learning.default_timeout_ms == 0 || learning.default_timeout_ms > learning.max_timeout_ms
        {
            return Err(ConfigError::Invalid(format!(
                "learning.default_timeout_ms must be in 1..={}, got {}",
                learning.max_timeout_ms, learning.default_timeout_ms
            )));
        }
        if self.storage.size < HEADER_SIZE {
            return Err(ConfigError::Invalid(format!(
                "storage.size must be at least {HEADER_SIZE} bytes, got {}",
                self.storage.size
            )));
        }
        Ok(())
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FirmwareConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FirmwareConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating the parent directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &FirmwareConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_config_matches_documented_constants() {
        // Arrange / Act
        let cfg = FirmwareConfig::default();

        // Assert
        assert_eq!(cfg.learning.default_timeout_ms, 15_000);
        assert_eq!(cfg.learning.max_timeout_ms, 60_000);
        assert_eq!(cfg.firmware.restart_delay_ms, 1_000);
        assert_eq!(cfg.storage.size, 4096);
        assert_eq!(cfg.firmware.poll_interval_ms, 50);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: FirmwareConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, FirmwareConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[learning]
default_timeout_ms = 5000
[storage]
path = "/tmp/espir.bin"
"#;

        // Act
        let cfg: FirmwareConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.learning.default_timeout_ms, 5000);
        assert_eq!(cfg.learning.max_timeout_ms, 60_000);
        assert_eq!(cfg.storage.path, PathBuf::from("/tmp/espir.bin"));
        assert_eq!(cfg.storage.size, 4096);
    }

    #[test]
    fn test_learn_fixture_parses_from_nested_table() {
        let toml_str = r#"
[hardware]
learn_after_polls = 3
[hardware.learn_fixture]
protocol = "SONY"
value = "a90"
bits = 12
"#;

        let cfg: FirmwareConfig = toml::from_str(toml_str).expect("deserialize");

        let fixture = cfg.hardware.learn_fixture.expect("fixture present");
        assert_eq!(fixture.protocol, "SONY");
        assert_eq!(fixture.bits, 12);
        assert_eq!(cfg.hardware.learn_after_polls, 3);
    }

    #[test]
    fn test_validate_rejects_default_timeout_above_max() {
        let mut cfg = FirmwareConfig::default();
        cfg.learning.default_timeout_ms = 90_000;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_region_smaller_than_header() {
        let mut cfg = FirmwareConfig::default();
        cfg.storage.size = 2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        let result: Result<FirmwareConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/espir.toml");
        let cfg = load_config(&path).expect("absent file means defaults");
        assert_eq!(cfg, FirmwareConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("espir_test_{}", Uuid::new_v4()));
        let path = dir.join("espir.toml");
        let mut cfg = FirmwareConfig::default();
        cfg.firmware.log_level = "debug".to_string();
        cfg.hardware.learn_fixture = Some(IrCodeJson {
            protocol: "NEC".to_string(),
            value: "20df10ef".to_string(),
            bits: 32,
            raw: Vec::new(),
            description: String::new(),
        });

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }
}
