//! Configuration system for verso.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{VersoError, VersoResult};
use crate::events::DEFAULT_CAPACITY;

/// Versioning configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Path to the record database.
    pub database_path: PathBuf,
    /// How far in the past a snapshot's `updated` and `expires` are set, in
    /// milliseconds.
    pub snapshot_offset_ms: i64,
    /// Retention cap applied by `trim_to_configured`, counting the live
    /// record. 0 disables trimming.
    pub max_versions: i64,
    /// Record kinds that are never versioned.
    pub non_versionable_kinds: Vec<String>,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        let verso_dir = dirs::home_dir()
            .map(|h| h.join(".verso"))
            .unwrap_or_else(|| PathBuf::from(".verso"));

        Self {
            database_path: verso_dir.join("records.db"),
            snapshot_offset_ms: 1000,
            max_versions: 100,
            non_versionable_kinds: Vec::new(),
            event_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl VersioningConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> VersoResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| VersoError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| VersoError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| VersoError::Configuration(e.to_string()))?,
            _ => {
                return Err(VersoError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("VERSO_DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(offset) = env_parse("VERSO_SNAPSHOT_OFFSET_MS") {
            config.snapshot_offset_ms = offset;
        }
        if let Some(max) = env_parse("VERSO_MAX_VERSIONS") {
            config.max_versions = max;
        }
        if let Ok(kinds) = std::env::var("VERSO_NON_VERSIONABLE_KINDS") {
            config.non_versionable_kinds = kinds
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }

        config
    }

    /// Reject values the version manager cannot work with.
    pub fn validate(&self) -> VersoResult<()> {
        if self.snapshot_offset_ms <= 0 {
            return Err(VersoError::Configuration(format!(
                "snapshot_offset_ms must be positive, got {}",
                self.snapshot_offset_ms
            )));
        }
        if self.max_versions < 0 {
            return Err(VersoError::Configuration(format!(
                "max_versions must be zero or greater, got {}",
                self.max_versions
            )));
        }
        Ok(())
    }

    /// Snapshot offset as a duration.
    pub fn snapshot_offset(&self) -> Duration {
        Duration::milliseconds(self.snapshot_offset_ms)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> VersioningConfigBuilder {
        VersioningConfigBuilder::default()
    }
}

fn env_parse(name: &str) -> Option<i64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}: '{}' is not an integer", name, raw);
            None
        }
    }
}

/// Builder for VersioningConfig.
#[derive(Default)]
pub struct VersioningConfigBuilder {
    config: VersioningConfig,
}

impl VersioningConfigBuilder {
    /// Set the database path.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    /// Set the snapshot offset in milliseconds.
    pub fn snapshot_offset_ms(mut self, offset: i64) -> Self {
        self.config.snapshot_offset_ms = offset;
        self
    }

    /// Set the retention cap.
    pub fn max_versions(mut self, max: i64) -> Self {
        self.config.max_versions = max;
        self
    }

    /// Exclude a record kind from versioning.
    pub fn non_versionable_kind(mut self, kind: impl Into<String>) -> Self {
        self.config.non_versionable_kinds.push(kind.into());
        self
    }

    /// Set the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> VersioningConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = VersioningConfig::default();
        assert_eq!(config.snapshot_offset_ms, 1000);
        assert_eq!(config.max_versions, 100);
        assert!(config.database_path.ends_with("records.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = VersioningConfig::builder()
            .database_path("/tmp/verso.db")
            .max_versions(5)
            .snapshot_offset_ms(10)
            .non_versionable_kind("redirect")
            .build();

        assert_eq!(config.database_path, PathBuf::from("/tmp/verso.db"));
        assert_eq!(config.max_versions, 5);
        assert_eq!(config.snapshot_offset(), Duration::milliseconds(10));
        assert_eq!(config.non_versionable_kinds, vec!["redirect".to_string()]);
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let config = VersioningConfig::builder().max_versions(-1).build();
        assert!(matches!(
            config.validate(),
            Err(VersoError::Configuration(_))
        ));

        let config = VersioningConfig::builder().snapshot_offset_ms(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "max_versions = 3\nnon_versionable_kinds = [\"redirect\"]"
        )
        .unwrap();

        let config = VersioningConfig::from_file(file.path()).unwrap();
        assert_eq!(config.max_versions, 3);
        assert_eq!(config.non_versionable_kinds, vec!["redirect".to_string()]);
        assert_eq!(config.snapshot_offset_ms, 1000);
    }

    #[test]
    fn test_from_yaml_and_json_files() {
        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(yaml, "snapshot_offset_ms: 250").unwrap();
        let config = VersioningConfig::from_file(yaml.path()).unwrap();
        assert_eq!(config.snapshot_offset_ms, 250);

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(json, "{{\"max_versions\": 0}}").unwrap();
        let config = VersioningConfig::from_file(json.path()).unwrap();
        assert_eq!(config.max_versions, 0);
    }

    #[test]
    fn test_invalid_file_values_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_versions = -2").unwrap();
        assert!(VersioningConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = VersioningConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, VersoError::Configuration(_)));
    }
}
