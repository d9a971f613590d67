//!
//! Registry Configuration
//!
//! Runtime knobs for a `ThreadRegistry`, loaded from the `[registry]` table
//! of a `strand.toml` file:
//!
//! ```toml
//! [registry]
//! stack_size = 262144     # bytes, platform default when omitted
//! name_prefix = "worker"  # threads are named worker-0, worker-1, ...
//! backoff = "yield"       # spin | yield | exponential
//! ```
//!
//! The slot count is not configurable here; it is the compile-time
//! `MAX_THREADS` (or the registry's const parameter).
//!

use std::path::Path;

use serde::{Deserialize, Serialize};
use strand_sync::Backoff;

use crate::error::ConfigError;

/// Maximum number of concurrently registered threads.
pub const MAX_THREADS: usize = 64;

/// Smallest stack a spawned thread may ask for.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub stack_size: Option<usize>,
    pub name_prefix: Option<String>,
    pub backoff: Backoff,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    registry: RegistryConfig,
}

impl RegistryConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(source)?;
        file.registry.validate()?;
        Ok(file.registry)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(ConfigError::Invalid(format!(
                    "stack_size {} is below the minimum of {} bytes",
                    size, MIN_STACK_SIZE
                )));
            }
        }
        if let Some(prefix) = &self.name_prefix {
            if prefix.trim().is_empty() {
                return Err(ConfigError::Invalid("name_prefix must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Name given to the thread occupying slot `index`, if names are enabled.
    pub fn thread_name(&self, index: usize) -> Option<String> {
        self.name_prefix
            .as_ref()
            .map(|prefix| format!("{}-{}", prefix, index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_config() {
        let config = RegistryConfig::from_toml_str(
            r#"
[registry]
stack_size = 262144
name_prefix = "worker"
backoff = "yield"
"#,
        )
        .unwrap();

        assert_eq!(config.stack_size, Some(262144));
        assert_eq!(config.name_prefix.as_deref(), Some("worker"));
        assert_eq!(config.backoff, Backoff::Yield);
        assert_eq!(config.thread_name(7).as_deref(), Some("worker-7"));
    }

    #[test]
    fn test_missing_table_uses_defaults() {
        let config = RegistryConfig::from_toml_str("").unwrap();
        assert_eq!(config, RegistryConfig::default());
        assert_eq!(config.backoff, Backoff::Exponential);
        assert!(config.thread_name(0).is_none());
    }

    #[test]
    fn test_rejects_small_stack() {
        let err = RegistryConfig::from_toml_str("[registry]\nstack_size = 1024\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("stack_size"));
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let err = RegistryConfig::from_toml_str("[registry]\nname_prefix = \"  \"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_backoff_and_fields() {
        let err = RegistryConfig::from_toml_str("[registry]\nbackoff = \"sleep\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = RegistryConfig::from_toml_str("[registry]\nthreads = 8\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("strand.toml");
        fs::write(&path, "[registry]\nbackoff = \"spin\"\n").unwrap();

        let config = RegistryConfig::load(&path).unwrap();
        assert_eq!(config.backoff, Backoff::Spin);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("missing.toml");

        let err = RegistryConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("missing.toml"));
    }

    #[test]
    fn test_builder_methods() {
        let config = RegistryConfig::default()
            .with_stack_size(MIN_STACK_SIZE)
            .with_name_prefix("io")
            .with_backoff(Backoff::Spin);
        assert!(config.validate().is_ok());
        assert_eq!(config.thread_name(2).as_deref(), Some("io-2"));
    }
}
