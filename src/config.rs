use crate::core::{Result, StageError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Where dataset databases live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StorageMode {
    #[default]
    InMemory,
    /// One `<access_id>.sqlite` file per dataset under `path`.
    Directory { path: PathBuf },
}

/// Staging configuration
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Entity objects kept as `sample_rows` per table
    pub sample_size: usize,

    /// Scalar arrays up to this length are stored as `<key>_json`
    pub max_inline_array_len: usize,

    /// Nesting depth up to which plain objects are hoisted into columns
    pub max_flatten_depth: usize,

    /// Leaf count above which a plain object is stored whole as JSON
    pub max_flatten_fields: usize,

    /// Unbounded SELECTs returning more rows than this get a LIMIT hint
    pub large_result_hint_rows: usize,

    pub storage: StorageMode,
}

impl StagingConfig {
    pub fn new() -> Self {
        Self {
            sample_size: 3,
            max_inline_array_len: 10,
            max_flatten_depth: 3,
            max_flatten_fields: 32,
            large_result_hint_rows: 1000,
            storage: StorageMode::InMemory,
        }
    }

    /// Set the number of sample rows kept per table
    pub fn sample_size(mut self, size: usize) -> Self {
        self.sample_size = size;
        self
    }

    /// Set the longest scalar array stored inline
    pub fn max_inline_array_len(mut self, len: usize) -> Self {
        self.max_inline_array_len = len;
        self
    }

    /// Set the maximum flattening depth
    pub fn max_flatten_depth(mut self, depth: usize) -> Self {
        self.max_flatten_depth = depth;
        self
    }

    /// Set the maximum number of hoisted leaves per nested object
    pub fn max_flatten_fields(mut self, fields: usize) -> Self {
        self.max_flatten_fields = fields;
        self
    }

    pub fn large_result_hint_rows(mut self, rows: usize) -> Self {
        self.large_result_hint_rows = rows;
        self
    }

    /// Keep dataset databases as files under `dir`
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage = StorageMode::Directory { path: dir.into() };
        self
    }

    /// Load from a JSON file, e.g. `{"sample_size": 5, "storage": {"mode": "in_memory"}}`
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| StageError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_flatten_depth == 0 {
            return Err(StageError::Config("max_flatten_depth must be > 0".to_string()));
        }

        if self.max_flatten_fields == 0 {
            return Err(StageError::Config("max_flatten_fields must be > 0".to_string()));
        }

        if let StorageMode::Directory { path } = &self.storage {
            if path.as_os_str().is_empty() {
                return Err(StageError::Config("storage directory cannot be empty".to_string()));
            }
        }

        Ok(())
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StagingConfig::default();
        assert_eq!(config.sample_size, 3);
        assert_eq!(config.max_inline_array_len, 10);
        assert_eq!(config.storage, StorageMode::InMemory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StagingConfig::new()
            .sample_size(5)
            .max_flatten_depth(2)
            .storage_dir("/tmp/stagedb");

        assert_eq!(config.sample_size, 5);
        assert_eq!(config.max_flatten_depth, 2);
        assert_eq!(
            config.storage,
            StorageMode::Directory { path: PathBuf::from("/tmp/stagedb") }
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StagingConfig =
            serde_json::from_str(r#"{"sample_size": 1, "storage": {"mode": "directory", "path": "/data"}}"#)
                .unwrap();

        assert_eq!(config.sample_size, 1);
        assert_eq!(config.max_flatten_fields, 32);
        assert_eq!(config.storage, StorageMode::Directory { path: PathBuf::from("/data") });
    }

    #[test]
    fn test_validate() {
        assert!(StagingConfig::new().max_flatten_depth(0).validate().is_err());
        assert!(StagingConfig::new().max_flatten_fields(0).validate().is_err());
        assert!(StagingConfig::new().storage_dir("").validate().is_err());
    }
}
