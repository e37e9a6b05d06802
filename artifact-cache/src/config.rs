use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::storage::{FileStorage, FlushMode, MemoryStorage, StorageAdapter};

/// Main cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Which storage backend to use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: Backend,
    pub directory: PathBuf,
    pub flush_mode: FlushMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            directory: PathBuf::from("cache"),
            flush_mode: FlushMode::Manual,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: CacheConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Build the configured storage backend
    ///
    /// Construct this once per process and hand the same handle to every
    /// cache; two handles on one directory overwrite each other's saves.
    pub fn open_storage(&self) -> Arc<dyn StorageAdapter> {
        match self.storage.backend {
            Backend::Memory => Arc::new(MemoryStorage::new()),
            Backend::File => Arc::new(FileStorage::new(
                self.storage.directory.clone(),
                self.storage.flush_mode,
            )),
        }
    }
}
