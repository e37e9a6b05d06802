//! Namespaced file and value cache for static site build pipelines.
//!
//! A build step opens a [`FileCache`] or [`ValueCache`] bound to a namespace
//! on a shared storage backend, stores what it produced, and retrieves it on
//! the next run to skip recomputation.
//!
//! ```rust,ignore
//! use artifact_cache::{CacheConfig, FileCache, FileRecord};
//!
//! let storage = CacheConfig::default().open_storage();
//! let pages = FileCache::open(storage.clone(), "pages").await?;
//! pages.store("index.html", &FileRecord::with_contents(html)).await?;
//! storage.flush_all().await?;
//! ```

pub mod cache;
pub mod config;
pub mod core;
pub mod logging;
pub mod storage;

// Re-export commonly used types
pub use cache::{FileCache, ValueCache};
pub use config::{Backend, CacheConfig, LoggingConfig, StorageConfig};
pub use core::{CacheError, FieldValue, FileMap, FileRecord, GlobMask, Result};
pub use storage::{
    CollectionId, CollectionKind, FileStorage, FlushMode, MemoryStorage, Record, StorageAdapter,
};
