//! Storage adapter contract shared by the caches
//!
//! A backend holds one collection per `(namespace, kind)` pair. Each
//! collection maps a unique key (`path` for files, `key` for values) to a
//! JSON document. Two backends are provided:
//!
//! - [`MemoryStorage`]: in-process tables, nothing survives the process
//! - [`FileStorage`]: the same tables persisted to one data file per collection

pub mod file;
pub mod memory;
pub mod table;

pub use file::{FileStorage, FlushMode};
pub use memory::MemoryStorage;
pub use table::{Record, Table};

use crate::core::{CacheError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// What a collection holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Files,
    Values,
}

impl CollectionKind {
    /// Document field holding the collection's unique key
    pub fn unique_field(&self) -> &'static str {
        match self {
            Self::Files => "path",
            Self::Values => "key",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Values => "values",
        }
    }
}

/// Handle to one collection of a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionId {
    namespace: String,
    kind: CollectionKind,
}

impl CollectionId {
    pub fn new(namespace: &str, kind: CollectionKind) -> Result<Self> {
        if namespace.is_empty()
            || namespace.contains(['/', '\\', '\0'])
            || namespace == "."
            || namespace == ".."
        {
            return Err(CacheError::InvalidNamespace(namespace.to_string()));
        }

        Ok(Self {
            namespace: namespace.to_string(),
            kind,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Data file name used by [`FileStorage`]
    pub fn file_name(&self) -> String {
        format!("{}-{}.db", self.namespace, self.kind.as_str())
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.kind.as_str())
    }
}

/// Operations the caches need from a storage backend
///
/// All lookups filter on the collection's unique field. Records come back in
/// insertion order; replacing a record keeps its original position.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Open a collection, creating it if it does not exist
    async fn open(&self, namespace: &str, kind: CollectionKind) -> Result<CollectionId>;

    async fn find_one(&self, collection: &CollectionId, key: &str) -> Result<Option<Record>>;

    async fn find_all(&self, collection: &CollectionId) -> Result<Vec<Record>>;

    /// Records whose key starts with `prefix`
    async fn find_prefixed(&self, collection: &CollectionId, prefix: &str)
    -> Result<Vec<Record>>;

    /// Insert `document` under `key`, replacing any existing document
    async fn upsert(&self, collection: &CollectionId, key: &str, document: Value) -> Result<()>;

    /// Delete the record under `key`, returning whether one existed
    async fn delete(&self, collection: &CollectionId, key: &str) -> Result<bool>;

    /// Delete every record, returning how many were removed
    async fn delete_all(&self, collection: &CollectionId) -> Result<usize>;

    async fn count(&self, collection: &CollectionId) -> Result<usize>;

    /// Make previously persisted state visible to reads. Idempotent.
    async fn load(&self, _collection: &CollectionId) -> Result<()> {
        Ok(())
    }

    /// Durably persist pending writes of one collection. Idempotent.
    async fn flush(&self, _collection: &CollectionId) -> Result<()> {
        Ok(())
    }

    /// Durably persist pending writes of every open collection
    async fn flush_all(&self) -> Result<()> {
        Ok(())
    }
}
