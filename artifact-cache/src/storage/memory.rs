use super::table::{Record, Table};
use super::{CollectionId, CollectionKind, StorageAdapter};
use crate::core::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// In-process storage backend
///
/// Cloning yields another handle onto the same tables.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<HashMap<CollectionId, Table>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of every collection opened so far
    pub fn collections(&self) -> Vec<CollectionId> {
        self.tables.read().keys().cloned().collect()
    }

    /// Ensure a table exists for `collection`
    pub(crate) fn register(&self, collection: &CollectionId) {
        self.tables
            .write()
            .entry(collection.clone())
            .or_default();
    }

    /// Records and write version of a collection with unsaved changes
    pub(crate) fn pending(&self, collection: &CollectionId) -> Option<(Vec<Record>, u64)> {
        let tables = self.tables.read();
        let table = tables.get(collection)?;
        table
            .is_dirty()
            .then(|| (table.records(), table.version()))
    }

    pub(crate) fn mark_saved(&self, collection: &CollectionId, version: u64) {
        if let Some(table) = self.tables.write().get_mut(collection) {
            table.mark_saved(version);
        }
    }

    /// Replace a collection's table with persisted records
    pub(crate) fn restore(&self, collection: &CollectionId, records: Vec<Record>) {
        self.tables
            .write()
            .insert(collection.clone(), Table::restore(records));
    }

    fn read<T>(&self, collection: &CollectionId, f: impl FnOnce(&Table) -> T) -> Option<T> {
        self.tables.read().get(collection).map(f)
    }

    fn write<T>(&self, collection: &CollectionId, f: impl FnOnce(&mut Table) -> T) -> T {
        let mut tables = self.tables.write();
        f(tables.entry(collection.clone()).or_default())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn open(&self, namespace: &str, kind: CollectionKind) -> Result<CollectionId> {
        let collection = CollectionId::new(namespace, kind)?;
        self.register(&collection);
        debug!("OPEN collection={}", collection);
        Ok(collection)
    }

    async fn find_one(&self, collection: &CollectionId, key: &str) -> Result<Option<Record>> {
        Ok(self
            .read(collection, |table| table.get(key).cloned())
            .flatten())
    }

    async fn find_all(&self, collection: &CollectionId) -> Result<Vec<Record>> {
        Ok(self
            .read(collection, Table::records)
            .unwrap_or_default())
    }

    async fn find_prefixed(
        &self,
        collection: &CollectionId,
        prefix: &str,
    ) -> Result<Vec<Record>> {
        Ok(self
            .read(collection, |table| table.prefixed(prefix))
            .unwrap_or_default())
    }

    async fn upsert(&self, collection: &CollectionId, key: &str, document: Value) -> Result<()> {
        let is_new = self.write(collection, |table| table.upsert(key, document));
        debug!("UPSERT collection={}, key={}, new={}", collection, key, is_new);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionId, key: &str) -> Result<bool> {
        let removed = self.write(collection, |table| table.remove(key));
        debug!("DELETE collection={}, key={}, removed={}", collection, key, removed);
        Ok(removed)
    }

    async fn delete_all(&self, collection: &CollectionId) -> Result<usize> {
        let count = self.write(collection, Table::clear);
        debug!("DELETE ALL collection={}, count={}", collection, count);
        Ok(count)
    }

    async fn count(&self, collection: &CollectionId) -> Result<usize> {
        Ok(self.read(collection, Table::len).unwrap_or(0))
    }
}
