use crate::core::{CacheError, Result};
use crate::storage::{CollectionId, CollectionKind, StorageAdapter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;

/// Namespaced key/value cache
///
/// Values are stored as opaque JSON through serde; no codec step is applied.
#[derive(Clone)]
pub struct ValueCache {
    storage: Arc<dyn StorageAdapter>,
    collection: CollectionId,
}

impl ValueCache {
    /// Bind to the value collection of `namespace`, loading persisted state
    pub async fn open(storage: Arc<dyn StorageAdapter>, namespace: &str) -> Result<Self> {
        let collection = storage.open(namespace, CollectionKind::Values).await?;
        storage.load(&collection).await?;
        debug!("ValueCache ready namespace={}", namespace);
        Ok(Self {
            storage,
            collection,
        })
    }

    /// Bind to `namespace` with its contents discarded
    ///
    /// Unlike [`ValueCache::open`] followed by `invalidate`, this succeeds when the
    /// persisted data is corrupted; the next flush replaces it.
    pub async fn reset(storage: Arc<dyn StorageAdapter>, namespace: &str) -> Result<Self> {
        let collection = storage.open(namespace, CollectionKind::Values).await?;
        let count = storage.delete_all(&collection).await?;
        debug!("ValueCache reset namespace={}, removed={}", namespace, count);
        Ok(Self {
            storage,
            collection,
        })
    }

    pub fn namespace(&self) -> &str {
        self.collection.namespace()
    }

    /// Store a value, replacing any previous value for `key`
    pub async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        debug!("STORE key={}", key);
        let document = json!({
            "key": key,
            "value": serde_json::to_value(value)?,
        });
        self.storage.upsert(&self.collection, key, document).await
    }

    /// Fetch a value
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] carrying the key when nothing is
    /// stored under it.
    pub async fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        debug!("RETRIEVE key={}", key);
        let record = self
            .storage
            .find_one(&self.collection, key)
            .await?
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;

        let Value::Object(mut document) = record.document else {
            return Err(CacheError::Encoding(format!(
                "stored document for {key} is not an object"
            )));
        };
        let value = document.remove("value").unwrap_or(Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    pub async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self
            .storage
            .find_one(&self.collection, key)
            .await?
            .is_some())
    }

    /// Delete every value in the namespace
    pub async fn invalidate(&self) -> Result<()> {
        let count = self.storage.delete_all(&self.collection).await?;
        debug!("INVALIDATE namespace={}, removed={}", self.namespace(), count);
        Ok(())
    }

    pub async fn len(&self) -> Result<usize> {
        self.storage.count(&self.collection).await
    }

    /// Persist pending writes of this namespace
    pub async fn flush(&self) -> Result<()> {
        self.storage.flush(&self.collection).await
    }
}
