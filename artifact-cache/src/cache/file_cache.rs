use crate::core::codec;
use crate::core::{CacheError, FileMap, FileRecord, GlobMask, Result};
use crate::storage::{CollectionId, CollectionKind, Record, StorageAdapter};
use serde_json::{Value, json};
use std::borrow::Borrow;
use std::sync::Arc;
use tracing::{debug, warn};

/// Field of the stored document holding the encoded payload
const FILE_FIELD: &str = "file";

/// Namespaced cache of build artifacts keyed by path
///
/// Payloads go through [`codec`], so byte buffers and timestamps come back
/// with their original types.
#[derive(Clone)]
pub struct FileCache {
    storage: Arc<dyn StorageAdapter>,
    collection: CollectionId,
}

impl FileCache {
    /// Bind to the file collection of `namespace`, loading persisted state
    pub async fn open(storage: Arc<dyn StorageAdapter>, namespace: &str) -> Result<Self> {
        let collection = storage.open(namespace, CollectionKind::Files).await?;
        storage.load(&collection).await?;
        debug!("FileCache ready namespace={}", namespace);
        Ok(Self {
            storage,
            collection,
        })
    }

    /// Bind to `namespace` with its contents discarded
    ///
    /// Unlike [`FileCache::open`] followed by `invalidate`, this succeeds when the
    /// persisted data is corrupted; the next flush replaces it.
    pub async fn reset(storage: Arc<dyn StorageAdapter>, namespace: &str) -> Result<Self> {
        let collection = storage.open(namespace, CollectionKind::Files).await?;
        let count = storage.delete_all(&collection).await?;
        debug!("FileCache reset namespace={}, removed={}", namespace, count);
        Ok(Self {
            storage,
            collection,
        })
    }

    pub fn namespace(&self) -> &str {
        self.collection.namespace()
    }

    /// Store a file, replacing any previous payload for `path`
    pub async fn store(&self, path: &str, file: &FileRecord) -> Result<()> {
        debug!("STORE path={}, fields={}", path, file.len());
        let document = json!({
            "path": path,
            "file": codec::encode(file)?,
        });
        self.storage.upsert(&self.collection, path, document).await
    }

    /// Store many files
    ///
    /// Every entry is attempted. The first failure is returned once all
    /// entries were tried; entries stored before or after it stay stored.
    pub async fn store_many<I, K, F>(&self, files: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, F)>,
        K: AsRef<str>,
        F: Borrow<FileRecord>,
    {
        let mut first_error = None;
        let mut stored = 0usize;

        for (path, file) in files {
            let path = path.as_ref();
            match self.store(path, file.borrow()).await {
                Ok(()) => stored += 1,
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => warn!("Additional failure storing {}: {}", path, e),
            }
        }

        debug!("STORE MANY stored={}, failed={}", stored, first_error.is_some());
        first_error.map_or(Ok(()), Err)
    }

    /// Look up a file; absence is `Ok(None)`
    pub async fn retrieve(&self, path: &str) -> Result<Option<FileRecord>> {
        debug!("RETRIEVE path={}", path);
        match self.storage.find_one(&self.collection, path).await? {
            Some(record) => Ok(Some(decode_record(record)?.1)),
            None => Ok(None),
        }
    }

    /// Every stored file
    pub async fn all(&self) -> Result<FileMap> {
        let records = self.storage.find_all(&self.collection).await?;
        decode_records(records)
    }

    /// Paths of every stored file, without decoding payloads
    pub async fn paths(&self) -> Result<Vec<String>> {
        let records = self.storage.find_all(&self.collection).await?;
        Ok(records.into_iter().map(|r| r.key).collect())
    }

    /// Files whose path matches the glob `pattern`
    pub async fn matching(&self, pattern: &str) -> Result<FileMap> {
        let mask = GlobMask::new(pattern)?;
        let candidates = self
            .storage
            .find_prefixed(&self.collection, mask.literal_prefix())
            .await?;

        debug!(
            "MATCH pattern={}, prefix={:?}, candidates={}",
            pattern,
            mask.literal_prefix(),
            candidates.len()
        );

        decode_records(candidates.into_iter().filter(|r| mask.is_match(&r.key)))
    }

    /// Delete the file at `path`, returning whether it existed
    pub async fn remove(&self, path: &str) -> Result<bool> {
        debug!("REMOVE path={}", path);
        self.storage.delete(&self.collection, path).await
    }

    /// Delete every file in the namespace
    pub async fn invalidate(&self) -> Result<()> {
        let count = self.storage.delete_all(&self.collection).await?;
        debug!("INVALIDATE namespace={}, removed={}", self.namespace(), count);
        Ok(())
    }

    pub async fn len(&self) -> Result<usize> {
        self.storage.count(&self.collection).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Persist pending writes of this namespace
    pub async fn flush(&self) -> Result<()> {
        self.storage.flush(&self.collection).await
    }
}

fn decode_record(record: Record) -> Result<(String, FileRecord)> {
    let Value::Object(mut document) = record.document else {
        return Err(CacheError::Encoding(format!(
            "stored document for {} is not an object",
            record.key
        )));
    };

    let payload = document.remove(FILE_FIELD).ok_or_else(|| {
        CacheError::Encoding(format!("stored document for {} has no payload", record.key))
    })?;

    Ok((record.key, codec::decode(payload)?))
}

fn decode_records(records: impl IntoIterator<Item = Record>) -> Result<FileMap> {
    records.into_iter().map(decode_record).collect()
}
