//! File-backed storage
//!
//! Every collection lives in memory and is persisted to
//! `<directory>/<namespace>-<kind>.db`. The data file format is:
//!
//! ```text
//! magic "ARTCACHE" | version u8 | saved_at u64 | count u64
//! count x (key_len u32 | key | seq u64 | doc_len u32 | doc JSON)
//! crc32 u32 over everything above
//! ```
//!
//! Integers are big-endian. Files are written to a `.tmp` sibling and renamed
//! into place, so a crash mid-save leaves the previous file intact.

use super::memory::MemoryStorage;
use super::table::Record;
use super::{CollectionId, CollectionKind, StorageAdapter};
use crate::core::{CacheError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DATA_MAGIC: &[u8; 8] = b"ARTCACHE";
const DATA_VERSION: u8 = 1;

/// When the file backend writes collections to disk
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlushMode {
    /// Persist after every mutation (safest, slowest)
    Always,
    /// Persist only on an explicit flush
    #[default]
    Manual,
}

/// Storage backend persisting each collection to its own data file
pub struct FileStorage {
    directory: PathBuf,
    flush_mode: FlushMode,
    tables: MemoryStorage,
    loaded: Mutex<HashSet<CollectionId>>,
    save_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(directory: impl Into<PathBuf>, flush_mode: FlushMode) -> Self {
        let directory = directory.into();
        info!(
            "Initializing file storage at {:?} (flush_mode={:?})",
            directory, flush_mode
        );

        Self {
            directory,
            flush_mode,
            tables: MemoryStorage::new(),
            loaded: Mutex::new(HashSet::new()),
            save_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn flush_mode(&self) -> FlushMode {
        self.flush_mode
    }

    /// Path of the data file backing `collection`
    pub fn data_path(&self, collection: &CollectionId) -> PathBuf {
        self.directory.join(collection.file_name())
    }

    async fn after_write(&self, collection: &CollectionId) -> Result<()> {
        if self.flush_mode == FlushMode::Always {
            self.flush(collection).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for FileStorage {
    async fn open(&self, namespace: &str, kind: CollectionKind) -> Result<CollectionId> {
        let collection = CollectionId::new(namespace, kind)?;
        tokio::fs::create_dir_all(&self.directory).await?;
        self.tables.register(&collection);
        debug!("OPEN collection={}, path={:?}", collection, self.data_path(&collection));
        Ok(collection)
    }

    async fn find_one(&self, collection: &CollectionId, key: &str) -> Result<Option<Record>> {
        self.load(collection).await?;
        self.tables.find_one(collection, key).await
    }

    async fn find_all(&self, collection: &CollectionId) -> Result<Vec<Record>> {
        self.load(collection).await?;
        self.tables.find_all(collection).await
    }

    async fn find_prefixed(
        &self,
        collection: &CollectionId,
        prefix: &str,
    ) -> Result<Vec<Record>> {
        self.load(collection).await?;
        self.tables.find_prefixed(collection, prefix).await
    }

    async fn upsert(&self, collection: &CollectionId, key: &str, document: Value) -> Result<()> {
        self.load(collection).await?;
        self.tables.upsert(collection, key, document).await?;
        self.after_write(collection).await
    }

    async fn delete(&self, collection: &CollectionId, key: &str) -> Result<bool> {
        self.load(collection).await?;
        let removed = self.tables.delete(collection, key).await?;
        if removed {
            self.after_write(collection).await?;
        }
        Ok(removed)
    }

    async fn delete_all(&self, collection: &CollectionId) -> Result<usize> {
        // An unreadable file is discarded; the cleared table overwrites it on flush
        match self.load(collection).await {
            Ok(()) => {}
            Err(CacheError::Corrupted(path)) => {
                warn!("Discarding corrupted data file {:?} for {}", path, collection);
                self.loaded.lock().await.insert(collection.clone());
            }
            Err(e) => return Err(e),
        }
        let count = self.tables.delete_all(collection).await?;
        self.after_write(collection).await?;
        Ok(count)
    }

    async fn count(&self, collection: &CollectionId) -> Result<usize> {
        self.load(collection).await?;
        self.tables.count(collection).await
    }

    async fn load(&self, collection: &CollectionId) -> Result<()> {
        let mut loaded = self.loaded.lock().await;
        if loaded.contains(collection) {
            return Ok(());
        }

        let path = self.data_path(collection);
        let records = match read_data_file(&path).await {
            Ok(records) => records,
            Err(CacheError::StorageIo(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("No data file for {} at {:?}", collection, path);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        info!("Loaded {} records for {} from {:?}", records.len(), collection, path);
        self.tables.restore(collection, records);
        loaded.insert(collection.clone());
        Ok(())
    }

    async fn flush(&self, collection: &CollectionId) -> Result<()> {
        let _guard = self.save_lock.lock().await;

        let Some((records, version)) = self.tables.pending(collection) else {
            debug!("FLUSH collection={} skipped (clean)", collection);
            return Ok(());
        };

        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.data_path(collection);
        write_data_file(&path, &records).await?;
        self.tables.mark_saved(collection, version);

        info!("Flushed {} records for {} to {:?}", records.len(), collection, path);
        Ok(())
    }

    async fn flush_all(&self) -> Result<()> {
        for collection in self.tables.collections() {
            self.flush(&collection).await?;
        }
        Ok(())
    }
}

/// Write a collection's records to `path` atomically
pub async fn write_data_file(path: &Path, records: &[Record]) -> Result<()> {
    let tmp_path = path.with_extension("db.tmp");
    let file = File::create(&tmp_path).await?;
    let mut writer = BufWriter::new(file);
    let mut checksum = crc32fast::Hasher::new();

    let saved_at = chrono::Utc::now().timestamp().max(0) as u64;
    let count = records.len() as u64;

    writer.write_all(DATA_MAGIC).await?;
    checksum.update(DATA_MAGIC);

    writer.write_u8(DATA_VERSION).await?;
    checksum.update(&[DATA_VERSION]);

    writer.write_u64(saved_at).await?;
    checksum.update(&saved_at.to_be_bytes());

    writer.write_u64(count).await?;
    checksum.update(&count.to_be_bytes());

    for record in records {
        let key_bytes = record.key.as_bytes();
        let key_len = key_bytes.len() as u32;
        let doc_bytes = serde_json::to_vec(&record.document)?;
        let doc_len = doc_bytes.len() as u32;

        writer.write_u32(key_len).await?;
        checksum.update(&key_len.to_be_bytes());

        writer.write_all(key_bytes).await?;
        checksum.update(key_bytes);

        writer.write_u64(record.seq).await?;
        checksum.update(&record.seq.to_be_bytes());

        writer.write_u32(doc_len).await?;
        checksum.update(&doc_len.to_be_bytes());

        writer.write_all(&doc_bytes).await?;
        checksum.update(&doc_bytes);
    }

    writer.write_u32(checksum.finalize()).await?;
    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Read a data file written by [`write_data_file`]
pub async fn read_data_file(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).await?;
    let mut reader = BufReader::new(file);

    read_records(&mut reader).await.map_err(|e| match e {
        CacheError::StorageIo(io) if io.kind() == ErrorKind::UnexpectedEof => {
            CacheError::Corrupted(path.to_path_buf())
        }
        CacheError::Corrupted(_) => CacheError::Corrupted(path.to_path_buf()),
        other => other,
    })
}

async fn read_records(reader: &mut BufReader<File>) -> Result<Vec<Record>> {
    let unreadable = || CacheError::Corrupted(PathBuf::new());
    let mut checksum = crc32fast::Hasher::new();

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).await?;
    if &magic != DATA_MAGIC {
        return Err(unreadable());
    }
    checksum.update(&magic);

    let version = reader.read_u8().await?;
    if version != DATA_VERSION {
        return Err(unreadable());
    }
    checksum.update(&[version]);

    let saved_at = reader.read_u64().await?;
    checksum.update(&saved_at.to_be_bytes());

    let count = reader.read_u64().await?;
    checksum.update(&count.to_be_bytes());

    let mut records = Vec::new();
    for _ in 0..count {
        let key_len = reader.read_u32().await?;
        checksum.update(&key_len.to_be_bytes());

        let key_bytes = read_block(reader, key_len).await?;
        checksum.update(&key_bytes);

        let seq = reader.read_u64().await?;
        checksum.update(&seq.to_be_bytes());

        let doc_len = reader.read_u32().await?;
        checksum.update(&doc_len.to_be_bytes());

        let doc_bytes = read_block(reader, doc_len).await?;
        checksum.update(&doc_bytes);

        let key = String::from_utf8(key_bytes).map_err(|_| unreadable())?;
        let document = serde_json::from_slice(&doc_bytes).map_err(|_| unreadable())?;
        records.push(Record { key, document, seq });
    }

    let stored = reader.read_u32().await?;
    if stored != checksum.finalize() {
        return Err(unreadable());
    }

    debug!("Read {} records (saved_at={})", records.len(), saved_at);
    Ok(records)
}

/// Read a length-prefixed block, growing the buffer only as bytes arrive
async fn read_block(reader: &mut BufReader<File>, len: u32) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    (&mut *reader)
        .take(u64::from(len))
        .read_to_end(&mut bytes)
        .await?;
    if bytes.len() != len as usize {
        return Err(io::Error::from(ErrorKind::UnexpectedEof).into());
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_records() -> Vec<Record> {
        vec![
            Record {
                key: "index.html".to_string(),
                document: json!({ "path": "index.html", "file": { "title": "Home" } }),
                seq: 0,
            },
            Record {
                key: "posts/a.html".to_string(),
                document: json!({ "path": "posts/a.html", "file": {} }),
                seq: 4,
            },
        ]
    }

    #[tokio::test]
    async fn test_data_file_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-files.db");

        write_data_file(&path, &sample_records()).await.unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("db.tmp").exists());

        let records = read_data_file(&path).await.unwrap();
        assert_eq!(records, sample_records());
    }

    #[tokio::test]
    async fn test_flipped_byte_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-files.db");
        write_data_file(&path, &sample_records()).await.unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_data_file(&path).await,
            Err(CacheError::Corrupted(p)) if p == path
        ));
    }

    #[tokio::test]
    async fn test_truncated_file_is_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-values.db");
        write_data_file(&path, &sample_records()).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();

        assert!(matches!(
            read_data_file(&path).await,
            Err(CacheError::Corrupted(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_length_field_is_corrupted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-files.db");

        let mut bytes = Vec::new();
        bytes.extend_from_slice(DATA_MAGIC);
        bytes.push(DATA_VERSION);
        bytes.extend_from_slice(&0u64.to_be_bytes());
        bytes.extend_from_slice(&1u64.to_be_bytes());
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        bytes.extend_from_slice(b"short");
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_data_file(&path).await,
            Err(CacheError::Corrupted(p)) if p == path
        ));
    }

    #[tokio::test]
    async fn test_delete_all_replaces_corrupted_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FlushMode::Manual);
        let files = storage.open("broken", CollectionKind::Files).await.unwrap();
        std::fs::write(storage.data_path(&files), b"garbage").unwrap();

        assert!(matches!(
            storage.count(&files).await,
            Err(CacheError::Corrupted(_))
        ));

        assert_eq!(storage.delete_all(&files).await.unwrap(), 0);
        storage.upsert(&files, "a.html", json!({})).await.unwrap();
        storage.flush(&files).await.unwrap();

        let records = read_data_file(&storage.data_path(&files)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "a.html");
    }

    #[tokio::test]
    async fn test_delete_all_of_corrupted_file_flushes_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FlushMode::Manual);
        let values = storage.open("broken", CollectionKind::Values).await.unwrap();
        std::fs::write(storage.data_path(&values), b"garbage").unwrap();

        storage.delete_all(&values).await.unwrap();
        storage.flush(&values).await.unwrap();

        assert!(read_data_file(&storage.data_path(&values)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_skips_clean_collections() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FlushMode::Manual);
        let values = storage.open("site", CollectionKind::Values).await.unwrap();

        // Nothing written yet, so nothing to save
        storage.flush(&values).await.unwrap();
        assert!(!storage.data_path(&values).exists());

        storage.upsert(&values, "k", json!("v")).await.unwrap();
        assert!(!storage.data_path(&values).exists());

        storage.flush(&values).await.unwrap();
        let first = std::fs::metadata(storage.data_path(&values))
            .unwrap()
            .modified()
            .unwrap();

        storage.flush(&values).await.unwrap();
        let second = std::fs::metadata(storage.data_path(&values))
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_always_mode_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FlushMode::Always);
        let files = storage.open("site", CollectionKind::Files).await.unwrap();

        storage.upsert(&files, "a.html", json!({})).await.unwrap();

        let records = read_data_file(&storage.data_path(&files)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "a.html");
    }
}
