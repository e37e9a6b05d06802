// ValueCache Tests
// Upsert, lookup, miss contract and invalidation

use artifact_cache::{CacheError, MemoryStorage, ValueCache};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BuildInfo {
    hash: String,
    pages: u32,
    tags: Vec<String>,
}

async fn open_cache(namespace: &str) -> ValueCache {
    ValueCache::open(Arc::new(MemoryStorage::new()), namespace)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_store_and_retrieve_string() {
    let cache = open_cache("values").await;
    cache.store("testKey", "testValue").await.unwrap();

    let value: String = cache.retrieve("testKey").await.unwrap();
    assert_eq!(value, "testValue");
}

#[tokio::test]
async fn test_store_and_retrieve_struct() {
    let cache = open_cache("values").await;
    let info = BuildInfo {
        hash: "9f2c".to_string(),
        pages: 42,
        tags: vec!["rust".to_string(), "web".to_string()],
    };

    cache.store("build", &info).await.unwrap();
    assert_eq!(cache.retrieve::<BuildInfo>("build").await.unwrap(), info);

    // The same value is readable as plain JSON
    let raw: serde_json::Value = cache.retrieve("build").await.unwrap();
    assert_eq!(raw["pages"], json!(42));
}

#[tokio::test]
async fn test_store_and_retrieve_bytes() {
    let cache = open_cache("values").await;
    let bytes: Vec<u8> = vec![0, 1, 2, 254, 255];

    cache.store("blob", &bytes).await.unwrap();
    assert_eq!(cache.retrieve::<Vec<u8>>("blob").await.unwrap(), bytes);
}

#[tokio::test]
async fn test_store_replaces_value() {
    let cache = open_cache("values").await;

    cache.store("k", &json!({ "a": 1 })).await.unwrap();
    cache.store("k", &json!({ "b": 2 })).await.unwrap();

    let value: serde_json::Value = cache.retrieve("k").await.unwrap();
    assert_eq!(value, json!({ "b": 2 }));
    assert_eq!(cache.len().await.unwrap(), 1);
}

#[tokio::test]
async fn test_retrieve_missing_key_is_not_found() {
    let cache = open_cache("values").await;

    let err = cache.retrieve::<String>("absent").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(err, CacheError::NotFound(ref key) if key == "absent"));
    assert_eq!(err.to_string(), "No record for key: absent");

    assert!(!cache.contains("absent").await.unwrap());
}

#[tokio::test]
async fn test_retrieve_with_wrong_type() {
    let cache = open_cache("values").await;
    cache.store("count", &7u32).await.unwrap();

    let result = cache.retrieve::<HashMap<String, String>>("count").await;
    assert!(matches!(result, Err(CacheError::Serialization(_))));
}

#[tokio::test]
async fn test_invalidate() {
    let cache = open_cache("values").await;
    cache.store("a", &1).await.unwrap();
    cache.store("b", &2).await.unwrap();

    cache.invalidate().await.unwrap();

    assert_eq!(cache.len().await.unwrap(), 0);
    assert!(cache.retrieve::<i32>("a").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let storage = Arc::new(MemoryStorage::new());
    let ns1 = ValueCache::open(storage.clone(), "ns1").await.unwrap();
    let ns2 = ValueCache::open(storage.clone(), "ns2").await.unwrap();

    ns1.store("key", "one").await.unwrap();

    assert!(ns1.contains("key").await.unwrap());
    assert!(!ns2.contains("key").await.unwrap());
    assert!(ns2.retrieve::<String>("key").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_file_and_value_caches_do_not_collide() {
    let storage = Arc::new(MemoryStorage::new());
    let values = ValueCache::open(storage.clone(), "site").await.unwrap();
    let files = artifact_cache::FileCache::open(storage, "site").await.unwrap();

    values.store("index.html", "a value").await.unwrap();
    assert!(files.retrieve("index.html").await.unwrap().is_none());
}
