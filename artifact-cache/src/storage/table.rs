use radix_trie::{Trie, TrieCommon};
use serde_json::Value;

/// One stored document and its unique key
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub document: Value,
    /// Insertion sequence number, kept when the document is replaced
    pub seq: u64,
}

/// In-memory collection keyed by a radix trie
///
/// Tracks a write version so persistent backends can tell whether the table
/// changed since it was last saved.
pub struct Table {
    data: Trie<String, Record>,
    next_seq: u64,
    version: u64,
    saved_version: u64,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Self {
            data: Trie::new(),
            next_seq: 0,
            version: 0,
            saved_version: 0,
        }
    }

    /// Rebuild a table from persisted records; the result is clean
    pub fn restore(records: Vec<Record>) -> Self {
        let mut table = Self::new();
        for record in records {
            table.next_seq = table.next_seq.max(record.seq + 1);
            table.data.insert(record.key.clone(), record);
        }
        table
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.data.get(key)
    }

    /// Insert or replace; returns true if the key was new
    pub fn upsert(&mut self, key: &str, document: Value) -> bool {
        self.version += 1;

        if let Some(existing) = self.data.get_mut(key) {
            existing.document = document;
            return false;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.data.insert(
            key.to_string(),
            Record {
                key: key.to_string(),
                document,
                seq,
            },
        );
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let removed = self.data.remove(key).is_some();
        if removed {
            self.version += 1;
        }
        removed
    }

    /// Drop every record, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.data.len();
        self.data = Trie::new();
        self.version += 1;
        count
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All records in insertion order
    pub fn records(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self.data.values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Records whose key starts with `prefix`, in insertion order
    pub fn prefixed(&self, prefix: &str) -> Vec<Record> {
        if prefix.is_empty() {
            return self.records();
        }

        let mut records: Vec<Record> = self
            .data
            .get_raw_descendant(prefix)
            .map(|subtrie| {
                subtrie
                    .values()
                    .filter(|r| r.key.starts_with(prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(|r| r.seq);
        records
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.version != self.saved_version
    }

    /// Record that the table was saved as of `version`
    pub fn mark_saved(&mut self, version: u64) {
        if version > self.saved_version {
            self.saved_version = version;
        }
    }
}
