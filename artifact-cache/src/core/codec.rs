//! Value codec for file payloads
//!
//! Storage backends hold plain JSON documents, so the two payload types JSON
//! cannot express are mapped onto JSON on the way in and reconstructed on the
//! way out:
//!
//! - bytes are stored as `{"$binary": "<base64>"}`
//! - timestamps are stored as ISO-8601 strings (`YYYY-MM-DDTHH:MM:SS(.f+)?Z`)
//!
//! Decoding sniffs every string for the timestamp shape and converts it only
//! when a strict RFC 3339 parse succeeds. Plain strings that happen to look
//! like timestamps therefore come back as timestamps.

use super::error::{CacheError, Result};
use super::types::{FieldValue, FileRecord};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved object key marking an encoded byte buffer
pub const BINARY_TAG: &str = "$binary";

/// Years that serialize to the four-digit stored shape
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

lazy_static! {
    static ref ISO_8601: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?Z$").expect("valid regex");
}

/// Encode a file payload into a JSON document
pub fn encode(record: &FileRecord) -> Result<Value> {
    encode_object(record.fields())
}

/// Decode a JSON document back into a file payload
pub fn decode(document: Value) -> Result<FileRecord> {
    match document {
        Value::Object(map) => Ok(FileRecord::from(decode_object(map)?)),
        other => Err(CacheError::Encoding(format!(
            "file payload must be an object, found {}",
            json_kind(&other)
        ))),
    }
}

fn encode_value(value: &FieldValue) -> Result<Value> {
    Ok(match value {
        FieldValue::Null => Value::Null,
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Number(n) => Value::Number(n.clone()),
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Bytes(bytes) => {
            let mut tagged = Map::with_capacity(1);
            tagged.insert(
                BINARY_TAG.to_string(),
                Value::String(general_purpose::STANDARD.encode(bytes)),
            );
            Value::Object(tagged)
        }
        FieldValue::Timestamp(ts) => {
            if !STORABLE_YEARS.contains(&ts.year()) {
                return Err(CacheError::Encoding(format!(
                    "timestamp {ts} is outside the storable years 0000-9999"
                )));
            }
            Value::String(format_timestamp(ts))
        }
        FieldValue::Array(items) => {
            Value::Array(items.iter().map(encode_value).collect::<Result<_>>()?)
        }
        FieldValue::Object(fields) => encode_object(fields)?,
    })
}

fn encode_object(fields: &BTreeMap<String, FieldValue>) -> Result<Value> {
    let mut map = Map::with_capacity(fields.len());
    for (name, value) in fields {
        if name == BINARY_TAG {
            return Err(CacheError::Encoding(format!(
                "field name {BINARY_TAG:?} is reserved"
            )));
        }
        map.insert(name.clone(), encode_value(value)?);
    }
    Ok(Value::Object(map))
}

fn decode_value(value: Value) -> Result<FieldValue> {
    Ok(match value {
        Value::Null => FieldValue::Null,
        Value::Bool(b) => FieldValue::Bool(b),
        Value::Number(n) => FieldValue::Number(n),
        Value::String(s) => match parse_timestamp(&s) {
            Some(ts) => FieldValue::Timestamp(ts),
            None => FieldValue::String(s),
        },
        Value::Array(items) => {
            FieldValue::Array(items.into_iter().map(decode_value).collect::<Result<_>>()?)
        }
        Value::Object(map) => {
            if let Some(encoded) = binary_payload(&map) {
                let bytes = general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| CacheError::Encoding(format!("invalid base64 buffer: {e}")))?;
                FieldValue::Bytes(bytes)
            } else {
                FieldValue::Object(decode_object(map)?)
            }
        }
    })
}

fn decode_object(map: Map<String, Value>) -> Result<BTreeMap<String, FieldValue>> {
    map.into_iter()
        .map(|(name, value)| Ok((name, decode_value(value)?)))
        .collect()
}

fn binary_payload(map: &Map<String, Value>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get(BINARY_TAG).and_then(Value::as_str)
}

/// Serialize a timestamp the way the codec stores it
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a string as a timestamp if it has the stored ISO-8601 shape
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if !ISO_8601.is_match(s) {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
