//! Record encoding rules.
//!
//! A record is any JSON object carrying a string `id`. Nothing else about
//! its shape is checked.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StorageError, StorageResult};

/// Width of the `id CHAR(50)` column.
pub const MAX_ID_LEN: usize = 50;

/// A record serialized for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    /// Primary key taken from the record's `id` field.
    pub id: String,
    /// Full record as JSON text.
    pub json: String,
}

/// Serializes `record` and extracts its `id`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidRecord`] when the record is not a JSON
/// object, has no string `id`, or the `id` is empty or wider than
/// [`MAX_ID_LEN`] characters.
pub fn encode<T: Serialize + ?Sized>(record: &T) -> StorageResult<EncodedRecord> {
    let value = serde_json::to_value(record)
        .map_err(|e| StorageError::InvalidRecord(format!("record is not serializable: {e}")))?;

    let serde_json::Value::Object(map) = &value else {
        return Err(StorageError::InvalidRecord(
            "record must be a JSON object".to_string(),
        ));
    };

    let id = match map.get("id") {
        Some(serde_json::Value::String(id)) => id.clone(),
        Some(_) => {
            return Err(StorageError::InvalidRecord(
                "record id must be a string".to_string(),
            ));
        }
        None => {
            return Err(StorageError::InvalidRecord(
                "record has no id".to_string(),
            ));
        }
    };

    if id.is_empty() {
        return Err(StorageError::InvalidRecord("record id is empty".to_string()));
    }
    if id.chars().count() > MAX_ID_LEN {
        return Err(StorageError::InvalidRecord(format!(
            "record id exceeds {MAX_ID_LEN} characters"
        )));
    }

    let json = serde_json::to_string(&value)
        .map_err(|e| StorageError::InvalidRecord(format!("record is not serializable: {e}")))?;

    Ok(EncodedRecord { id, json })
}

/// Decodes stored JSON text into `T`.
///
/// # Errors
///
/// Returns [`StorageError::Decode`] when the text is not valid JSON for `T`.
pub fn decode<T: DeserializeOwned>(json: &str) -> StorageResult<T> {
    Ok(serde_json::from_str(json)?)
}
