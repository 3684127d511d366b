use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use vestigia_core::{AppError, AppResult};

/// In-memory store of semi-structured records grouped by collection.
///
/// Backs the reference hosting layer: records are JSON mappings keyed by a
/// string `_id` the store assigns on insert when the payload carries none.
#[derive(Debug, Default)]
pub struct InMemoryCollectionStore {
    records: RwLock<HashMap<(String, String), Value>>,
}

impl InMemoryCollectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Lists every record of a collection, ordered by record id.
    pub async fn list(&self, collection: &str) -> Vec<Value> {
        let records = self.records.read().await;

        let mut listed: Vec<(String, Value)> = records
            .iter()
            .filter_map(|((stored_collection, record_id), record)| {
                (stored_collection == collection).then(|| (record_id.clone(), record.clone()))
            })
            .collect();
        listed.sort_by(|left, right| left.0.cmp(&right.0));

        listed.into_iter().map(|(_, record)| record).collect()
    }

    /// Inserts one record, assigning a `_id` when the payload has none.
    ///
    /// Returns the stored record including its identifier.
    pub async fn insert(&self, collection: &str, record: Value) -> AppResult<Value> {
        let Value::Object(mut fields) = record else {
            return Err(AppError::Validation(
                "collection records must be JSON objects".to_owned(),
            ));
        };

        let record_id = match fields.get("_id").and_then(Value::as_str) {
            Some(existing) => existing.to_owned(),
            None => {
                let generated = Uuid::new_v4().to_string();
                fields.insert("_id".to_owned(), Value::String(generated.clone()));
                generated
            }
        };

        let stored = Value::Object(fields);
        let key = (collection.to_owned(), record_id);
        let mut records = self.records.write().await;

        if records.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "record '{}' already exists in collection '{}'",
                key.1, key.0
            )));
        }

        records.insert(key, stored.clone());
        Ok(stored)
    }

    /// Returns one record by id, when present.
    pub async fn find(&self, collection: &str, record_id: &str) -> Option<Value> {
        self.records
            .read()
            .await
            .get(&(collection.to_owned(), record_id.to_owned()))
            .cloned()
    }

    /// Replaces a record and returns the prior state, when one existed.
    ///
    /// The stored record keeps the addressed `_id` regardless of what the
    /// payload claims.
    pub async fn replace(
        &self,
        collection: &str,
        record_id: &str,
        record: Value,
    ) -> AppResult<Option<Value>> {
        let Value::Object(mut fields) = record else {
            return Err(AppError::Validation(
                "collection records must be JSON objects".to_owned(),
            ));
        };
        fields.insert("_id".to_owned(), Value::String(record_id.to_owned()));

        let key = (collection.to_owned(), record_id.to_owned());
        let mut records = self.records.write().await;

        if !records.contains_key(&key) {
            return Ok(None);
        }

        Ok(records.insert(key, Value::Object(fields)))
    }

    /// Removes a record and returns it, when one existed.
    pub async fn remove(&self, collection: &str, record_id: &str) -> Option<Value> {
        self.records
            .write()
            .await
            .remove(&(collection.to_owned(), record_id.to_owned()))
    }
}
