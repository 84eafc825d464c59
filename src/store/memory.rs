use super::DocumentStore;
use crate::error::{PublisherError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-process document store.
///
/// Filters are top-level equality matches; updates support `$set` with dotted
/// paths. While `offline` is set every call fails the way an unreachable
/// server would.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        let store = Self::default();
        store.set_offline(true);
        store
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls attempted, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of a collection, bypassing the offline switch.
    pub fn documents(&self, collection: &str) -> Vec<Value> {
        self.lock().get(collection).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Value>>> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_online(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(PublisherError::store("remote store unreachable"));
        }
        Ok(())
    }
}

fn matches(document: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(conditions) => conditions
            .iter()
            .all(|(key, expected)| document.get(key) == Some(expected)),
        None => true,
    }
}

fn project(document: &Value, projection: Option<&Value>) -> Value {
    let Some(fields) = projection.and_then(Value::as_object) else {
        return document.clone();
    };
    let mut projected = Map::new();
    for (key, include) in fields {
        if include.as_i64() == Some(1) || include.as_bool() == Some(true) {
            if let Some(value) = document.get(key) {
                projected.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(projected)
}

fn set_path(document: &mut Value, path: &str, value: Value) {
    let mut current = document;
    let mut parts = path.split('.').peekable();
    while let Some(part) = parts.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if parts.peek().is_none() {
            map.insert(part.to_string(), value);
            return;
        }
        current = map
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn apply_update(document: &mut Value, update: &Value) {
    if let Some(fields) = update.get("$set").and_then(Value::as_object) {
        for (path, value) in fields {
            set_path(document, path, value.clone());
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, filter: Value) -> Result<Option<Value>> {
        self.check_online()?;
        Ok(self
            .lock()
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| matches(doc, &filter)).cloned()))
    }

    async fn find(
        &self,
        collection: &str,
        filter: Value,
        projection: Option<Value>,
    ) -> Result<Vec<Value>> {
        self.check_online()?;
        Ok(self
            .lock()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| matches(doc, &filter))
                    .map(|doc| project(doc, projection.as_ref()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        self.check_online()?;
        self.lock()
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Value,
        update: Value,
        upsert: bool,
    ) -> Result<()> {
        self.check_online()?;
        let mut collections = self.lock();
        let docs = collections.entry(collection.to_string()).or_default();
        if let Some(doc) = docs.iter_mut().find(|doc| matches(doc, &filter)) {
            apply_update(doc, &update);
        } else if upsert {
            let mut doc = if filter.is_object() {
                filter.clone()
            } else {
                Value::Object(Map::new())
            };
            apply_update(&mut doc, &update);
            docs.push(doc);
        }
        Ok(())
    }

    async fn delete_many(&self, collection: &str, filter: Value) -> Result<u64> {
        self.check_online()?;
        let mut collections = self.lock();
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|doc| !matches(doc, &filter));
        Ok((before - docs.len()) as u64)
    }
}
