//! In-memory gateway used by tests of the remote code paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use super::{Filter, GatewayError, GatewayResult, Query, RemoteGateway};

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Value>>,
    objects: BTreeMap<(String, String), (Vec<u8>, String)>,
    failing_tables: HashSet<String>,
    fail_uploads: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryGateway {
    inner: Arc<Mutex<Inner>>,
    writes: Arc<AtomicUsize>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call against `table` fail.
    pub fn fail_table(&self, table: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_tables
            .insert(table.to_string());
    }

    pub fn heal_table(&self, table: &str) {
        self.inner.lock().unwrap().failing_tables.remove(table);
    }

    pub fn fail_uploads(&self) {
        self.inner.lock().unwrap().fail_uploads = true;
    }

    /// Number of insert, update, delete, upload and remove calls received.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.inner
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.inner
            .lock()
            .unwrap()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn has_object(&self, bucket: &str, path: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .objects
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    pub fn object_paths(&self, bucket: &str) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|(object_bucket, _)| object_bucket == bucket)
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn check_table(inner: &Inner, table: &str) -> GatewayResult<()> {
        if inner.failing_tables.contains(table) {
            return Err(GatewayError::Api {
                status: 500,
                message: format!("relation \"{table}\" is unavailable"),
            });
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        row.get(&filter.column)
            .is_some_and(|value| cell_text(value) == filter.value)
    })
}

/// Embedded tables named in a column list, e.g. `recipes` in `*, recipes(*)`.
fn embedded_tables(columns: &str) -> Vec<String> {
    columns
        .split(',')
        .filter_map(|column| column.trim().strip_suffix("(*)"))
        .map(ToString::to_string)
        .collect()
}

impl RemoteGateway for InMemoryGateway {
    async fn select(
        &self,
        _access_token: &str,
        table: &str,
        query: &Query,
    ) -> GatewayResult<Vec<Value>> {
        let inner = self.inner.lock().unwrap();
        Self::check_table(&inner, table)?;

        let embeds = embedded_tables(&query.columns);
        let mut rows: Vec<Value> = inner
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches(row, &query.filters))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        for row in &mut rows {
            for embed in &embeds {
                let foreign_key = format!("{}_id", embed.trim_end_matches('s'));
                let Some(key) = row.get(&foreign_key).map(cell_text) else {
                    continue;
                };
                let joined = inner
                    .tables
                    .get(embed)
                    .and_then(|rows| {
                        rows.iter()
                            .find(|candidate| candidate.get("id").map(cell_text).as_deref() == Some(key.as_str()))
                    })
                    .cloned()
                    .unwrap_or(Value::Null);
                if let Value::Object(map) = row {
                    map.insert(embed.clone(), joined);
                }
            }
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(
        &self,
        _access_token: &str,
        table: &str,
        rows: &[Value],
    ) -> GatewayResult<Vec<Value>> {
        self.record_write();
        let mut inner = self.inner.lock().unwrap();
        Self::check_table(&inner, table)?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = row.clone();
            if let Value::Object(map) = &mut row {
                map.entry("id")
                    .or_insert_with(|| Value::String(Uuid::now_v7().to_string()));
            }
            stored.push(row);
        }

        // Primary keys are unique, as in PostgREST.
        let existing = inner.tables.get(table).map_or_else(Vec::new, |rows| {
            rows.iter().filter_map(|row| row.get("id").map(cell_text)).collect()
        });
        if stored
            .iter()
            .filter_map(|row| row.get("id").map(cell_text))
            .any(|id| existing.contains(&id))
        {
            return Err(GatewayError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint".to_string(),
            });
        }

        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        Ok(stored)
    }

    async fn update(
        &self,
        _access_token: &str,
        table: &str,
        patch: &Value,
        filters: &[Filter],
    ) -> GatewayResult<Vec<Value>> {
        self.record_write();
        let mut inner = self.inner.lock().unwrap();
        Self::check_table(&inner, table)?;

        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(table) {
            for row in rows.iter_mut().filter(|row| matches(row, filters)) {
                if let (Value::Object(target), Value::Object(changes)) = (&mut *row, patch) {
                    for (key, value) in changes {
                        target.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(
        &self,
        _access_token: &str,
        table: &str,
        filters: &[Filter],
    ) -> GatewayResult<()> {
        self.record_write();
        let mut inner = self.inner.lock().unwrap();
        Self::check_table(&inner, table)?;
        if let Some(rows) = inner.tables.get_mut(table) {
            rows.retain(|row| !matches(row, filters));
        }
        Ok(())
    }

    async fn upload_object(
        &self,
        _access_token: &str,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> GatewayResult<()> {
        self.record_write();
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_uploads {
            return Err(GatewayError::Api {
                status: 413,
                message: "Payload too large".to_string(),
            });
        }
        let key = (bucket.to_string(), path.to_string());
        if !upsert && inner.objects.contains_key(&key) {
            return Err(GatewayError::Api {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        inner.objects.insert(key, (bytes, content_type.to_string()));
        Ok(())
    }

    async fn remove_objects(
        &self,
        _access_token: &str,
        bucket: &str,
        paths: &[String],
    ) -> GatewayResult<()> {
        self.record_write();
        let mut inner = self.inner.lock().unwrap();
        for path in paths {
            inner.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.test/{bucket}/{path}")
    }
}
