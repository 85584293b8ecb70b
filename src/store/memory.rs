//! `InMemoryBackend` - Map-Based Ephemeral Storage
//!
//! The baseline implementation of the contract: a plain map with
//! synchronous, deterministic semantics and no persistence across
//! restarts. Used as the default/test backend and as the fallback when
//! no durable backend is configured.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::backend::{field_contains, validate_term, FieldMap, StorageBackend};
use super::error::{StoreError, StoreResult};
use super::record::StoredRecord;
use crate::uuid2::Uuid2;

/// In-memory storage backend.
///
/// Thread-safe via `RwLock`; cheap to clone (clones share the collection).
#[derive(Debug, Clone)]
pub struct InMemoryBackend<R: StoredRecord> {
    records: Arc<RwLock<HashMap<Uuid2, R>>>,
    fields: Arc<FieldMap<R>>,
}

impl<R: StoredRecord> InMemoryBackend<R> {
    /// Create an empty backend with the given searchable fields.
    #[must_use]
    pub fn new(fields: FieldMap<R>) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            fields: Arc::new(fields),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// A copy of the whole collection keyed by id.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<Uuid2, R> {
        self.records.read().unwrap().clone()
    }
}

impl<R: StoredRecord> Default for InMemoryBackend<R> {
    fn default() -> Self {
        Self::new(FieldMap::new())
    }
}

#[async_trait]
impl<R: StoredRecord> StorageBackend<R> for InMemoryBackend<R> {
    async fn find_all(&self) -> StoreResult<Vec<R>> {
        let records = self.records.read().unwrap();

        let mut all: Vec<R> = records.values().cloned().collect();
        // Sort by uuid for determinism.
        all.sort_by_key(|r| r.id().uuid());

        Ok(all)
    }

    async fn find_by_id(&self, id: &Uuid2) -> StoreResult<R> {
        let records = self.records.read().unwrap();
        records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(id))
    }

    async fn find_by_field(&self, field: &str, term: &str) -> StoreResult<Vec<R>> {
        validate_term(term)?;
        let accessor = self
            .fields
            .accessor(field)
            .ok_or_else(|| StoreError::malformed(format!("unknown field: {field}")))?;

        let records = self.records.read().unwrap();
        let mut hits: Vec<R> = records
            .values()
            .filter(|r| field_contains(&accessor(r), term))
            .cloned()
            .collect();
        hits.sort_by_key(|r| r.id().uuid());

        Ok(hits)
    }

    async fn add(&self, record: R) -> StoreResult<R> {
        let id = record.id();
        let mut records = self.records.write().unwrap();

        if records.contains_key(&id) {
            return Err(StoreError::already_exists(&id));
        }
        records.insert(id, record.clone());

        Ok(record)
    }

    async fn update(&self, record: R) -> StoreResult<R> {
        let id = record.id();
        let mut records = self.records.write().unwrap();

        if !records.contains_key(&id) {
            return Err(StoreError::not_found(&id));
        }
        records.insert(id, record.clone());

        Ok(record)
    }

    async fn upsert(&self, record: R) -> StoreResult<R> {
        let mut records = self.records.write().unwrap();
        records.insert(record.id(), record.clone());

        Ok(record)
    }

    async fn delete(&self, record: &R) -> StoreResult<bool> {
        self.delete_by_id(&record.id()).await
    }

    async fn delete_by_id(&self, id: &Uuid2) -> StoreResult<bool> {
        let mut records = self.records.write().unwrap();
        Ok(records.remove(id).is_some())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let mut records = self.records.write().unwrap();
        records.clear();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
