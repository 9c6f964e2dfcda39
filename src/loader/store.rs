//! Persistence seam for the loader.

use super::error::StoreError;
use super::resolve::Entity;
use super::schema::EntityKind;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Storage the loader reads primary keys from and writes batches into.
#[rocket::async_trait]
pub trait EntityStore: Send + Sync {
    /// Primary keys currently stored for `kind`.
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i64>, StoreError>;

    /// Persist `entities` (all of `kind`) as one unit: either every entity is
    /// stored or none is. Returns the number of inserted rows.
    async fn insert_batch(&self, kind: EntityKind, entities: &[Entity]) -> Result<u64, StoreError>;
}

/// In-process store enforcing primary-key uniqueness and referential integrity.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<EntityKind, BTreeMap<i64, Entity>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `entities` without any integrity checks.
    pub fn seed(&self, entities: impl IntoIterator<Item = Entity>) {
        let mut tables = self.tables.lock();
        for entity in entities {
            tables.entry(entity.kind()).or_default().insert(entity.id(), entity);
        }
    }

    pub fn get(&self, kind: EntityKind, id: i64) -> Option<Entity> {
        self.tables
            .lock()
            .get(&kind)
            .and_then(|table| table.get(&id))
            .cloned()
    }

    /// All stored entities of `kind`, ordered by primary key.
    pub fn all(&self, kind: EntityKind) -> Vec<Entity> {
        self.tables
            .lock()
            .get(&kind)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables.lock().get(&kind).map(BTreeMap::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.lock().values().all(BTreeMap::is_empty)
    }
}

#[rocket::async_trait]
impl EntityStore for MemoryStore {
    async fn existing_ids(&self, kind: EntityKind) -> Result<HashSet<i64>, StoreError> {
        Ok(self
            .tables
            .lock()
            .get(&kind)
            .map(|table| table.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn insert_batch(&self, kind: EntityKind, entities: &[Entity]) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock();
        let mut batch_ids = HashSet::new();

        for entity in entities {
            if entity.kind() != kind {
                return Err(StoreError::IntegrityViolation(format!(
                    "{} entity in a {} batch",
                    entity.kind(),
                    kind
                )));
            }

            let id = entity.id();
            let exists = tables.get(&kind).is_some_and(|table| table.contains_key(&id));
            if exists || !batch_ids.insert(id) {
                return Err(StoreError::IntegrityViolation(format!(
                    "duplicate key value violates unique constraint on {}: id = {}",
                    kind.table(),
                    id
                )));
            }

            for (referenced, target) in entity.references() {
                let present = tables
                    .get(&referenced)
                    .is_some_and(|table| table.contains_key(&target));
                if !present {
                    return Err(StoreError::IntegrityViolation(format!(
                        "{} {} references missing {} {}",
                        kind, id, referenced, target
                    )));
                }
            }
        }

        let table = tables.entry(kind).or_default();
        for entity in entities {
            table.insert(entity.id(), entity.clone());
        }

        Ok(entities.len() as u64)
    }
}
