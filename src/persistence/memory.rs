use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;

use super::{Entity, EntityId, EntityStore, PersistenceError};

/// Thread-safe in-memory store with a monotonically increasing id sequence
#[derive(Debug)]
pub struct InMemoryEntityStore<E: Entity> {
    rows: RwLock<BTreeMap<EntityId, E>>,
    sequence: AtomicI64,
}

impl<E: Entity> Default for InMemoryEntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> InMemoryEntityStore<E> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            sequence: AtomicI64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.read().contains_key(&id)
    }

    /// Rows ordered by id
    pub fn snapshot(&self) -> Vec<E> {
        self.rows.read().values().cloned().collect()
    }

    fn next_id(&self) -> EntityId {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl<E: Entity> EntityStore<E> for InMemoryEntityStore<E> {
    fn find_by_id(&self, id: EntityId) -> Result<Option<E>, PersistenceError> {
        Ok(self.rows.read().get(&id).cloned())
    }

    fn save(&self, mut entity: E) -> Result<Option<E>, PersistenceError> {
        let id = match entity.id() {
            Some(id) => {
                // Restored rows keep their id; keep the sequence ahead of them.
                self.sequence.fetch_max(id, Ordering::SeqCst);
                id
            }
            None => {
                let id = self.next_id();
                entity.set_id(Some(id));
                id
            }
        };
        self.rows.write().insert(id, entity.clone());
        Ok(Some(entity))
    }

    fn delete_by_id(&self, id: EntityId) -> Result<bool, PersistenceError> {
        Ok(self.rows.write().remove(&id).is_some())
    }
}
