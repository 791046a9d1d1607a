//! # Persistence Seam
//!
//! Commands never talk to a database directly; they go through an [`EntityStore`] for
//! their entity type. The engine ships an in-memory store used by tests and demos.

pub mod memory;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryEntityStore;

pub type EntityId = i64;

/// A persistable business entity with an optional storage-assigned id
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type tag carried by entity inputs so payloads can be checked before decoding
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> Option<EntityId>;

    fn set_id(&mut self, id: Option<EntityId>);
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceError {
    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Constraint violated on {entity_type}: {message}")]
    Constraint { entity_type: String, message: String },
}

impl PersistenceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Storage operations the entity commands rely on
pub trait EntityStore<E: Entity>: Send + Sync {
    fn find_by_id(&self, id: EntityId) -> Result<Option<E>, PersistenceError>;

    /// Insert when the entity has no id, replace otherwise. Returns the stored copy.
    fn save(&self, entity: E) -> Result<Option<E>, PersistenceError>;

    /// Returns whether a row was removed
    fn delete_by_id(&self, id: EntityId) -> Result<bool, PersistenceError>;
}
