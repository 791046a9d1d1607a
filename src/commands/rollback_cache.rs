use std::marker::PhantomData;

use serde_json::Value;
use tracing::{debug, warn};

use super::errors::CommandError;
use crate::context::{ExecutionContext, Input};
use crate::persistence::{Entity, EntityId, PersistenceError};

/// Compensation helper for commands that change one entity.
///
/// The forward step caches the entity's pre-change copy (or the new id for
/// creations) as the context's undo input; rollback restores from it.
#[derive(Debug)]
pub struct EntityRollbackCache<E: Entity> {
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Default for EntityRollbackCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Clone for EntityRollbackCache<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityRollbackCache<E> {
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }

    pub fn entity_type(&self) -> &'static str {
        E::ENTITY_TYPE
    }

    /// Load the entity `id` and return the copy to keep for compensation
    pub fn retrieve<F, C>(&self, id: EntityId, find_by_id: F, to_cacheable: C) -> Result<E, CommandError>
    where
        F: FnOnce(EntityId) -> Result<Option<E>, PersistenceError>,
        C: FnOnce(&E) -> E,
    {
        let entity = find_by_id(id)
            .map_err(|e| CommandError::persistence(format!("find {}", E::ENTITY_TYPE), e))?
            .ok_or_else(|| CommandError::not_found(E::ENTITY_TYPE, id))?;
        Ok(to_cacheable(&entity))
    }

    /// Save the entity carried by the context's redo input
    pub fn persist_forward<S>(&self, context: &ExecutionContext, save: S) -> Result<Option<E>, CommandError>
    where
        S: FnOnce(E) -> Result<Option<E>, PersistenceError>,
    {
        let entity = context.redo_input().as_entity::<E>()?;
        save(entity).map_err(|e| CommandError::persistence(format!("save {}", E::ENTITY_TYPE), e))
    }

    /// Restore the state cached in the context's undo input.
    ///
    /// A cached entity is saved back. A cached id means the forward step created the
    /// entity, so it is deleted and the redo input loses its id for a clean re-run.
    pub fn rollback<S, D>(
        &self,
        context: &mut ExecutionContext,
        save: S,
        delete_by_id: Option<D>,
    ) -> Result<Option<E>, CommandError>
    where
        S: FnOnce(E) -> Result<Option<E>, PersistenceError>,
        D: FnOnce(EntityId) -> Result<bool, PersistenceError>,
    {
        if let Input::Entity(_) = context.undo_input() {
            let previous = context.undo_input().as_entity::<E>()?;
            debug!(entity_type = E::ENTITY_TYPE, id = ?previous.id(), "Restoring cached entity");
            return save(previous)
                .map_err(|e| CommandError::persistence(format!("restore {}", E::ENTITY_TYPE), e));
        }

        let (id, delete) = match (context.undo_input().as_id(), delete_by_id) {
            (Ok(id), Some(delete)) => (id, delete),
            _ => {
                return Err(CommandError::type_mismatch(
                    format!("cached entity<{}>", E::ENTITY_TYPE),
                    context.undo_input().describe(),
                ))
            }
        };

        let removed = delete(id)
            .map_err(|e| CommandError::persistence(format!("delete {}", E::ENTITY_TYPE), e))?;
        if !removed {
            warn!(entity_type = E::ENTITY_TYPE, id, "Created entity already gone during rollback");
        }
        if let Ok(mut forward) = context.redo_input().as_entity::<E>() {
            forward.set_id(None);
            context.set_redo_input(Input::of_entity(&forward)?);
        }
        Ok(None)
    }

    /// Finish a forward save.
    ///
    /// A context that already failed gets `on_failure` run against it. Otherwise
    /// the persisted entity becomes the result; creations also cache the new id
    /// as undo input.
    pub fn after_forward_persistence_check<R>(
        &self,
        context: &mut ExecutionContext,
        persisted: Option<E>,
        was_create: bool,
        on_failure: R,
    ) -> Result<(), CommandError>
    where
        R: FnOnce(&mut ExecutionContext),
    {
        if context.is_failed() {
            on_failure(context);
            return Ok(());
        }

        let persisted = persisted.ok_or_else(|| {
            CommandError::execution(format!("{} was not persisted", E::ENTITY_TYPE))
        })?;

        if was_create {
            let id = persisted.id().ok_or_else(|| {
                CommandError::execution(format!("persisted {} has no id", E::ENTITY_TYPE))
            })?;
            context.set_undo_input(Input::Id(id));
        }

        let result: Value = serde_json::to_value(&persisted)?;
        context.complete(result)?;
        Ok(())
    }
}
