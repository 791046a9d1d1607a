//! Generic create-or-update and delete commands over an [`EntityStore`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error};

use super::command::{Command, CommandFamily};
use super::errors::CommandError;
use super::rollback_cache::EntityRollbackCache;
use crate::context::{ExecutionContext, Input};
use crate::execution::error_classifier::{ErrorClassifier, StandardErrorClassifier};
use crate::persistence::{Entity, EntityId, EntityStore, PersistenceError};

/// Business check applied to an entity before the command touches storage
pub type EntityRule<E> = Arc<dyn Fn(&E) -> Result<(), CommandError> + Send + Sync>;

type NoDelete = fn(EntityId) -> Result<bool, PersistenceError>;

/// Saves the entity from the redo input: inserts when it has no id, updates otherwise.
///
/// Undo deletes a created entity or restores the copy cached before an update.
pub struct CreateOrUpdateCommand<E: Entity> {
    id: String,
    store: Arc<dyn EntityStore<E>>,
    cache: EntityRollbackCache<E>,
    validator: Option<EntityRule<E>>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl<E: Entity> CreateOrUpdateCommand<E> {
    pub fn new(id: impl Into<String>, store: Arc<dyn EntityStore<E>>) -> Self {
        Self {
            id: id.into(),
            store,
            cache: EntityRollbackCache::new(),
            validator: None,
            classifier: Arc::new(StandardErrorClassifier),
        }
    }

    pub fn with_validator(mut self, validator: EntityRule<E>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_error_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    fn restore_after_failure(&self, context: &mut ExecutionContext) {
        if !matches!(context.undo_input(), Input::Entity(_)) {
            return;
        }
        let store = self.store.clone();
        if let Err(cause) = self
            .cache
            .rollback(context, |e| store.save(e), None::<NoDelete>)
        {
            error!(command_id = %self.id, error = %cause, "Unable to restore cached entity after failed save");
        }
    }
}

#[async_trait]
impl<E: Entity> Command for CreateOrUpdateCommand<E> {
    fn id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> CommandFamily {
        CommandFamily::Entity
    }

    fn validate_input(&self, input: &Input) -> Result<(), CommandError> {
        let entity = input.as_entity::<E>()?;
        match &self.validator {
            Some(validator) => validator(&entity),
            None => Ok(()),
        }
    }

    async fn execute_do(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        let forward = context.redo_input().as_entity::<E>()?;
        let was_create = forward.id().is_none();

        if let Some(id) = forward.id() {
            let cached = self
                .cache
                .retrieve(id, |id| self.store.find_by_id(id), E::clone)?;
            context.set_undo_input(Input::of_entity(&cached)?);
        }

        let persisted = match self.cache.persist_forward(context, |e| self.store.save(e)) {
            Ok(persisted) => persisted,
            Err(cause) => {
                context.fail(cause)?;
                None
            }
        };

        self.cache
            .after_forward_persistence_check(context, persisted, was_create, |ctx| {
                self.restore_after_failure(ctx)
            })?;

        debug!(command_id = %self.id, was_create, state = %context.state(), "Entity saved");
        Ok(())
    }

    async fn execute_undo(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        self.cache.rollback(
            context,
            |e| self.store.save(e),
            Some(|id| self.store.delete_by_id(id)),
        )?;
        Ok(())
    }

    fn error_classifier(&self) -> Arc<dyn ErrorClassifier> {
        self.classifier.clone()
    }
}

/// Deletes the entity whose id is the redo input.
///
/// The deleted row is cached as undo input and saved back on undo.
pub struct DeleteCommand<E: Entity> {
    id: String,
    store: Arc<dyn EntityStore<E>>,
    cache: EntityRollbackCache<E>,
    guard: Option<EntityRule<E>>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl<E: Entity> DeleteCommand<E> {
    pub fn new(id: impl Into<String>, store: Arc<dyn EntityStore<E>>) -> Self {
        Self {
            id: id.into(),
            store,
            cache: EntityRollbackCache::new(),
            guard: None,
            classifier: Arc::new(StandardErrorClassifier),
        }
    }

    /// Rule checked against the stored entity before anything is deleted
    pub fn with_guard(mut self, guard: EntityRule<E>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_error_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }
}

#[async_trait]
impl<E: Entity> Command for DeleteCommand<E> {
    fn id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> CommandFamily {
        CommandFamily::Entity
    }

    fn validate_input(&self, input: &Input) -> Result<(), CommandError> {
        input.as_id().map(|_| ())
    }

    async fn execute_do(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        let id = context.redo_input().as_id()?;
        let cached = self
            .cache
            .retrieve(id, |id| self.store.find_by_id(id), E::clone)?;

        if let Some(guard) = &self.guard {
            guard(&cached)?;
        }

        context.set_undo_input(Input::of_entity(&cached)?);
        let removed = self
            .store
            .delete_by_id(id)
            .map_err(|e| CommandError::persistence(format!("delete {}", E::ENTITY_TYPE), e))?;
        if !removed {
            return Err(CommandError::not_found(E::ENTITY_TYPE, id));
        }

        context.complete(json!({ "deleted": id }))?;
        Ok(())
    }

    async fn execute_undo(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        self.cache
            .rollback(context, |e| self.store.save(e), None::<NoDelete>)?;
        Ok(())
    }

    fn error_classifier(&self) -> Arc<dyn ErrorClassifier> {
        self.classifier.clone()
    }
}
