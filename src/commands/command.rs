use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::CommandError;
use crate::context::{ExecutionContext, Input};
use crate::execution::error_classifier::{ErrorClassifier, StandardErrorClassifier};

/// Broad kind of a command, used by context preparers to decide how to project input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFamily {
    /// Create, update or delete of a single entity
    Entity,
    /// Link between two entities
    Relation,
    /// Composite of nested commands
    Macro,
    Auxiliary,
}

/// Builds the nested context for one position of a composite command.
///
/// `create` is the nested command's own context factory; preparers decide which
/// input it receives.
pub trait ContextPreparer: Send + Sync {
    fn prepare_context(
        &self,
        family: CommandFamily,
        position: usize,
        input: &Input,
        create: &dyn Fn(&Input) -> ExecutionContext,
    ) -> ExecutionContext;
}

/// Hands the composite's root input unchanged to every nested command
#[derive(Debug, Default, Clone, Copy)]
pub struct SharedInputPreparer;

impl ContextPreparer for SharedInputPreparer {
    fn prepare_context(
        &self,
        _family: CommandFamily,
        _position: usize,
        input: &Input,
        create: &dyn Fn(&Input) -> ExecutionContext,
    ) -> ExecutionContext {
        create(input)
    }
}

/// Projects `Values[position]` for entity and relation commands
#[derive(Debug, Default, Clone, Copy)]
pub struct PositionalInputPreparer;

impl ContextPreparer for PositionalInputPreparer {
    fn prepare_context(
        &self,
        family: CommandFamily,
        position: usize,
        input: &Input,
        create: &dyn Fn(&Input) -> ExecutionContext,
    ) -> ExecutionContext {
        if !matches!(family, CommandFamily::Entity | CommandFamily::Relation) {
            return create(input);
        }

        match input.at(position) {
            Ok(projected) => create(projected),
            Err(cause) => {
                // Still produce a context for the position so the composite can report it.
                let template = create(&Input::Empty);
                let mut context = ExecutionContext::new(template.command_id(), input.clone());
                context.fail_if_not_failed(cause);
                context
            }
        }
    }
}

/// A reversible business operation.
///
/// `execute_do` must leave the context DONE with a result (or return an error);
/// `execute_undo` compensates a DONE context. The executor owns the WORK
/// transitions around both calls.
#[async_trait]
pub trait Command: Send + Sync {
    fn id(&self) -> &str;

    fn family(&self) -> CommandFamily {
        CommandFamily::Auxiliary
    }

    /// Input check performed when the context is created
    fn validate_input(&self, _input: &Input) -> Result<(), CommandError> {
        Ok(())
    }

    /// New context bound to this command, READY when the input is acceptable and FAIL otherwise
    fn create_context(&self, input: &Input) -> ExecutionContext {
        let mut context = ExecutionContext::new(self.id(), input.clone());
        let outcome = match self.validate_input(input) {
            Ok(()) => context.prepare(),
            Err(cause) => context.fail(cause),
        };
        if let Err(error) = outcome {
            warn!(command_id = %self.id(), error = %error, "Unable to settle new context");
        }
        context
    }

    /// Let `preparer` build this command's context as nested position `position`
    fn accept_prepared_context(
        &self,
        preparer: &dyn ContextPreparer,
        position: usize,
        input: &Input,
    ) -> ExecutionContext {
        preparer.prepare_context(self.family(), position, input, &|projected| {
            self.create_context(projected)
        })
    }

    async fn execute_do(&self, context: &mut ExecutionContext) -> Result<(), CommandError>;

    async fn execute_undo(&self, context: &mut ExecutionContext) -> Result<(), CommandError>;

    /// Maps this command's failure causes onto caller-facing failures
    fn error_classifier(&self) -> Arc<dyn ErrorClassifier> {
        Arc::new(StandardErrorClassifier)
    }
}
