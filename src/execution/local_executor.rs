use std::sync::Arc;

use async_trait::async_trait;

use super::action_executor::ActionExecutor;
use super::runner::execute_context;
use crate::context::ExecutionContext;
use crate::messaging::Direction;
use crate::registry::CommandRegistry;

/// Runs commands directly on the caller's task, without the message transport.
///
/// ```rust
/// use std::sync::Arc;
/// use campus_core::context::Input;
/// use campus_core::execution::{CommandsFacade, LocalActionExecutor};
/// use campus_core::registry::CommandRegistry;
/// use campus_core::school::commands::course_delete;
/// use campus_core::school::SchoolStores;
///
/// # tokio_test::block_on(async {
/// let registry = Arc::new(CommandRegistry::new());
/// registry.register(course_delete(&SchoolStores::in_memory()));
/// let facade = CommandsFacade::new(registry.clone(), Arc::new(LocalActionExecutor::new(registry)));
///
/// let missing = facade.execute::<serde_json::Value>("course.delete", Input::Id(7)).await;
/// assert!(missing.is_err());
/// # });
/// ```
pub struct LocalActionExecutor {
    registry: Arc<CommandRegistry>,
}

impl LocalActionExecutor {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        Self { registry }
    }

    async fn run(&self, mut context: ExecutionContext, direction: Direction) -> ExecutionContext {
        match self.registry.get(context.command_id()) {
            Ok(command) => execute_context(command.as_ref(), context, direction).await,
            Err(cause) => {
                context.fail_if_not_failed(cause);
                context
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for LocalActionExecutor {
    async fn commit(&self, context: ExecutionContext) -> ExecutionContext {
        self.run(context, Direction::Do).await
    }

    async fn rollback(&self, context: ExecutionContext) -> ExecutionContext {
        self.run(context, Direction::Undo).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Input;
    use crate::execution::{CommandsFacade, ExecutionFailure};
    use crate::persistence::EntityStore;
    use crate::school::commands::course_create_or_update;
    use crate::school::{Course, SchoolStores};
    use crate::state_machine::ContextState;

    fn facade() -> (CommandsFacade, SchoolStores) {
        let stores = SchoolStores::in_memory();
        let registry = Arc::new(CommandRegistry::new());
        registry.register(course_create_or_update(&stores));
        let executor = Arc::new(LocalActionExecutor::new(registry.clone()));
        (CommandsFacade::new(registry, executor), stores)
    }

    #[tokio::test]
    async fn runs_commands_inline() {
        let (facade, stores) = facade();
        let input = Input::of_entity(&Course::new("Geometry", "shapes")).unwrap();

        let context = facade
            .execute_context("course.create.or.update", input)
            .await
            .unwrap();
        let id = context.undo_input().as_id().unwrap();
        assert!(stores.courses.find_by_id(id).unwrap().is_some());

        let undone = facade.undo(context).await.unwrap();
        assert_eq!(undone.state(), ContextState::Undone);
        assert!(stores.courses.find_by_id(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_command_fails_the_context() {
        let registry = Arc::new(CommandRegistry::new());
        let executor = LocalActionExecutor::new(registry);
        let mut context = ExecutionContext::new("nope", Input::Empty);
        context.prepare().unwrap();

        let context = executor.commit(context).await;
        assert_eq!(context.state(), ContextState::Fail);
        assert!(matches!(
            context.failure_cause(),
            Some(crate::commands::CommandError::NotRegistered { .. })
        ));
    }

    #[tokio::test]
    async fn custom_error_handling_maps_failures() {
        let (facade, _stores) = facade();
        let input = Input::of_entity(&Course::new("", "nameless")).unwrap();

        let message = facade
            .execute_with_custom_error_handling::<Course, String, _>(
                "course.create.or.update",
                input,
                |failure| match failure {
                    ExecutionFailure::InvalidParameter { .. } => "invalid".to_string(),
                    other => other.to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(message, "invalid");
    }
}
