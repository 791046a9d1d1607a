//! # Commands Facade
//!
//! Entry point for callers: resolve a command, build its context, execute it
//! and turn a failed context into a classified [`ExecutionFailure`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::action_executor::ActionExecutor;
use super::error_classifier::ExecutionFailure;
use crate::commands::{Command, CommandError};
use crate::context::{ExecutionContext, Input};
use crate::logging::log_command_operation;
use crate::registry::CommandRegistry;
use crate::state_machine::ContextState;

pub struct CommandsFacade {
    registry: Arc<CommandRegistry>,
    executor: Arc<dyn ActionExecutor>,
}

impl CommandsFacade {
    pub fn new(registry: Arc<CommandRegistry>, executor: Arc<dyn ActionExecutor>) -> Self {
        Self { registry, executor }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Execute `command_id` with `input` and decode its result
    pub async fn execute<T: DeserializeOwned>(
        &self,
        command_id: &str,
        input: Input,
    ) -> Result<T, ExecutionFailure> {
        let context = self.execute_context(command_id, input).await?;
        context
            .result_as::<T>()
            .map_err(|cause| ExecutionFailure::UnexpectedResult {
                command_id: command_id.to_string(),
                message: cause.to_string(),
            })
    }

    /// Like [`execute`](Self::execute), mapping failures through `on_failure`
    pub async fn execute_with_custom_error_handling<T, E, F>(
        &self,
        command_id: &str,
        input: Input,
        on_failure: F,
    ) -> Result<T, E>
    where
        T: DeserializeOwned,
        F: FnOnce(ExecutionFailure) -> E,
    {
        self.execute(command_id, input).await.map_err(on_failure)
    }

    /// Execute and return the DONE context, which can later be passed to [`undo`](Self::undo)
    pub async fn execute_context(
        &self,
        command_id: &str,
        input: Input,
    ) -> Result<ExecutionContext, ExecutionFailure> {
        let command = self.resolve(command_id)?;
        let context = command.create_context(&input);
        if !context.is_ready() {
            return Err(classify_failure(command.as_ref(), &context));
        }

        log_command_operation("commit", command_id, None, "started", None);
        let context = self.executor.commit(context).await;
        self.settle(command.as_ref(), context, ContextState::Done)
    }

    /// Compensate a context previously returned by [`execute_context`](Self::execute_context)
    pub async fn undo(&self, context: ExecutionContext) -> Result<ExecutionContext, ExecutionFailure> {
        let command = self.resolve(context.command_id())?;
        if !context.state().can_undo() {
            return Err(ExecutionFailure::UnableToExecute {
                command_id: context.command_id().to_string(),
                cause: CommandError::invalid_parameter(format!(
                    "only DONE contexts can be undone, context is {}",
                    context.state()
                )),
            });
        }

        log_command_operation("rollback", context.command_id(), None, "started", None);
        let context = self.executor.rollback(context).await;
        self.settle(command.as_ref(), context, ContextState::Undone)
    }

    fn resolve(&self, command_id: &str) -> Result<Arc<dyn Command>, ExecutionFailure> {
        self.registry
            .find(command_id)
            .ok_or_else(|| ExecutionFailure::NotRegistered {
                command_id: command_id.to_string(),
            })
    }

    fn settle(
        &self,
        command: &dyn Command,
        context: ExecutionContext,
        expected: ContextState,
    ) -> Result<ExecutionContext, ExecutionFailure> {
        if context.state() == expected {
            debug!(command_id = %command.id(), state = %expected, "Command settled");
            log_command_operation("settle", command.id(), None, &expected.to_string(), None);
            return Ok(context);
        }
        Err(classify_failure(command, &context))
    }
}

fn classify_failure(command: &dyn Command, context: &ExecutionContext) -> ExecutionFailure {
    match context.failure_cause() {
        Some(cause) => command.error_classifier().classify(command.id(), cause.clone()),
        None if context.is_failed() => {
            error!(command_id = %command.id(), "Context failed without a cause");
            ExecutionFailure::ExceptionMissing {
                command_id: command.id().to_string(),
            }
        }
        None => ExecutionFailure::UnableToExecute {
            command_id: command.id().to_string(),
            cause: CommandError::execution(format!("context finished in {}", context.state())),
        },
    }
}
