//! Composite (macro) commands: an ordered nest of commands executed as one unit,
//! sequentially or in parallel. Compensation only ever touches nested commands
//! that reached DONE.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::command::{Command, CommandFamily, ContextPreparer, PositionalInputPreparer, SharedInputPreparer};
use super::errors::CommandError;
use crate::config::EngineConfig;
use crate::context::{ExecutionContext, Input, MacroParameter, StateChangeListener};
use crate::execution::action_executor::{ActionExecutor, ExecutorHandle};
use crate::execution::error_classifier::{ErrorClassifier, StandardErrorClassifier};
use crate::messaging::Direction;

/// How nested commands run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedExecution {
    /// In nest order, one at a time
    Sequential { stop_on_failure: bool },
    /// All at once, bounded by the shared macro pool
    Parallel,
}

/// Bounded pool shared by all parallel composites
#[derive(Debug, Clone)]
pub struct MacroExecutionPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl MacroExecutionPool {
    /// Pool of exactly `size` permits (at least one). Engine wiring goes through
    /// [`from_config`](Self::from_config), which applies the core-count floor.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.effective_macro_pool_size())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, CommandError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CommandError::execution("macro execution pool closed"))
    }
}

/// Composite command over an ordered nest of commands.
///
/// Nested contexts are built at preparation time; a nested context that is not
/// READY fails the whole composite before anything runs. Nested commands are
/// dispatched through the action executor the composite was built with.
pub struct MacroCommand {
    id: String,
    nest: Vec<Arc<dyn Command>>,
    execution: NestedExecution,
    executor: ExecutorHandle,
    pool: MacroExecutionPool,
    preparer: Arc<dyn ContextPreparer>,
    positional_input: bool,
    rollback_on_failure: bool,
    nested_listener: Option<Arc<dyn StateChangeListener>>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl MacroCommand {
    pub fn new(
        id: impl Into<String>,
        nest: Vec<Arc<dyn Command>>,
        execution: NestedExecution,
        executor: ExecutorHandle,
        pool: MacroExecutionPool,
    ) -> Self {
        Self {
            id: id.into(),
            nest,
            execution,
            executor,
            pool,
            preparer: Arc::new(SharedInputPreparer),
            positional_input: false,
            rollback_on_failure: false,
            nested_listener: None,
            classifier: Arc::new(StandardErrorClassifier),
        }
    }

    pub fn sequential(
        id: impl Into<String>,
        nest: Vec<Arc<dyn Command>>,
        stop_on_failure: bool,
        executor: ExecutorHandle,
        pool: MacroExecutionPool,
    ) -> Self {
        Self::new(
            id,
            nest,
            NestedExecution::Sequential { stop_on_failure },
            executor,
            pool,
        )
    }

    pub fn parallel(
        id: impl Into<String>,
        nest: Vec<Arc<dyn Command>>,
        executor: ExecutorHandle,
        pool: MacroExecutionPool,
    ) -> Self {
        Self::new(id, nest, NestedExecution::Parallel, executor, pool)
    }

    /// Expect `Input::Values` with exactly one element per nested command
    pub fn with_positional_input(mut self) -> Self {
        self.preparer = Arc::new(PositionalInputPreparer);
        self.positional_input = true;
        self
    }

    /// Compensate finished nested commands as soon as the composite fails.
    ///
    /// Without it, a failed composite keeps them DONE until [`rollback_failed`](Self::rollback_failed).
    pub fn with_rollback_on_failure(mut self) -> Self {
        self.rollback_on_failure = true;
        self
    }

    pub fn with_preparer(mut self, preparer: Arc<dyn ContextPreparer>) -> Self {
        self.preparer = preparer;
        self
    }

    /// Receives every state change of every nested context, in order per context
    pub fn with_nested_listener(mut self, listener: Arc<dyn StateChangeListener>) -> Self {
        self.nested_listener = Some(listener);
        self
    }

    pub fn with_error_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn nest(&self) -> &[Arc<dyn Command>] {
        &self.nest
    }

    pub fn execution(&self) -> NestedExecution {
        self.execution
    }

    fn check_root_input(&self, input: &Input) -> Result<(), CommandError> {
        if self.nest.is_empty() {
            return Err(CommandError::invalid_parameter(format!(
                "composite '{}' has no nested commands",
                self.id
            )));
        }
        if self.positional_input {
            match input {
                Input::Values(values) if values.len() == self.nest.len() => {}
                Input::Values(values) => {
                    return Err(CommandError::invalid_parameter(format!(
                        "composite '{}' expects {} values, got {}",
                        self.id,
                        self.nest.len(),
                        values.len()
                    )))
                }
                other => {
                    return Err(CommandError::type_mismatch(
                        format!("values[{}]", self.nest.len()),
                        other.describe(),
                    ))
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&self, context: ExecutionContext, direction: Direction) -> ExecutionContext {
        let executor = match self.executor.upgrade() {
            Ok(executor) => executor,
            Err(cause) => return failed(context, cause),
        };
        dispatch_nested(executor, context, direction, self.nested_listener.clone()).await
    }

    async fn run_sequential(
        &self,
        nested: Vec<ExecutionContext>,
        stop_on_failure: bool,
    ) -> Vec<ExecutionContext> {
        let mut executed = Vec::with_capacity(nested.len());
        let mut stopped = false;

        for context in nested {
            if stopped {
                executed.push(context);
                continue;
            }
            let finished = self.dispatch(context, Direction::Do).await;
            if !finished.is_done() && stop_on_failure {
                debug!(
                    command_id = %self.id,
                    nested = %finished.command_id(),
                    "Nested command failed, skipping the rest"
                );
                stopped = true;
            }
            executed.push(finished);
        }
        executed
    }

    async fn run_parallel(
        &self,
        nested: Vec<ExecutionContext>,
        direction: Direction,
    ) -> Vec<ExecutionContext> {
        let executor = match self.executor.upgrade() {
            Ok(executor) => executor,
            Err(cause) => {
                return nested
                    .into_iter()
                    .map(|context| failed(context, cause.clone()))
                    .collect()
            }
        };

        let mut slots: Vec<Option<ExecutionContext>> = Vec::with_capacity(nested.len());
        let mut originals = Vec::with_capacity(nested.len());
        let mut join_set = JoinSet::new();

        for (position, context) in nested.into_iter().enumerate() {
            slots.push(None);
            originals.push(context.clone());

            let executor = executor.clone();
            let pool = self.pool.clone();
            let listener = self.nested_listener.clone();
            join_set.spawn(async move {
                let _permit = match pool.acquire().await {
                    Ok(permit) => permit,
                    Err(cause) => return (position, failed(context, cause)),
                };
                (position, dispatch_nested(executor, context, direction, listener).await)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((position, context)) => slots[position] = Some(context),
                Err(join_error) => {
                    error!(command_id = %self.id, error = %join_error, "Nested task aborted");
                }
            }
        }

        slots
            .into_iter()
            .zip(originals)
            .map(|(slot, original)| {
                slot.unwrap_or_else(|| failed(original, CommandError::execution("nested task aborted")))
            })
            .collect()
    }

    /// Undo every DONE context of `nested`; other contexts are left untouched.
    ///
    /// Sequential composites compensate in reverse nest order.
    pub async fn rollback_done(&self, nested: Vec<ExecutionContext>) -> Vec<ExecutionContext> {
        let done = nested.iter().filter(|c| c.is_done()).count();
        if done == 0 {
            return nested;
        }
        info!(command_id = %self.id, done, "Compensating finished nested commands");

        match self.execution {
            NestedExecution::Parallel => {
                let (to_undo, kept): (Vec<_>, Vec<_>) = nested
                    .into_iter()
                    .enumerate()
                    .partition(|(_, context)| context.is_done());
                let (positions, contexts): (Vec<usize>, Vec<ExecutionContext>) =
                    to_undo.into_iter().unzip();
                let undone = self.run_parallel(contexts, Direction::Undo).await;

                let mut merged: Vec<(usize, ExecutionContext)> =
                    positions.into_iter().zip(undone).chain(kept).collect();
                merged.sort_by_key(|(position, _)| *position);
                merged.into_iter().map(|(_, context)| context).collect()
            }
            NestedExecution::Sequential { .. } => {
                let mut slots: Vec<ExecutionContext> = nested;
                for position in (0..slots.len()).rev() {
                    if !slots[position].is_done() {
                        continue;
                    }
                    let context = slots[position].clone();
                    slots[position] = self.dispatch(context, Direction::Undo).await;
                }
                slots
            }
        }
    }
}

impl MacroCommand {
    /// Compensate the nested commands a failed run left DONE.
    ///
    /// Returns how many nested commands were undone by this call.
    pub async fn rollback_failed(&self, context: &mut ExecutionContext) -> Result<usize, CommandError> {
        if !context.is_failed() {
            return Err(CommandError::invalid_parameter(format!(
                "composite context is {}, expected FAIL",
                context.state()
            )));
        }
        // A composite that failed in preparation never ran anything.
        if matches!(context.undo_input(), Input::Empty) {
            debug!(command_id = %self.id, "Failed composite has nothing to compensate");
            return Ok(0);
        }
        let parameter = context.undo_input().as_macro()?.clone();
        let root = parameter.root.as_ref().clone();
        let was_done: Vec<bool> = parameter.nested.iter().map(|c| c.is_done()).collect();

        let compensated = self.rollback_done(parameter.nested).await;
        let undone = compensated
            .iter()
            .zip(&was_done)
            .filter(|(context, was_done)| **was_done && context.is_undone())
            .count();

        context.set_undo_input(Input::Macro(MacroParameter::new(root, compensated)));
        info!(command_id = %self.id, undone, "Failed composite compensated");
        Ok(undone)
    }
}

#[async_trait]
impl Command for MacroCommand {
    fn id(&self) -> &str {
        &self.id
    }

    fn family(&self) -> CommandFamily {
        CommandFamily::Macro
    }

    fn validate_input(&self, input: &Input) -> Result<(), CommandError> {
        self.check_root_input(input)
    }

    fn create_context(&self, input: &Input) -> ExecutionContext {
        let mut context = ExecutionContext::new(&self.id, input.clone());

        if let Err(cause) = self.check_root_input(input) {
            context.fail_if_not_failed(cause);
            return context;
        }

        let nested: Vec<ExecutionContext> = self
            .nest
            .iter()
            .enumerate()
            .map(|(position, command)| {
                command.accept_prepared_context(self.preparer.as_ref(), position, input)
            })
            .collect();

        let not_ready = nested
            .iter()
            .find(|c| !c.is_ready())
            .map(|c| {
                c.failure_cause().cloned().unwrap_or_else(|| {
                    CommandError::execution(format!(
                        "nested command '{}' is {} after preparation",
                        c.command_id(),
                        c.state()
                    ))
                })
            });

        context.set_redo_input(Input::Macro(MacroParameter::new(input.clone(), nested)));
        let settled = match not_ready {
            Some(cause) => {
                warn!(command_id = %self.id, error = %cause, "Nested preparation failed");
                context.fail(cause)
            }
            None => context.prepare(),
        };
        if let Err(error) = settled {
            warn!(command_id = %self.id, error = %error, "Unable to settle composite context");
        }
        context
    }

    async fn execute_do(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        let parameter = context.redo_input().as_macro()?.clone();
        let root = parameter.root.as_ref().clone();

        let executed = match self.execution {
            NestedExecution::Sequential { stop_on_failure } => {
                self.run_sequential(parameter.nested, stop_on_failure).await
            }
            NestedExecution::Parallel => self.run_parallel(parameter.nested, Direction::Do).await,
        };

        if let Some(cause) = first_failure(&executed) {
            let nested = if self.rollback_on_failure {
                self.rollback_done(executed).await
            } else {
                executed
            };
            context.set_undo_input(Input::Macro(MacroParameter::new(root, nested)));
            return Err(cause);
        }

        let results: Vec<Value> = executed
            .iter()
            .map(|c| c.result().cloned().unwrap_or(Value::Null))
            .collect();
        context.set_undo_input(Input::Macro(MacroParameter::new(root, executed)));
        context.complete(Value::Array(results))?;
        Ok(())
    }

    async fn execute_undo(&self, context: &mut ExecutionContext) -> Result<(), CommandError> {
        let parameter = context.undo_input().as_macro()?.clone();
        let root = parameter.root.as_ref().clone();

        let compensated = self.rollback_done(parameter.nested).await;
        let incomplete = compensated.iter().find(|c| !c.is_undone()).map(|c| {
            c.failure_cause().cloned().unwrap_or_else(|| {
                CommandError::execution(format!(
                    "nested command '{}' is {} after rollback",
                    c.command_id(),
                    c.state()
                ))
            })
        });

        context.set_undo_input(Input::Macro(MacroParameter::new(root, compensated)));
        match incomplete {
            Some(cause) => Err(cause),
            None => Ok(()),
        }
    }

    fn error_classifier(&self) -> Arc<dyn ErrorClassifier> {
        self.classifier.clone()
    }
}

/// Run one nested context through the executor and replay its new states to `listener`
async fn dispatch_nested(
    executor: Arc<dyn ActionExecutor>,
    context: ExecutionContext,
    direction: Direction,
    listener: Option<Arc<dyn StateChangeListener>>,
) -> ExecutionContext {
    let recorded = context.history().len();
    let finished = match direction {
        Direction::Do => executor.commit(context).await,
        Direction::Undo => executor.rollback(context).await,
    };

    if let Some(listener) = listener {
        for (previous, current) in finished.history().transitions_since(recorded) {
            let replayed = catch_unwind(AssertUnwindSafe(|| {
                listener.on_state_changed(&finished, previous, current)
            }));
            if replayed.is_err() {
                warn!(nested = %finished.command_id(), "Nested state listener panicked, continuing");
            }
        }
    }
    finished
}

/// First failure cause in nest order; a context left unfinished counts as a failure
fn first_failure(executed: &[ExecutionContext]) -> Option<CommandError> {
    let failed = executed.iter().find(|c| c.is_failed());
    if let Some(context) = failed {
        return Some(context.failure_cause().cloned().unwrap_or_else(|| {
            CommandError::execution(format!("nested command '{}' failed", context.command_id()))
        }));
    }
    executed.iter().find(|c| !c.is_done()).map(|c| {
        CommandError::execution(format!(
            "nested command '{}' finished in {}",
            c.command_id(),
            c.state()
        ))
    })
}

fn failed(mut context: ExecutionContext, cause: CommandError) -> ExecutionContext {
    context.fail_if_not_failed(cause);
    context
}
