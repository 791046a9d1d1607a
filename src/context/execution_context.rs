use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::history::StateHistory;
use super::input::Input;
use crate::commands::CommandError;
use crate::state_machine::{
    determine_target_state, ContextEvent, ContextState, StateMachineError, StateMachineResult,
};

/// Observer of a context's state changes.
///
/// Listeners are transient: they are not serialized and do not survive a JSON
/// round-trip through the message transport.
pub trait StateChangeListener: Send + Sync {
    fn on_state_changed(
        &self,
        context: &ExecutionContext,
        previous: ContextState,
        current: ContextState,
    );
}

impl<F> StateChangeListener for F
where
    F: Fn(&ExecutionContext, ContextState, ContextState) + Send + Sync,
{
    fn on_state_changed(
        &self,
        context: &ExecutionContext,
        previous: ContextState,
        current: ContextState,
    ) {
        self(context, previous, current)
    }
}

/// Execution record of one command run.
#[derive(Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    id: Uuid,
    command_id: String,
    state: ContextState,
    #[serde(default)]
    redo_input: Input,
    #[serde(default)]
    undo_input: Input,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_cause: Option<CommandError>,
    #[serde(default)]
    history: StateHistory,
    #[serde(skip)]
    listeners: Vec<Arc<dyn StateChangeListener>>,
}

impl ExecutionContext {
    pub fn new(command_id: impl Into<String>, redo_input: Input) -> Self {
        Self {
            id: Uuid::new_v4(),
            command_id: command_id.into(),
            state: ContextState::Init,
            redo_input,
            undo_input: Input::Empty,
            result: None,
            failure_cause: None,
            history: StateHistory::starting_at(ContextState::Init),
            listeners: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn command_id(&self) -> &str {
        &self.command_id
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn redo_input(&self) -> &Input {
        &self.redo_input
    }

    pub fn undo_input(&self) -> &Input {
        &self.undo_input
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Decode the result into a concrete type
    pub fn result_as<T: DeserializeOwned>(&self) -> Result<T, CommandError> {
        let value = self
            .result
            .clone()
            .ok_or_else(|| CommandError::execution(format!("context is {}, no result", self.state)))?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn failure_cause(&self) -> Option<&CommandError> {
        self.failure_cause.as_ref()
    }

    pub fn history(&self) -> &StateHistory {
        &self.history
    }

    pub fn is_ready(&self) -> bool {
        self.state == ContextState::Ready
    }

    pub fn is_done(&self) -> bool {
        self.state == ContextState::Done
    }

    pub fn is_failed(&self) -> bool {
        self.state == ContextState::Fail
    }

    pub fn is_undone(&self) -> bool {
        self.state == ContextState::Undone
    }

    pub fn set_redo_input(&mut self, input: Input) {
        self.redo_input = input;
    }

    pub fn set_undo_input(&mut self, input: Input) {
        self.undo_input = input;
    }

    pub fn add_listener(&mut self, listener: Arc<dyn StateChangeListener>) {
        self.listeners.push(listener);
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// INIT -> READY
    pub fn prepare(&mut self) -> StateMachineResult<()> {
        self.transition(ContextEvent::Prepare)
    }

    /// READY -> WORK
    pub fn start_work(&mut self) -> StateMachineResult<()> {
        self.transition(ContextEvent::Start)
    }

    /// WORK -> DONE with the produced result
    pub fn complete(&mut self, result: Value) -> StateMachineResult<()> {
        self.transition(ContextEvent::Complete)?;
        self.result = Some(result);
        Ok(())
    }

    /// Any non-terminal state -> FAIL; the result is discarded
    pub fn fail(&mut self, cause: CommandError) -> StateMachineResult<()> {
        self.ensure_can(ContextEvent::Fail)?;
        self.failure_cause = Some(cause);
        self.result = None;
        self.transition(ContextEvent::Fail)
    }

    /// INIT or READY -> CANCEL
    pub fn cancel(&mut self) -> StateMachineResult<()> {
        self.transition(ContextEvent::Cancel)
    }

    /// DONE -> WORK for compensation; the forward result is discarded
    pub fn start_undo(&mut self) -> StateMachineResult<()> {
        self.transition(ContextEvent::StartUndo)?;
        self.result = None;
        Ok(())
    }

    /// Compensating WORK -> UNDONE
    pub fn mark_undone(&mut self) -> StateMachineResult<()> {
        self.transition(ContextEvent::Undo)
    }

    /// Fail unless the context already carries a failure.
    ///
    /// Returns false when the context could not be moved to FAIL.
    pub fn fail_if_not_failed(&mut self, cause: CommandError) -> bool {
        if self.is_failed() {
            return true;
        }
        match self.fail(cause) {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    command_id = %self.command_id,
                    context_id = %self.id,
                    error = %error,
                    "Unable to attach failure cause"
                );
                false
            }
        }
    }

    fn ensure_can(&self, event: ContextEvent) -> StateMachineResult<ContextState> {
        determine_target_state(self.state, event, self.history.is_compensating())
    }

    fn transition(&mut self, event: ContextEvent) -> StateMachineResult<()> {
        let previous = self.state;
        let target = self.ensure_can(event)?;

        self.state = target;
        self.history.record(target);

        debug!(
            command_id = %self.command_id,
            context_id = %self.id,
            event = event.event_type(),
            from = %previous,
            to = %target,
            "Context state changed"
        );

        self.notify_listeners(previous, target);
        Ok(())
    }

    fn notify_listeners(&self, previous: ContextState, current: ContextState) {
        for listener in &self.listeners {
            let notified =
                catch_unwind(AssertUnwindSafe(|| listener.on_state_changed(self, previous, current)));
            if notified.is_err() {
                warn!(
                    command_id = %self.command_id,
                    context_id = %self.id,
                    from = %previous,
                    to = %current,
                    "State change listener panicked, continuing"
                );
            }
        }
    }

    /// Reject anything but the expected state
    pub fn expect_state(&self, expected: ContextState) -> StateMachineResult<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(StateMachineError::UnexpectedState {
                state: self.state,
                expected,
            })
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.id)
            .field("command_id", &self.command_id)
            .field("state", &self.state)
            .field("redo_input", &self.redo_input)
            .field("undo_input", &self.undo_input)
            .field("result", &self.result)
            .field("failure_cause", &self.failure_cause)
            .field("history", &self.history.states())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Listeners take no part in equality
impl PartialEq for ExecutionContext {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.command_id == other.command_id
            && self.state == other.state
            && self.redo_input == other.redo_input
            && self.undo_input == other.undo_input
            && self.result == other.result
            && self.failure_cause == other.failure_cause
            && self.history == other.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn ready_context() -> ExecutionContext {
        let mut context = ExecutionContext::new("course.create.or.update", Input::Id(1));
        context.prepare().unwrap();
        context
    }

    #[test]
    fn forward_then_undo_path() {
        let mut context = ready_context();
        context.start_work().unwrap();
        context.complete(json!({"id": 1})).unwrap();
        assert_eq!(context.result(), Some(&json!({"id": 1})));

        context.start_undo().unwrap();
        assert!(context.result().is_none());
        context.mark_undone().unwrap();

        assert_eq!(
            context.history().states(),
            vec![
                ContextState::Init,
                ContextState::Ready,
                ContextState::Work,
                ContextState::Done,
                ContextState::Work,
                ContextState::Undone
            ]
        );
    }

    #[test]
    fn forward_work_cannot_finish_as_undone() {
        let mut context = ready_context();
        context.start_work().unwrap();
        assert!(context.mark_undone().is_err());
        assert_eq!(context.state(), ContextState::Work);
    }

    #[test]
    fn fail_discards_result_and_keeps_cause() {
        let mut context = ready_context();
        context.start_work().unwrap();
        context.complete(json!(1)).unwrap();
        context.fail(CommandError::execution("late failure")).unwrap();

        assert!(context.result().is_none());
        assert_eq!(
            context.failure_cause(),
            Some(&CommandError::execution("late failure"))
        );
        assert!(context.fail(CommandError::execution("again")).is_err());
    }

    #[test]
    fn listeners_see_every_transition_and_panics_are_contained() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();

        let mut context = ExecutionContext::new("listened", Input::Empty);
        context.add_listener(Arc::new(|_: &ExecutionContext, _: ContextState, _: ContextState| {
            panic!("listener failure")
        }));
        context.add_listener(Arc::new(
            move |_: &ExecutionContext, previous: ContextState, current: ContextState| {
                recorder.lock().push((previous, current));
            },
        ));

        context.prepare().unwrap();
        context.cancel().unwrap();

        assert_eq!(
            *seen.lock(),
            vec![
                (ContextState::Init, ContextState::Ready),
                (ContextState::Ready, ContextState::Cancel)
            ]
        );
    }

    #[test]
    fn listeners_are_not_serialized() {
        let mut context = ready_context();
        context.add_listener(Arc::new(|_: &ExecutionContext, _: ContextState, _: ContextState| {}));

        let json = serde_json::to_string(&context).unwrap();
        let decoded: ExecutionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, context);
        assert_eq!(decoded.listener_count(), 0);
    }
}
