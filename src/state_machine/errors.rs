use thiserror::Error;

use super::states::ContextState;

/// State machine errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateMachineError {
    #[error("Invalid transition from {from} on event '{event}'")]
    InvalidTransition { from: ContextState, event: String },

    #[error("Context is {state}, expected {expected}")]
    UnexpectedState {
        state: ContextState,
        expected: ContextState,
    },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
