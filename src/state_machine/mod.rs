// State machine for execution contexts
//
// Every command execution is tracked by a context that moves through
// INIT -> READY -> WORK -> DONE, with FAIL/CANCEL exits and a
// DONE -> WORK -> UNDONE compensation path.

pub mod context_state_machine;
pub mod errors;
pub mod events;
pub mod states;

pub use context_state_machine::determine_target_state;
pub use errors::{StateMachineError, StateMachineResult};
pub use events::ContextEvent;
pub use states::ContextState;
