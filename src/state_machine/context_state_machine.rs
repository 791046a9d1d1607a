use super::errors::{StateMachineError, StateMachineResult};
use super::events::ContextEvent;
use super::states::ContextState;

/// Determine the target state for a context event.
///
/// `compensating` tells whether the current WORK phase was entered from DONE;
/// only then may WORK finish as UNDONE, and only otherwise may it finish as DONE.
pub fn determine_target_state(
    current: ContextState,
    event: ContextEvent,
    compensating: bool,
) -> StateMachineResult<ContextState> {
    let target = match (current, event) {
        (ContextState::Init, ContextEvent::Prepare) => ContextState::Ready,
        (ContextState::Ready, ContextEvent::Start) => ContextState::Work,
        (ContextState::Work, ContextEvent::Complete) if !compensating => ContextState::Done,
        (ContextState::Done, ContextEvent::StartUndo) => ContextState::Work,
        (ContextState::Work, ContextEvent::Undo) if compensating => ContextState::Undone,

        (
            ContextState::Init | ContextState::Ready | ContextState::Work | ContextState::Done,
            ContextEvent::Fail,
        ) => ContextState::Fail,
        (ContextState::Init | ContextState::Ready, ContextEvent::Cancel) => ContextState::Cancel,

        (from, event) => {
            return Err(StateMachineError::InvalidTransition {
                from,
                event: event.event_type().to_string(),
            })
        }
    };

    Ok(target)
}
