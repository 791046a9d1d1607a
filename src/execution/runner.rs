use std::any::Any;

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

use crate::commands::{Command, CommandError};
use crate::context::ExecutionContext;
use crate::messaging::Direction;
use crate::state_machine::ContextState;

/// Run one half of `command` against `context` and return the settled context.
///
/// DO needs a READY context and UNDO a DONE one; anything else is returned
/// untouched. Errors and panics raised by the command end up as the context's
/// failure cause, so callers always get a context back.
pub async fn execute_context(
    command: &dyn Command,
    mut context: ExecutionContext,
    direction: Direction,
) -> ExecutionContext {
    let started = match direction {
        Direction::Do if context.is_ready() => context.start_work(),
        Direction::Undo if context.is_done() => context.start_undo(),
        _ => {
            debug!(
                command_id = %command.id(),
                state = %context.state(),
                direction = %direction,
                "Context not executable in this direction, returning it unchanged"
            );
            return context;
        }
    };
    if let Err(e) = started {
        error!(command_id = %command.id(), error = %e, "Unable to enter WORK");
        return context;
    }

    let outcome = match direction {
        Direction::Do => AssertUnwindSafe(command.execute_do(&mut context))
            .catch_unwind()
            .await,
        Direction::Undo => AssertUnwindSafe(command.execute_undo(&mut context))
            .catch_unwind()
            .await,
    };

    match outcome {
        Ok(Ok(())) => settle_success(command, &mut context, direction),
        Ok(Err(cause)) => {
            debug!(command_id = %command.id(), error = %cause, direction = %direction, "Command returned an error");
            context.fail_if_not_failed(cause);
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(command_id = %command.id(), panic = %message, direction = %direction, "Command panicked");
            context.fail_if_not_failed(CommandError::execution(format!("command panicked: {message}")));
        }
    }
    context
}

fn settle_success(command: &dyn Command, context: &mut ExecutionContext, direction: Direction) {
    if context.state() != ContextState::Work {
        return;
    }
    match direction {
        Direction::Do => {
            context.fail_if_not_failed(CommandError::execution(format!(
                "command '{}' finished without a result",
                command.id()
            )));
        }
        Direction::Undo => {
            if let Err(e) = context.mark_undone() {
                error!(command_id = %command.id(), error = %e, "Unable to mark context undone");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
