use proptest::prelude::*;

use campus_core::context::Input;
use campus_core::state_machine::ContextEvent;

pub fn context_event_strategy() -> impl Strategy<Value = ContextEvent> {
    prop_oneof![
        Just(ContextEvent::Prepare),
        Just(ContextEvent::Start),
        Just(ContextEvent::Complete),
        Just(ContextEvent::Fail),
        Just(ContextEvent::Cancel),
        Just(ContextEvent::StartUndo),
        Just(ContextEvent::Undo),
    ]
}

/// Events biased toward the happy path so long runs actually reach DONE and UNDONE
pub fn event_sequence_strategy() -> impl Strategy<Value = Vec<ContextEvent>> {
    prop::collection::vec(
        prop_oneof![
            4 => prop_oneof![
                Just(ContextEvent::Prepare),
                Just(ContextEvent::Start),
                Just(ContextEvent::Complete),
                Just(ContextEvent::StartUndo),
                Just(ContextEvent::Undo),
            ],
            1 => context_event_strategy(),
        ],
        0..24,
    )
}

pub fn scalar_input_strategy() -> impl Strategy<Value = Input> {
    prop_oneof![
        Just(Input::Empty),
        any::<i64>().prop_map(Input::Id),
        (any::<i64>(), any::<i64>()).prop_map(|(primary, secondary)| Input::link(primary, secondary)),
    ]
}
