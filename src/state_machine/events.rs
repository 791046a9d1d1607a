use serde::{Deserialize, Serialize};

/// Events that move an execution context between states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContextEvent {
    /// Input accepted
    Prepare,
    /// Forward execution begins
    Start,
    /// Forward execution produced a result
    Complete,
    /// Execution or compensation failed
    Fail,
    /// Execution abandoned before start
    Cancel,
    /// Compensation of a DONE context begins
    StartUndo,
    /// Compensation finished
    Undo,
}

impl ContextEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::StartUndo => "start_undo",
            Self::Undo => "undo",
        }
    }
}
