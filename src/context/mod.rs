//! # Execution Contexts
//!
//! The unit of work the engine moves around: a command id, its forward and
//! compensation inputs, the current state with its full history, and the
//! outcome (result or failure cause).

pub mod execution_context;
pub mod history;
pub mod input;

pub use execution_context::{ExecutionContext, StateChangeListener};
pub use history::{HistoryRecord, StateHistory};
pub use input::{EntityPayload, Input, MacroParameter};
