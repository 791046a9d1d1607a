//! # Execution
//!
//! Running contexts: the [`ActionExecutor`] seam with its local and
//! message-based implementations, the shared command runner, failure
//! classification, and the caller-facing [`CommandsFacade`].

pub mod action_executor;
pub mod error_classifier;
pub mod facade;
pub mod local_executor;
pub mod message_executor;
pub mod runner;

pub use action_executor::{ActionExecutor, ExecutorHandle};
pub use error_classifier::{ErrorCategory, ErrorClassifier, ExecutionFailure, StandardErrorClassifier};
pub use facade::CommandsFacade;
pub use local_executor::LocalActionExecutor;
pub use message_executor::{ExecutorStats, MessageActionExecutor};
pub use runner::execute_context;
