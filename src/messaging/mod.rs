//! # Messaging Module
//!
//! In-process message transport for command execution: correlated command
//! messages, the watchdogs that wait for their responses, and the input/output
//! processors that move messages between callers and command workers.

pub mod errors;
pub mod message;
pub mod processor;
pub mod watchdog;

pub use errors::MessagingError;
pub use message::{CommandMessage, Direction, TransportFrame};
pub use processor::{InputProcessor, OutputProcessor, ProcessorStatus};
pub use watchdog::{MessageWatchdog, WatchdogStatus};
