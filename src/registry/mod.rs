//! # Command Registry
//!
//! Id-keyed lookup of every command the engine can execute. Executors resolve a
//! context's command through the registry at execution time, so contexts stay
//! plain data and can cross the message transport.

pub mod command_registry;

pub use command_registry::{CommandRegistry, RegistryStats};
