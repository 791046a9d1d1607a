//! # Commands
//!
//! Reversible business operations and the building blocks they share: the
//! [`Command`] trait, failure causes, the entity rollback cache, generic entity
//! commands and composite commands.

pub mod command;
pub mod composite;
pub mod entity_commands;
pub mod errors;
pub mod rollback_cache;

pub use command::{
    Command, CommandFamily, ContextPreparer, PositionalInputPreparer, SharedInputPreparer,
};
pub use composite::{MacroCommand, MacroExecutionPool, NestedExecution};
pub use entity_commands::{CreateOrUpdateCommand, DeleteCommand, EntityRule};
pub use errors::{CommandError, DomainViolation};
pub use rollback_cache::EntityRollbackCache;
