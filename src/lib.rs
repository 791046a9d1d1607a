#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Campus Core
//!
//! Command execution and compensation engine for the campus school-management
//! business layer.
//!
//! ## Overview
//!
//! Every business operation is a reversible [`Command`](commands::Command): it runs
//! forward against an [`ExecutionContext`](context::ExecutionContext) and knows how to
//! compensate what it did. Commands are looked up by id in a
//! [`CommandRegistry`](registry::CommandRegistry) and run through an
//! [`ActionExecutor`](execution::ActionExecutor), either directly on the caller's
//! task or through the in-process message transport with a per-request watchdog.
//!
//! ## Key Features
//!
//! - **Context state machine**: INIT, READY, WORK, DONE, FAIL, CANCEL, UNDONE with full history
//! - **Compensation**: entity commands cache the pre-change state and restore it on undo
//! - **Composite commands**: sequential or parallel nests; only finished nested commands are compensated
//! - **Correlated messaging**: watchdogs turn missing responses into timeout failures
//! - **Failure isolation**: command errors and panics become context failures, never crashes
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Context states, events and the transition table
//! - [`context`] - Execution contexts, inputs and state history
//! - [`commands`] - Command trait, entity commands, rollback cache, composites
//! - [`registry`] - Command registry
//! - [`messaging`] - Command messages, watchdogs and processors
//! - [`execution`] - Executors, command runner, facade and failure classification
//! - [`persistence`] - Entity store seam and the in-memory store
//! - [`school`] - Course, student and group commands
//! - [`config`] - Engine configuration
//! - [`error`] - Engine-level errors
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use campus_core::commands::MacroExecutionPool;
//! use campus_core::config::EngineConfig;
//! use campus_core::context::Input;
//! use campus_core::execution::{CommandsFacade, ExecutorHandle, MessageActionExecutor};
//! use campus_core::registry::CommandRegistry;
//! use campus_core::school::{register_school_commands, Course, SchoolCommandsConfig, SchoolStores};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_env()?;
//! let registry = Arc::new(CommandRegistry::new());
//! let executor = Arc::new(MessageActionExecutor::new(registry.clone(), config.clone()));
//!
//! register_school_commands(
//!     &registry,
//!     &SchoolStores::in_memory(),
//!     ExecutorHandle::new(&executor),
//!     MacroExecutionPool::from_config(&config),
//!     &SchoolCommandsConfig::default(),
//! );
//! executor.start().await?;
//!
//! let facade = CommandsFacade::new(registry, executor.clone());
//! let course: Course = facade
//!     .execute("course.create.or.update", Input::of_entity(&Course::new("Algebra", "Linear algebra"))?)
//!     .await?;
//! println!("created course {:?}", course.id);
//!
//! executor.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod execution;
pub mod logging;
pub mod messaging;
pub mod persistence;
pub mod registry;
pub mod school;
pub mod state_machine;

pub use commands::{Command, CommandError, CommandFamily, MacroCommand};
pub use config::EngineConfig;
pub use context::{ExecutionContext, Input};
pub use error::{CampusError, Result};
pub use execution::{ActionExecutor, CommandsFacade, ExecutionFailure, LocalActionExecutor, MessageActionExecutor};
pub use registry::CommandRegistry;
pub use state_machine::ContextState;
