//! # School Command Set
//!
//! Courses, students and student groups, with the commands the business layer
//! exposes for them.

pub mod classifier;
pub mod commands;
pub mod models;

pub use classifier::SchoolErrorClassifier;
pub use commands::{register_school_commands, RegisterStudentToCourseCommand, SchoolCommandsConfig, SchoolStores};
pub use models::{Course, Student, StudentsGroup};
