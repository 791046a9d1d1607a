use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::{EntityId, PersistenceError};
use crate::state_machine::StateMachineError;

/// Failure cause attached to an execution context.
///
/// Causes travel inside contexts (and through the message transport), so they are
/// plain data: cloneable and serializable.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandError {
    #[error("Command not registered: {command_id}")]
    NotRegistered { command_id: String },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("{entity_type} with id {id} not found")]
    NotFound { entity_type: String, id: EntityId },

    #[error("Domain rule violated: {violation}")]
    DomainRule { violation: DomainViolation },

    #[error("Persistence failure during {operation}: {source}")]
    Persistence {
        operation: String,
        source: PersistenceError,
    },

    #[error("No response for {correlation_id} within {timeout_ms}ms")]
    Timeout {
        correlation_id: String,
        timeout_ms: u64,
    },

    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Serialization failure: {message}")]
    Serialization { message: String },

    #[error("Command execution failed: {message}")]
    Execution { message: String },
}

/// Business rules of the school domain that commands refuse to break
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum DomainViolation {
    #[error("group {group_id} still has {students} students")]
    GroupNotEmpty { group_id: EntityId, students: usize },

    #[error("student {student_id} already attends {limit} courses")]
    StudentCourseLimitExceeded { student_id: EntityId, limit: usize },

    #[error("student {student_id} is already registered to course {course_id}")]
    StudentAlreadyRegistered {
        student_id: EntityId,
        course_id: EntityId,
    },
}

impl CommandError {
    pub fn not_registered(command_id: impl Into<String>) -> Self {
        Self::NotRegistered {
            command_id: command_id.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn not_found(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id,
        }
    }

    pub fn persistence(operation: impl Into<String>, source: PersistenceError) -> Self {
        Self::Persistence {
            operation: operation.into(),
            source,
        }
    }

    pub fn timeout(correlation_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            correlation_id: correlation_id.into(),
            timeout_ms,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Short machine-readable tag, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotRegistered { .. } => "not_registered",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::NotFound { .. } => "not_found",
            Self::DomainRule { .. } => "domain_rule",
            Self::Persistence { .. } => "persistence",
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::Serialization { .. } => "serialization",
            Self::Execution { .. } => "execution",
        }
    }

    /// Causes that stem from the caller's input rather than from execution
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameter { .. } | Self::TypeMismatch { .. }
        )
    }
}

impl From<DomainViolation> for CommandError {
    fn from(violation: DomainViolation) -> Self {
        Self::DomainRule { violation }
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<StateMachineError> for CommandError {
    fn from(err: StateMachineError) -> Self {
        Self::Execution {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn causes_survive_json() {
        let cause: CommandError = DomainViolation::GroupNotEmpty {
            group_id: 7,
            students: 3,
        }
        .into();
        let json = serde_json::to_string(&cause).unwrap();
        let back: CommandError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cause);
        assert_eq!(back.kind(), "domain_rule");
    }

    #[test]
    fn display_names_the_entity() {
        let cause = CommandError::not_found("course", 42);
        assert_eq!(cause.to_string(), "course with id 42 not found");
        assert!(!cause.is_input_error());
        assert!(CommandError::invalid_parameter("blank name").is_input_error());
    }
}
