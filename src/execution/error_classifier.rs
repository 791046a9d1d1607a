//! # Failure Classification
//!
//! Turns the failure cause carried by a context into the failure a caller of the
//! facade sees. Each command picks its classifier, so different command sets can
//! expose different failure vocabularies.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::{CommandError, DomainViolation};

/// Broad category of a failure cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotRegistered,
    InvalidInput,
    NotFound,
    BusinessRule,
    Timeout,
    Infrastructure,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRegistered => write!(f, "not_registered"),
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::NotFound => write!(f, "not_found"),
            Self::BusinessRule => write!(f, "business_rule"),
            Self::Timeout => write!(f, "timeout"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

impl ErrorCategory {
    pub fn of(cause: &CommandError) -> Self {
        match cause {
            CommandError::NotRegistered { .. } => Self::NotRegistered,
            CommandError::InvalidParameter { .. } | CommandError::TypeMismatch { .. } => {
                Self::InvalidInput
            }
            CommandError::NotFound { .. } => Self::NotFound,
            CommandError::DomainRule { .. } => Self::BusinessRule,
            CommandError::Timeout { .. } => Self::Timeout,
            CommandError::Persistence { .. } | CommandError::Transport { .. } => {
                Self::Infrastructure
            }
            CommandError::Serialization { .. } | CommandError::Execution { .. } => Self::Internal,
        }
    }
}

/// Failure reported to facade callers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionFailure {
    #[error("Command '{command_id}' is not registered")]
    NotRegistered { command_id: String },

    #[error("Invalid parameter for '{command_id}': {cause}")]
    InvalidParameter {
        command_id: String,
        cause: CommandError,
    },

    #[error("'{command_id}' failed: {cause}")]
    NotFound {
        command_id: String,
        cause: CommandError,
    },

    #[error("'{command_id}' refused: {violation}")]
    DomainRule {
        command_id: String,
        violation: DomainViolation,
    },

    #[error("'{command_id}' timed out: {cause}")]
    Timeout {
        command_id: String,
        cause: CommandError,
    },

    #[error("Unable to execute '{command_id}': {cause}")]
    UnableToExecute {
        command_id: String,
        cause: CommandError,
    },

    #[error("'{command_id}' failed without a recorded cause")]
    ExceptionMissing { command_id: String },

    #[error("'{command_id}' produced an unexpected result: {message}")]
    UnexpectedResult { command_id: String, message: String },
}

impl ExecutionFailure {
    pub fn command_id(&self) -> &str {
        match self {
            Self::NotRegistered { command_id }
            | Self::InvalidParameter { command_id, .. }
            | Self::NotFound { command_id, .. }
            | Self::DomainRule { command_id, .. }
            | Self::Timeout { command_id, .. }
            | Self::UnableToExecute { command_id, .. }
            | Self::ExceptionMissing { command_id }
            | Self::UnexpectedResult { command_id, .. } => command_id,
        }
    }

    /// Underlying cause, when one was recorded
    pub fn cause(&self) -> Option<&CommandError> {
        match self {
            Self::InvalidParameter { cause, .. }
            | Self::NotFound { cause, .. }
            | Self::Timeout { cause, .. }
            | Self::UnableToExecute { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

/// Strategy mapping a failure cause onto an [`ExecutionFailure`]
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, command_id: &str, cause: CommandError) -> ExecutionFailure;
}

/// Reports registry and timeout failures as such and everything else as
/// `UnableToExecute`
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardErrorClassifier;

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(&self, command_id: &str, cause: CommandError) -> ExecutionFailure {
        let command_id = command_id.to_string();
        match ErrorCategory::of(&cause) {
            ErrorCategory::NotRegistered => ExecutionFailure::NotRegistered { command_id },
            ErrorCategory::Timeout => ExecutionFailure::Timeout { command_id, cause },
            _ => ExecutionFailure::UnableToExecute { command_id, cause },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_classifier_keeps_timeouts_apart() {
        let classifier = StandardErrorClassifier;
        let failure = classifier.classify("course.delete", CommandError::timeout("abc", 400));
        assert!(matches!(failure, ExecutionFailure::Timeout { .. }));
        assert_eq!(failure.command_id(), "course.delete");

        let failure = classifier.classify("course.delete", CommandError::not_found("course", 1));
        assert!(matches!(failure, ExecutionFailure::UnableToExecute { .. }));
        assert_eq!(failure.cause(), Some(&CommandError::not_found("course", 1)));
    }

    #[test]
    fn categories() {
        assert_eq!(
            ErrorCategory::of(&CommandError::invalid_parameter("x")),
            ErrorCategory::InvalidInput
        );
        assert_eq!(
            ErrorCategory::of(&CommandError::transport("closed")),
            ErrorCategory::Infrastructure
        );
        assert_eq!(ErrorCategory::BusinessRule.to_string(), "business_rule");
    }
}
