use crate::commands::CommandError;
use crate::execution::error_classifier::{ErrorCategory, ErrorClassifier, ExecutionFailure};

/// Exposes input, lookup and business-rule failures of school commands as
/// distinct failures instead of folding them into `UnableToExecute`
#[derive(Debug, Default, Clone, Copy)]
pub struct SchoolErrorClassifier;

impl ErrorClassifier for SchoolErrorClassifier {
    fn classify(&self, command_id: &str, cause: CommandError) -> ExecutionFailure {
        let command_id = command_id.to_string();
        match (ErrorCategory::of(&cause), cause) {
            (_, CommandError::DomainRule { violation }) => {
                ExecutionFailure::DomainRule { command_id, violation }
            }
            (ErrorCategory::NotRegistered, _) => ExecutionFailure::NotRegistered { command_id },
            (ErrorCategory::InvalidInput, cause) => {
                ExecutionFailure::InvalidParameter { command_id, cause }
            }
            (ErrorCategory::NotFound, cause) => ExecutionFailure::NotFound { command_id, cause },
            (ErrorCategory::Timeout, cause) => ExecutionFailure::Timeout { command_id, cause },
            (_, cause) => ExecutionFailure::UnableToExecute { command_id, cause },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::DomainViolation;

    #[test]
    fn domain_rules_keep_their_violation() {
        let violation = DomainViolation::GroupNotEmpty {
            group_id: 2,
            students: 3,
        };
        let failure = SchoolErrorClassifier.classify("group.delete", violation.clone().into());
        assert_eq!(
            failure,
            ExecutionFailure::DomainRule {
                command_id: "group.delete".to_string(),
                violation
            }
        );
    }

    #[test]
    fn input_and_lookup_failures() {
        let failure =
            SchoolErrorClassifier.classify("course.delete", CommandError::type_mismatch("id", "empty"));
        assert!(matches!(failure, ExecutionFailure::InvalidParameter { .. }));

        let failure = SchoolErrorClassifier.classify("course.delete", CommandError::not_found("course", 8));
        assert!(matches!(failure, ExecutionFailure::NotFound { .. }));

        let failure = SchoolErrorClassifier.classify(
            "course.delete",
            CommandError::execution("boom"),
        );
        assert!(matches!(failure, ExecutionFailure::UnableToExecute { .. }));
    }
}
