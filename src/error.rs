use std::fmt;

use crate::messaging::MessagingError;

/// Engine-level failures: lifecycle, configuration and transport problems that are not
/// attached to a single execution context.
#[derive(Debug, Clone, PartialEq)]
pub enum CampusError {
    ConfigurationError(String),
    MessagingError(String),
}

impl fmt::Display for CampusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CampusError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
            CampusError::MessagingError(msg) => write!(f, "Messaging error: {msg}"),
        }
    }
}

impl std::error::Error for CampusError {}

impl From<MessagingError> for CampusError {
    fn from(err: MessagingError) -> Self {
        CampusError::MessagingError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CampusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsystem_errors_convert() {
        let error: CampusError = MessagingError::lifecycle("already running").into();
        assert!(matches!(error, CampusError::MessagingError(_)));
        assert!(error.to_string().starts_with("Messaging error"));
    }
}
