//! # Messaging Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("Correlation id already in flight: {correlation_id}")]
    DuplicateCorrelation { correlation_id: String },

    #[error("Processor is not running: {processor}")]
    ProcessorInactive { processor: String },

    #[error("Queue rejected message for {processor}: {message}")]
    QueueRejected { processor: String, message: String },

    #[error("Message serialization error: {message}")]
    MessageSerialization { message: String },

    #[error("Message deserialization error: {message}")]
    MessageDeserialization { message: String },

    #[error("Lifecycle error: {message}")]
    Lifecycle { message: String },

    #[error("Processor {processor} did not stop within {timeout_ms}ms")]
    ShutdownTimeout { processor: String, timeout_ms: u64 },
}

impl MessagingError {
    pub fn duplicate_correlation(correlation_id: impl Into<String>) -> Self {
        Self::DuplicateCorrelation {
            correlation_id: correlation_id.into(),
        }
    }

    pub fn processor_inactive(processor: impl Into<String>) -> Self {
        Self::ProcessorInactive {
            processor: processor.into(),
        }
    }

    pub fn queue_rejected(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueueRejected {
            processor: processor.into(),
            message: message.into(),
        }
    }

    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::MessageDeserialization {
                message: err.to_string(),
            }
        } else {
            Self::MessageSerialization {
                message: err.to_string(),
            }
        }
    }
}
