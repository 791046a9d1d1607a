//! # Command Messages
//!
//! Envelope carrying an execution context to a command worker and back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use super::errors::MessagingError;
use crate::constants::messaging::{LAST_MESSAGE_COMMAND_ID, LAST_MESSAGE_CORRELATION_ID};
use crate::context::{ExecutionContext, Input};

/// Which half of a command a message asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Do,
    Undo,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Do => write!(f, "DO"),
            Self::Undo => write!(f, "UNDO"),
        }
    }
}

/// Message exchanged between callers and command workers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    /// Pairs a response with the request that caused it
    pub correlation_id: String,
    pub direction: Direction,
    pub context: ExecutionContext,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CommandMessage {
    pub fn new(direction: Direction, context: ExecutionContext) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            direction,
            context,
            created_at: Utc::now(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Response to this message carrying the processed context
    pub fn respond_with(&self, context: ExecutionContext) -> Self {
        Self {
            correlation_id: self.correlation_id.clone(),
            direction: self.direction,
            context,
            created_at: Utc::now(),
        }
    }

    pub fn command_id(&self) -> &str {
        self.context.command_id()
    }

    /// Sentinel telling the processors to stop
    pub fn last_message() -> Self {
        Self::new(Direction::Do, ExecutionContext::new(LAST_MESSAGE_COMMAND_ID, Input::Empty))
            .with_correlation_id(LAST_MESSAGE_CORRELATION_ID)
    }

    pub fn is_last_message(&self) -> bool {
        self.correlation_id == LAST_MESSAGE_CORRELATION_ID
    }

    /// Placeholder produced when an incoming message cannot be decoded
    pub fn empty() -> Self {
        Self::new(Direction::Do, ExecutionContext::new("", Input::Empty)).with_correlation_id("")
    }

    pub fn is_empty(&self) -> bool {
        self.correlation_id.is_empty() || self.context.command_id().is_empty()
    }

    pub fn into_context(self) -> ExecutionContext {
        self.context
    }

    pub fn to_json(&self) -> Result<String, MessagingError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a message; malformed text yields the empty message
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, "Unable to decode command message, substituting empty message");
                Self::empty()
            }
        }
    }
}

/// What travels over the processor queues
#[derive(Debug, Clone)]
pub enum TransportFrame {
    Message(Box<CommandMessage>),
    /// JSON text of a [`CommandMessage`]
    Encoded(String),
}

impl TransportFrame {
    /// Wrap `message`, encoding it as JSON when `encode` is set.
    ///
    /// A message that cannot be encoded is passed through as a value.
    pub fn pack(message: CommandMessage, encode: bool) -> Self {
        if encode {
            match message.to_json() {
                Ok(json) => return Self::Encoded(json),
                Err(err) => warn!(
                    correlation_id = %message.correlation_id,
                    error = %err,
                    "Unable to encode command message, sending it unencoded"
                ),
            }
        }
        Self::Message(Box::new(message))
    }

    pub fn unpack(self) -> CommandMessage {
        match self {
            Self::Message(message) => *message,
            Self::Encoded(json) => CommandMessage::from_json(&json),
        }
    }
}
