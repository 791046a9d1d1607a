use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single command execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextState {
    /// Context created, input not yet checked
    #[default]
    Init,
    /// Input accepted, waiting for execution
    Ready,
    /// Command (or its compensation) is running
    Work,
    /// Forward execution finished with a result
    Done,
    /// Execution or compensation failed with a cause
    Fail,
    /// Execution was abandoned before it started
    Cancel,
    /// Forward effect was compensated
    Undone,
}

impl ContextState {
    /// Check if no further transitions are allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Fail | Self::Cancel | Self::Undone)
    }

    /// DONE is the only state that can be compensated
    pub fn can_undo(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "INIT"),
            Self::Ready => write!(f, "READY"),
            Self::Work => write!(f, "WORK"),
            Self::Done => write!(f, "DONE"),
            Self::Fail => write!(f, "FAIL"),
            Self::Cancel => write!(f, "CANCEL"),
            Self::Undone => write!(f, "UNDONE"),
        }
    }
}

impl std::str::FromStr for ContextState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INIT" => Ok(Self::Init),
            "READY" => Ok(Self::Ready),
            "WORK" => Ok(Self::Work),
            "DONE" => Ok(Self::Done),
            "FAIL" => Ok(Self::Fail),
            "CANCEL" => Ok(Self::Cancel),
            "UNDONE" => Ok(Self::Undone),
            _ => Err(format!("Invalid context state: {s}")),
        }
    }
}
