//! Caller-facing execution result

use crate::normalize::normalize;
use crate::outcome::ExecutionOutcome;
use serde::{Deserialize, Serialize};

/// Message returned when the wall-clock bound was hit
pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

/// Message returned when the admission gate rejects a submission
pub const BUSY_MESSAGE: &str = "Sandbox is busy, try again later";

/// Result of a sandboxed code execution
///
/// Serializes as `{"status":"success","output":...}` or
/// `{"status":"error","message":...}`. Exit codes and partial output are
/// never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionResult {
    Success { output: String },
    Error { message: String },
}

impl ExecutionResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<ExecutionOutcome> for ExecutionResult {
    fn from(outcome: ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Success { stdout } => Self::Success { output: stdout },
            ExecutionOutcome::ProcessFailure { stderr, .. } => Self::error(normalize(&stderr)),
            ExecutionOutcome::TimedOut { .. } => Self::error(TIMEOUT_MESSAGE),
            ExecutionOutcome::SystemError { cause } => Self::error(cause),
        }
    }
}
