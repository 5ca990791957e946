//! Raw outcome of running one submission

use std::time::Duration;

/// What happened to a single child process. Produced once per submission by
/// [`crate::sandbox::Sandbox::run`] and consumed by the result builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit code zero
    Success { stdout: String },

    /// Non-zero exit code (`128 + signal` when killed by a signal)
    ProcessFailure { stderr: String, exit_code: i32 },

    /// Wall-clock bound exceeded; the process group was killed
    TimedOut { after: Duration },

    /// Scratch unit or launch failure; nothing was retried
    SystemError { cause: String },
}

impl ExecutionOutcome {
    /// Short label for logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::ProcessFailure { .. } => "process_failure",
            Self::TimedOut { .. } => "timed_out",
            Self::SystemError { .. } => "system_error",
        }
    }
}
