//! The `execute` operation: screen, admit, run, build the result

use crate::gate::{ConcurrencyGate, GateStatus};
use crate::result::{BUSY_MESSAGE, ExecutionResult};
use crate::sandbox::Sandbox;
use crate::screen::{Screener, ScreeningVerdict};
use crate::{Result, SandboxConfig, SandpitError};
use tracing::Instrument;
use uuid::Uuid;

/// Front door of the execution core. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct Executor {
    screener: Screener,
    gate: ConcurrencyGate,
    sandbox: Sandbox,
}

impl Executor {
    pub fn new(config: SandboxConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            screener: Screener::new(config.denylist.iter().cloned()),
            gate: ConcurrencyGate::new(config.max_concurrent, config.max_queued),
            sandbox: Sandbox::new(config),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &SandboxConfig {
        self.sandbox.config()
    }

    /// Run one submission end to end. Every failure, including rejection
    /// before anything is spawned, comes back as [`ExecutionResult::Error`].
    pub async fn execute(&self, code: &str) -> ExecutionResult {
        let span = tracing::info_span!("submission", submission_id = %Uuid::new_v4());
        self.execute_inner(code).instrument(span).await
    }

    async fn execute_inner(&self, code: &str) -> ExecutionResult {
        let max = self.config().max_code_bytes;
        if code.len() > max {
            tracing::info!(code_len = code.len(), max, "submission rejected: too large");
            return ExecutionResult::error(format!(
                "Submission too large: {} bytes (limit {max})",
                code.len()
            ));
        }

        let verdict = self.screener.screen(code);
        if !verdict.is_safe() {
            let violations = verdict.describe();
            tracing::info!(%violations, "submission rejected by screener");
            return ExecutionResult::error(format!("Disallowed import: {violations}"));
        }

        let _admission = match self.gate.admit().await {
            Ok(admission) => admission,
            Err(SandpitError::Overloaded { queued }) => {
                tracing::warn!(queued, "submission rejected: sandbox overloaded");
                return ExecutionResult::error(BUSY_MESSAGE);
            }
            Err(e) => {
                tracing::warn!(error = %e, "submission not admitted");
                return ExecutionResult::error(BUSY_MESSAGE);
            }
        };

        let outcome = self.sandbox.run(code).await;
        tracing::info!(outcome = outcome.kind(), "submission executed");
        outcome.into()
    }

    /// Screening verdict alone, without running anything
    #[must_use]
    pub fn screen(&self, code: &str) -> ScreeningVerdict {
        self.screener.screen(code)
    }

    #[must_use]
    pub fn status(&self) -> GateStatus {
        self.gate.status()
    }

    /// Stop admitting new submissions. Running ones finish normally.
    pub fn shutdown(&self) {
        self.gate.close();
    }
}
