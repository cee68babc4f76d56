//! Orchestrator tuning knobs.

use std::time::Duration;

/// Settings the orchestrator reads on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Upper bound on how long a response-intake fetch may take before it is
    /// treated as `GatewayUnavailable`.
    pub intake_timeout: Duration,
}

impl OrchestratorConfig {
    pub const DEFAULT_INTAKE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn with_intake_timeout(mut self, timeout: Duration) -> Self {
        self.intake_timeout = timeout;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            intake_timeout: Self::DEFAULT_INTAKE_TIMEOUT,
        }
    }
}
