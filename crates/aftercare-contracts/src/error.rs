//! Error taxonomy for the aftercare workflow.
//!
//! All fallible operations in the workspace return `AftercareResult<T>`.
//! Stage-level conditions (`ParseFailure`, `GatewayUnavailable`,
//! `PreconditionUnmet`) are absorbed by the orchestrator and reported as
//! stage outcomes; only resource-level faults reach the caller as `Err`.

use thiserror::Error;

/// The unified error type for the aftercare workflow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AftercareError {
    /// Model output did not match the expected structure.
    #[error("parse failure: {reason}")]
    ParseFailure { reason: String },

    /// An upstream collaborator failed or did not answer in time.
    #[error("gateway '{gateway}' unavailable: {reason}")]
    GatewayUnavailable { gateway: String, reason: String },

    /// A stage was invoked before its required inputs exist.
    #[error("precondition unmet for stage '{stage}': {reason}")]
    PreconditionUnmet { stage: String, reason: String },

    /// A delivery target failed format validation; nothing was sent.
    #[error("invalid destination '{destination}'")]
    InvalidDestination { destination: String },

    /// The record store could not be read or written.
    ///
    /// Fatal to the process: a workflow that cannot be persisted cannot resume.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    /// The stage journal could not persist an entry.
    #[error("journal write failed: {reason}")]
    JournalWriteFailed { reason: String },

    /// A record violates the workflow invariants or a transition is illegal.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// A JSON Schema document could not be compiled.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },
}

impl AftercareError {
    /// Shorthand for a `GatewayUnavailable` error.
    pub fn gateway(gateway: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GatewayUnavailable {
            gateway: gateway.into(),
            reason: reason.into(),
        }
    }

    /// True for faults that must stop the process rather than a single stage.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. } | Self::JournalWriteFailed { .. }
        )
    }
}

/// Convenience alias used throughout the aftercare crates.
pub type AftercareResult<T> = Result<T, AftercareError>;
