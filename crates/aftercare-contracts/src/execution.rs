//! Stage-level results and journal entries.
//!
//! `StageRun` is what the orchestrator returns to the caller after each
//! invocation. `StageEntry` is what gets written to the stage journal, one
//! per invocation, including invocations that changed nothing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    interaction::{InteractionId, InteractionRecord},
    patient::PatientId,
    stage::{Stage, WorkflowState},
};

/// How a single stage invocation ended.
///
/// Callers pattern-match on this to explain what happened:
/// - `Completed` → the stage stored its normal output
/// - `Degraded` → the stage stored documented fallback content
/// - `AlreadyComplete` → the output already existed; nothing ran
/// - `PreconditionUnmet` → the stage was invoked out of order; nothing changed
/// - `NotCompleted` → a collaborator failed; the record is unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum StageOutcome {
    Completed,
    Degraded { reason: String },
    AlreadyComplete,
    PreconditionUnmet { reason: String },
    NotCompleted { reason: String },
}

impl StageOutcome {
    /// True if the stage's output is now present on the record.
    pub fn advanced(&self) -> bool {
        matches!(self, Self::Completed | Self::Degraded { .. } | Self::AlreadyComplete)
    }

    /// Short label for logs and journal entries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Degraded { .. } => "degraded",
            Self::AlreadyComplete => "already-complete",
            Self::PreconditionUnmet { .. } => "precondition-unmet",
            Self::NotCompleted { .. } => "not-completed",
        }
    }
}

/// The record after one orchestrator call, and what the call did.
#[derive(Debug, Clone)]
pub struct StageRun {
    pub record: InteractionRecord,
    pub outcome: StageOutcome,
}

/// Every stage attempted by one `process_remaining` call, in order.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub record: InteractionRecord,
    pub steps: Vec<(Stage, StageOutcome)>,
}

impl PipelineRun {
    /// True if at least one stage stored new output during this run.
    pub fn changed(&self) -> bool {
        self.steps
            .iter()
            .any(|(_, o)| matches!(o, StageOutcome::Completed | StageOutcome::Degraded { .. }))
    }
}

/// What a journal entry describes: a stage, receipt of a patient response,
/// or a clinician's edit of a stage's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JournalStep {
    Stage(Stage),
    ResponseReceipt,
    ResponseReplacement,
    Amendment(Stage),
}

impl std::fmt::Display for JournalStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stage(stage) => stage.fmt(f),
            Self::ResponseReceipt => f.write_str("response-receipt"),
            Self::ResponseReplacement => f.write_str("response-replacement"),
            Self::Amendment(stage) => write!(f, "amend-{stage}"),
        }
    }
}

/// An immutable record of one orchestrator invocation, written to the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    pub patient_id: PatientId,
    pub interaction_id: InteractionId,
    pub step: JournalStep,
    /// True when the caller explicitly forced a re-run or replaced content.
    pub forced: bool,
    pub outcome: StageOutcome,
    pub state_before: WorkflowState,
    pub state_after: WorkflowState,
    /// Wall-clock time the entry was created (UTC).
    pub timestamp: DateTime<Utc>,
}
