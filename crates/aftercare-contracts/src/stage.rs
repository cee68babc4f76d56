//! Workflow states and the stages that move a record between them.
//!
//! A record advances strictly forward:
//!
//!   New → CheckInSent → ResponseReceived → SymptomsExtracted
//!     → RiskAssessed → CareGenerated → SummaryGenerated
//!
//! Every transition except `CheckInSent → ResponseReceived` is produced by a
//! `Stage`. The response transition is driven by external input (a typed
//! response or the intake source), not by a stage processor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of an interaction record in the follow-up workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    New,
    CheckInSent,
    ResponseReceived,
    SymptomsExtracted,
    RiskAssessed,
    CareGenerated,
    SummaryGenerated,
}

impl WorkflowState {
    /// True once every stage has produced its output.
    pub fn is_terminal(self) -> bool {
        self == Self::SummaryGenerated
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::New => "new",
            Self::CheckInSent => "check-in-sent",
            Self::ResponseReceived => "response-received",
            Self::SymptomsExtracted => "symptoms-extracted",
            Self::RiskAssessed => "risk-assessed",
            Self::CareGenerated => "care-generated",
            Self::SummaryGenerated => "summary-generated",
        };
        f.write_str(label)
    }
}

/// One processor-driven step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    CheckIn,
    ExtractSymptoms,
    AssessRisk,
    GenerateCare,
    GenerateSummary,
}

impl Stage {
    /// Every stage in fixed pipeline order.
    pub const PIPELINE: [Stage; 5] = [
        Stage::CheckIn,
        Stage::ExtractSymptoms,
        Stage::AssessRisk,
        Stage::GenerateCare,
        Stage::GenerateSummary,
    ];

    /// The state a record must be in for this stage to run.
    pub fn input_state(self) -> WorkflowState {
        match self {
            Self::CheckIn => WorkflowState::New,
            Self::ExtractSymptoms => WorkflowState::ResponseReceived,
            Self::AssessRisk => WorkflowState::SymptomsExtracted,
            Self::GenerateCare => WorkflowState::RiskAssessed,
            Self::GenerateSummary => WorkflowState::CareGenerated,
        }
    }

    /// The state a record reaches once this stage's output is stored.
    pub fn output_state(self) -> WorkflowState {
        match self {
            Self::CheckIn => WorkflowState::CheckInSent,
            Self::ExtractSymptoms => WorkflowState::SymptomsExtracted,
            Self::AssessRisk => WorkflowState::RiskAssessed,
            Self::GenerateCare => WorkflowState::CareGenerated,
            Self::GenerateSummary => WorkflowState::SummaryGenerated,
        }
    }

    /// Stages that consume this stage's output, directly or transitively.
    pub fn downstream(self) -> impl Iterator<Item = Stage> {
        Self::PIPELINE
            .into_iter()
            .filter(move |s| s.output_state() > self.output_state())
    }

    /// Human-readable description of the inputs this stage needs.
    pub fn requires(self) -> &'static str {
        match self {
            Self::CheckIn => "a fresh interaction record",
            Self::ExtractSymptoms => "a received patient response",
            Self::AssessRisk => "extracted symptoms",
            Self::GenerateCare => "a risk assessment",
            Self::GenerateSummary => "care instructions",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CheckIn => "check-in",
            Self::ExtractSymptoms => "extract-symptoms",
            Self::AssessRisk => "assess-risk",
            Self::GenerateCare => "generate-care",
            Self::GenerateSummary => "generate-summary",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PIPELINE
            .into_iter()
            .find(|stage| stage.to_string() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}
