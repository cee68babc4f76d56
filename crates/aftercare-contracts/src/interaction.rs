//! One round of patient contact and the outputs each stage attached to it.
//!
//! Fields are private: the only way to populate them is `receive_response`
//! and `apply`, which refuse out-of-order writes, and the only way to clear
//! them is `clear_from` / `clear_response`, which always clear a stage's
//! output together with everything downstream. The workflow state is derived
//! from which fields are present, so it cannot drift from the data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AftercareError, AftercareResult},
    risk::RiskAssessment,
    stage::{Stage, WorkflowState},
    symptoms::SymptomExtraction,
};

/// Unique identifier for a single interaction round.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub uuid::Uuid);

impl InteractionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for InteractionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InteractionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The output a stage attaches to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutput {
    CheckIn(String),
    Symptoms(SymptomExtraction),
    Risk(RiskAssessment),
    Care(String),
    Summary(String),
}

impl StageOutput {
    /// The stage that produces this kind of output.
    pub fn stage(&self) -> Stage {
        match self {
            Self::CheckIn(_) => Stage::CheckIn,
            Self::Symptoms(_) => Stage::ExtractSymptoms,
            Self::Risk(_) => Stage::AssessRisk,
            Self::Care(_) => Stage::GenerateCare,
            Self::Summary(_) => Stage::GenerateSummary,
        }
    }
}

/// Snapshot of one follow-up round for a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    id: InteractionId,
    timestamp: DateTime<Utc>,
    check_in_message: Option<String>,
    patient_response: Option<String>,
    extracted_symptoms: Option<SymptomExtraction>,
    risk: Option<RiskAssessment>,
    care_instructions: Option<String>,
    summary: Option<String>,
}

impl InteractionRecord {
    /// Create an empty record stamped with the current time.
    pub fn new() -> Self {
        Self::created_at(Utc::now())
    }

    /// Create an empty record with an explicit creation time.
    pub fn created_at(timestamp: DateTime<Utc>) -> Self {
        Self {
            id: InteractionId::new(),
            timestamp,
            check_in_message: None,
            patient_response: None,
            extracted_symptoms: None,
            risk: None,
            care_instructions: None,
            summary: None,
        }
    }

    pub fn id(&self) -> &InteractionId {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn check_in_message(&self) -> Option<&str> {
        self.check_in_message.as_deref()
    }

    pub fn patient_response(&self) -> Option<&str> {
        self.patient_response.as_deref()
    }

    pub fn extracted_symptoms(&self) -> Option<&SymptomExtraction> {
        self.extracted_symptoms.as_ref()
    }

    pub fn risk(&self) -> Option<&RiskAssessment> {
        self.risk.as_ref()
    }

    pub fn care_instructions(&self) -> Option<&str> {
        self.care_instructions.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Presence of each field in pipeline order, paired with the state its
    /// presence establishes.
    fn presence(&self) -> [(WorkflowState, bool); 6] {
        [
            (WorkflowState::CheckInSent, self.check_in_message.is_some()),
            (WorkflowState::ResponseReceived, self.patient_response.is_some()),
            (WorkflowState::SymptomsExtracted, self.extracted_symptoms.is_some()),
            (WorkflowState::RiskAssessed, self.risk.is_some()),
            (WorkflowState::CareGenerated, self.care_instructions.is_some()),
            (WorkflowState::SummaryGenerated, self.summary.is_some()),
        ]
    }

    /// The furthest state reached through an unbroken prefix of fields.
    pub fn state(&self) -> WorkflowState {
        let mut state = WorkflowState::New;
        for (reached, present) in self.presence() {
            if !present {
                break;
            }
            state = reached;
        }
        state
    }

    /// True if `stage` has already stored its output on this record.
    pub fn has_output(&self, stage: Stage) -> bool {
        self.state() >= stage.output_state()
    }

    /// Check that no field is populated after a missing upstream field.
    ///
    /// Records built through this type's methods always pass; the check
    /// exists for records loaded from storage.
    pub fn validate(&self) -> AftercareResult<()> {
        let mut gap: Option<WorkflowState> = None;
        for (reached, present) in self.presence() {
            match (present, gap) {
                (false, None) => gap = Some(reached),
                (true, Some(missing)) => {
                    return Err(AftercareError::StateMachineError {
                        reason: format!(
                            "interaction {} holds output for '{}' but is missing '{}'",
                            self.id, reached, missing
                        ),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Store the patient's response text. Only legal at `CheckInSent`.
    pub fn receive_response(&mut self, text: impl Into<String>) -> AftercareResult<()> {
        let state = self.state();
        if state != WorkflowState::CheckInSent {
            return Err(AftercareError::StateMachineError {
                reason: format!("cannot receive a response in state '{state}'"),
            });
        }
        self.patient_response = Some(text.into());
        Ok(())
    }

    /// Store a stage's output. The record must be in the stage's input state.
    pub fn apply(&mut self, output: StageOutput) -> AftercareResult<()> {
        let stage = output.stage();
        let state = self.state();
        if state != stage.input_state() {
            return Err(AftercareError::StateMachineError {
                reason: format!(
                    "stage '{stage}' requires state '{}' but record is '{state}'",
                    stage.input_state()
                ),
            });
        }
        match output {
            StageOutput::CheckIn(text) => self.check_in_message = Some(text),
            StageOutput::Symptoms(symptoms) => self.extracted_symptoms = Some(symptoms),
            StageOutput::Risk(risk) => self.risk = Some(risk),
            StageOutput::Care(text) => self.care_instructions = Some(text),
            StageOutput::Summary(text) => self.summary = Some(text),
        }
        Ok(())
    }

    /// Clear `stage`'s output and every downstream output.
    ///
    /// Afterwards the record sits in `stage.input_state()` (or earlier, if it
    /// had not got that far).
    pub fn clear_from(&mut self, stage: Stage) {
        for cleared in std::iter::once(stage).chain(stage.downstream()) {
            match cleared {
                Stage::CheckIn => self.check_in_message = None,
                Stage::ExtractSymptoms => self.extracted_symptoms = None,
                Stage::AssessRisk => self.risk = None,
                Stage::GenerateCare => self.care_instructions = None,
                Stage::GenerateSummary => self.summary = None,
            }
        }
        if stage == Stage::CheckIn {
            self.patient_response = None;
        }
    }

    /// Clear the response and every output derived from it, returning the
    /// record to `CheckInSent`.
    pub fn clear_response(&mut self) {
        self.patient_response = None;
        self.clear_from(Stage::ExtractSymptoms);
    }
}

impl Default for InteractionRecord {
    fn default() -> Self {
        Self::new()
    }
}
