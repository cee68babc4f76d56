//! Trait definitions for the aftercare workflow.
//!
//! Two groups of traits meet at the orchestrator:
//!
//! - Collaborators, outside the core: `ModelGateway`, `DeliveryGateway`,
//!   `ResponseIntake`, `StageJournal`, `RecordStore`.
//! - Stage processors, one per pipeline stage: `CheckInGenerator`,
//!   `SymptomExtractor`, `RiskAssessor`, `CareInstructionGenerator`,
//!   `SummaryGenerator`. Each is a function of the patient and the prior
//!   stage's output; none of them touches the interaction record.

use aftercare_contracts::{
    error::AftercareResult,
    execution::StageEntry,
    intake::{IntakeRecord, SegmentId},
    interaction::InteractionId,
    patient::{Patient, PatientId},
    risk::RiskAssessment,
    symptoms::SymptomExtraction,
};

// ── Collaborators ────────────────────────────────────────────────────────────

/// A language model reached through a call-and-response interface.
pub trait ModelGateway: Send + Sync {
    /// Return the model's text for `prompt` under `system_instructions`.
    ///
    /// Fails with `AftercareError::GatewayUnavailable` on network or auth
    /// failure. Text that does not match what the caller expected is NOT a
    /// gateway error; the caller decodes and judges it.
    fn complete(&self, system_instructions: &str, prompt: &str) -> AftercareResult<String>;
}

/// Outbound patient messaging, e.g. SMS.
pub trait DeliveryGateway: Send + Sync {
    /// Send `text` and return one identifier per delivered segment.
    ///
    /// Failure is reported as an empty list; implementations never return
    /// an error past this boundary.
    fn send(&self, destination: &str, text: &str) -> Vec<SegmentId>;

    /// Return true if `destination` is well-formed for this gateway.
    fn validate_destination(&self, destination: &str) -> bool;
}

/// The inbound message source keyed by destination.
///
/// Implementations are shared with a worker thread so the orchestrator can
/// bound how long it waits for `fetch`.
pub trait ResponseIntake: Send + Sync {
    /// Everything held for `destination`. Unknown destinations yield an
    /// empty, unprocessed record.
    fn fetch(&self, destination: &str) -> AftercareResult<IntakeRecord>;

    /// Mark `destination` processed. Must be safe to call repeatedly.
    fn mark_processed(&self, destination: &str) -> AftercareResult<()>;

    /// Mark `destination` processed only while it holds at most `seen`
    /// responses. Returns `false`, leaving it unprocessed, when a message
    /// arrived after the caller's `fetch`.
    ///
    /// The default re-reads before marking, which leaves a short window
    /// between the two calls; sources that can check and mark under one lock
    /// should override it.
    fn mark_processed_through(&self, destination: &str, seen: usize) -> AftercareResult<bool> {
        if self.fetch(destination)?.responses.len() > seen {
            return Ok(false);
        }
        self.mark_processed(destination)?;
        Ok(true)
    }
}

/// The append-only record of every orchestrator invocation.
///
/// A failed write is a resource-level fault: the orchestrator returns
/// `AftercareError::JournalWriteFailed` and the caller must stop.
pub trait StageJournal: Send + Sync {
    /// Append one entry. Entries are never modified or removed.
    fn append(&self, entry: &StageEntry) -> AftercareResult<()>;

    /// Called when an interaction reaches its terminal state.
    fn seal(&self, interaction_id: &InteractionId) -> AftercareResult<()>;
}

/// Persistence for patients and their interaction history.
///
/// No storage engine is prescribed; implementations must round-trip every
/// record field and reject records that violate the workflow invariants.
pub trait RecordStore: Send + Sync {
    fn load(&self, id: &PatientId) -> AftercareResult<Option<Patient>>;

    fn save(&self, patient: &Patient) -> AftercareResult<()>;

    /// Every stored patient id, sorted.
    fn list(&self) -> AftercareResult<Vec<PatientId>>;
}

// ── Stage processors ─────────────────────────────────────────────────────────

/// Produces the follow-up message that opens a round of contact.
pub trait CheckInGenerator: Send + Sync {
    fn generate(&self, patient: &Patient) -> AftercareResult<String>;
}

/// Turns the patient's raw response into structured symptoms.
pub trait SymptomExtractor: Send + Sync {
    /// Decode failures are returned as `Ok(SymptomExtraction::Failed(..))`,
    /// never as `Err`. `Err` means the model could not be reached.
    fn extract(&self, patient: &Patient, response: &str) -> AftercareResult<SymptomExtraction>;
}

/// Maps decoded symptoms to a risk tier.
pub trait RiskAssessor: Send + Sync {
    fn assess(&self, patient: &Patient, symptoms: &SymptomExtraction) -> AftercareResult<RiskAssessment>;
}

/// Writes follow-up instructions addressed to the patient.
pub trait CareInstructionGenerator: Send + Sync {
    fn generate(
        &self,
        patient: &Patient,
        symptoms: &SymptomExtraction,
        risk: &RiskAssessment,
    ) -> AftercareResult<String>;
}

/// Writes the clinical summary addressed to clinic staff.
pub trait SummaryGenerator: Send + Sync {
    fn summarize(
        &self,
        patient: &Patient,
        symptoms: &SymptomExtraction,
        risk: &RiskAssessment,
        care_instructions: &str,
    ) -> AftercareResult<String>;
}
