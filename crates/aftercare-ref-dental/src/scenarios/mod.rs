//! Runnable dental follow-up scenarios.
//!
//! Each scenario wires the real components (orchestrator, rule table,
//! decoder, hash-chained journal) around the offline model and the sample
//! patient, then prints what every stage did.

pub mod fine_response;
pub mod intake_round;
pub mod invalid_destination;
pub mod malformed_output;
pub mod severe_bleeding;

use std::sync::Arc;

use chrono::Local;

use aftercare_audit::InMemoryStageJournal;
use aftercare_contracts::{
    error::AftercareResult,
    execution::StageOutcome,
    interaction::InteractionRecord,
    patient::Patient,
    stage::Stage,
    symptoms::SymptomExtraction,
};
use aftercare_core::{
    config::OrchestratorConfig,
    traits::{ModelGateway, ResponseIntake},
    Orchestrator,
};
use aftercare_policy::TomlRiskRules;

use crate::{mock_data::sample_patient, offline_model::OfflineModel, processors::dental_processors};

/// Every scenario, in the order `run_all` plays them.
pub const NAMES: [&str; 5] = [
    "fine-response",
    "severe-bleeding",
    "malformed-output",
    "invalid-destination",
    "intake-round",
];

/// Play one scenario by name. Returns `None` for an unknown name.
pub fn run_named(name: &str) -> Option<AftercareResult<()>> {
    let result = match name {
        "fine-response" => fine_response::run_scenario(),
        "severe-bleeding" => severe_bleeding::run_scenario(),
        "malformed-output" => malformed_output::run_scenario(),
        "invalid-destination" => invalid_destination::run_scenario(),
        "intake-round" => intake_round::run_scenario(),
        _ => return None,
    };
    Some(result)
}

/// Play every scenario, stopping at the first error.
pub fn run_all() -> AftercareResult<()> {
    fine_response::run_scenario()?;
    severe_bleeding::run_scenario()?;
    malformed_output::run_scenario()?;
    invalid_destination::run_scenario()?;
    intake_round::run_scenario()
}

// ── Harness ───────────────────────────────────────────────────────────────────

/// One patient, one orchestrator, one in-memory journal.
///
/// The journal is cloned into the orchestrator; both handles share the same
/// chain, so this one can verify and export it afterwards.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub journal: InMemoryStageJournal,
    pub patient: Patient,
}

impl Harness {
    pub fn offline() -> AftercareResult<Self> {
        Self::with_model(Arc::new(OfflineModel))
    }

    pub fn with_model(model: Arc<dyn ModelGateway>) -> AftercareResult<Self> {
        let journal = InMemoryStageJournal::new(format!("scenario-{}", uuid::Uuid::new_v4()));
        let processors = dental_processors(model, TomlRiskRules::default_dental()?)?;
        let orchestrator = Orchestrator::new(
            processors,
            Box::new(journal.clone()),
            OrchestratorConfig::default(),
        );
        Ok(Self {
            orchestrator,
            journal,
            patient: sample_patient(Local::now().date_naive()),
        })
    }

    pub fn with_intake(self, intake: Arc<dyn ResponseIntake>) -> Self {
        Self {
            orchestrator: self.orchestrator.with_intake(intake),
            ..self
        }
    }

    /// Open a new round for the patient and send the check-in.
    pub fn start_round(&mut self) -> AftercareResult<InteractionRecord> {
        let record = self.patient.add_interaction().clone();
        let run = self.orchestrator.run_stage(&self.patient, record, Stage::CheckIn)?;
        print_step("check-in", &run.outcome);
        self.patient.replace_latest(run.record.clone())?;
        Ok(run.record)
    }

    /// Record `reply` and run every remaining stage.
    pub fn respond(&mut self, record: InteractionRecord, reply: &str) -> AftercareResult<InteractionRecord> {
        println!("  Patient reply: \"{reply}\"");
        let receipt = self.orchestrator.record_response(&self.patient, record, reply)?;
        print_step("response", &receipt.outcome);

        let run = self.orchestrator.process_remaining(&self.patient, receipt.record)?;
        for (stage, outcome) in &run.steps {
            print_step(&stage.to_string(), outcome);
        }
        self.patient.replace_latest(run.record.clone())?;
        Ok(run.record)
    }

    pub fn print_journal(&self, record: &InteractionRecord) {
        let log = self.journal.export_log();
        println!(
            "  Journal integrity:  {} ({} event(s), round {})",
            if self.journal.verify_integrity() { "VERIFIED" } else { "FAILED" },
            log.events.len(),
            if log.is_sealed(record.id()) { "sealed" } else { "open" },
        );
    }
}

// ── Printing ──────────────────────────────────────────────────────────────────

pub fn print_step(label: &str, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Completed | StageOutcome::AlreadyComplete => {
            println!("  {:<20} {}", label, outcome.label())
        }
        StageOutcome::Degraded { reason }
        | StageOutcome::PreconditionUnmet { reason }
        | StageOutcome::NotCompleted { reason } => {
            println!("  {:<20} {}: {}", label, outcome.label(), reason)
        }
    }
}

pub fn print_record(record: &InteractionRecord) {
    println!("  State:              {}", record.state());
    if let Some(message) = record.check_in_message() {
        println!("  Check-in:           {message}");
    }
    if let Some(response) = record.patient_response() {
        println!("  Response:           {response}");
    }
    match record.extracted_symptoms() {
        Some(SymptomExtraction::Parsed(s)) => println!(
            "  Symptoms:           pain {}/10, bleeding {}, swelling {}, fever {}, sentiment {}",
            s.pain_level,
            s.bleeding,
            s.swelling,
            if s.fever { "yes" } else { "no" },
            s.overall_sentiment
        ),
        Some(SymptomExtraction::Failed(failure)) => println!(
            "  Symptoms:           {} (raw: {:?})",
            failure.error, failure.raw_response
        ),
        None => {}
    }
    if let Some(risk) = record.risk() {
        println!("  Risk:               {} ({})", risk.risk_level, risk.justification);
    }
    if let Some(care) = record.care_instructions() {
        println!("  Care instructions:");
        for line in care.lines() {
            println!("    {line}");
        }
    }
    if let Some(summary) = record.summary() {
        println!("  Clinic summary:");
        for line in summary.lines() {
            println!("    {line}");
        }
    }
}
