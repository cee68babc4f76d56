//! The aftercare orchestrator: the deterministic stage runner.
//!
//! The orchestrator enforces the workflow model for one interaction record:
//!
//!   Precondition → [Stage processor] → Fallback on failure → Store → Journal
//!
//! Every public call is a state transition `(record, request) → record`: the
//! record comes in by value and goes back out inside the result, and no state
//! is held between calls. A processor is only invoked when the record sits
//! exactly in the stage's input state. Stage failures are absorbed into
//! `StageOutcome` values; only journal faults and corrupt records surface as
//! `Err`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    execution::{JournalStep, PipelineRun, StageEntry, StageOutcome, StageRun},
    interaction::{InteractionRecord, StageOutput},
    patient::Patient,
    risk::{RiskAssessment, RiskLevel},
    stage::{Stage, WorkflowState},
    symptoms::SymptomExtraction,
};
use aftercare_verify::ensure_escalation;

use crate::{
    config::OrchestratorConfig,
    intake::fetch_with_timeout,
    traits::{
        CareInstructionGenerator, CheckInGenerator, ResponseIntake, RiskAssessor, StageJournal,
        SummaryGenerator, SymptomExtractor,
    },
};

/// One processor per pipeline stage.
pub struct StageProcessors {
    pub check_in: Box<dyn CheckInGenerator>,
    pub symptoms: Box<dyn SymptomExtractor>,
    pub risk: Box<dyn RiskAssessor>,
    pub care: Box<dyn CareInstructionGenerator>,
    pub summary: Box<dyn SummaryGenerator>,
}

/// The result of one intake round for a patient.
#[derive(Debug, Clone)]
pub struct IntakeRun {
    pub record: InteractionRecord,
    /// What happened to the inbound response itself.
    pub receipt: StageOutcome,
    /// Stages attempted after the response was recorded.
    pub steps: Vec<(Stage, StageOutcome)>,
    /// True once the intake source acknowledged `mark_processed`.
    pub marked_processed: bool,
}

/// Drives stage processors against interaction records.
///
/// Records for distinct patients or rounds share nothing but the processors,
/// which are `Send + Sync`; one orchestrator may serve many threads.
pub struct Orchestrator {
    processors: StageProcessors,
    journal: Box<dyn StageJournal>,
    intake: Option<Arc<dyn ResponseIntake>>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        processors: StageProcessors,
        journal: Box<dyn StageJournal>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            processors,
            journal,
            intake: None,
            config,
        }
    }

    /// Attach the response intake source used by `process_intake`.
    pub fn with_intake(mut self, intake: Arc<dyn ResponseIntake>) -> Self {
        self.intake = Some(intake);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Run `stage` if its output is missing and its inputs exist.
    ///
    /// - Output already present → `AlreadyComplete`, nothing runs.
    /// - Record not in the stage's input state → `PreconditionUnmet`, nothing
    ///   runs and the record is returned unchanged.
    /// - Otherwise the processor runs exactly once.
    pub fn run_stage(
        &self,
        patient: &Patient,
        record: InteractionRecord,
        stage: Stage,
    ) -> AftercareResult<StageRun> {
        let before = record.state();
        debug!(
            patient_id = %patient.id(),
            interaction_id = %record.id(),
            stage = %stage,
            state = %before,
            "stage requested"
        );

        let run = if record.has_output(stage) {
            StageRun {
                record,
                outcome: StageOutcome::AlreadyComplete,
            }
        } else if before != stage.input_state() {
            let reason = format!(
                "'{stage}' requires {} (state '{}'), record is '{before}'",
                stage.requires(),
                stage.input_state()
            );
            info!(stage = %stage, state = %before, %reason, "stage precondition unmet");
            StageRun {
                record,
                outcome: StageOutcome::PreconditionUnmet { reason },
            }
        } else {
            self.execute(patient, record, stage)?
        };

        self.journal(patient, JournalStep::Stage(stage), false, before, &run)?;
        Ok(run)
    }

    /// Clear `stage`'s output and everything downstream, then run `stage`.
    ///
    /// Only the stage's upstream inputs must exist. If the re-run itself does
    /// not complete, the record stays in the stage's input state with the
    /// downstream outputs still cleared.
    pub fn force_rerun(
        &self,
        patient: &Patient,
        mut record: InteractionRecord,
        stage: Stage,
    ) -> AftercareResult<StageRun> {
        let before = record.state();

        let run = if before < stage.input_state() {
            let reason = format!(
                "cannot re-run '{stage}': it requires {}, record is '{before}'",
                stage.requires()
            );
            StageRun {
                record,
                outcome: StageOutcome::PreconditionUnmet { reason },
            }
        } else {
            info!(
                patient_id = %patient.id(),
                interaction_id = %record.id(),
                stage = %stage,
                state = %before,
                "forced re-run, clearing stage output and downstream"
            );
            record.clear_from(stage);
            self.execute(patient, record, stage)?
        };

        self.journal(patient, JournalStep::Stage(stage), true, before, &run)?;
        Ok(run)
    }

    /// Store the patient's response, moving `CheckInSent → ResponseReceived`.
    ///
    /// Receiving the text the record already holds is `AlreadyComplete`; a
    /// different text on a record past `CheckInSent` is refused, since
    /// replacing it must be explicit (`replace_response`).
    pub fn record_response(
        &self,
        patient: &Patient,
        mut record: InteractionRecord,
        text: &str,
    ) -> AftercareResult<StageRun> {
        let before = record.state();
        let text = text.trim();

        let outcome = if text.is_empty() {
            StageOutcome::PreconditionUnmet {
                reason: "patient response text is empty".to_string(),
            }
        } else if before < WorkflowState::CheckInSent {
            StageOutcome::PreconditionUnmet {
                reason: format!("no check-in has been sent, record is '{before}'"),
            }
        } else if before > WorkflowState::CheckInSent {
            if record.patient_response() == Some(text) {
                StageOutcome::AlreadyComplete
            } else {
                StageOutcome::PreconditionUnmet {
                    reason: "record already holds a different response; replace it explicitly"
                        .to_string(),
                }
            }
        } else {
            record.receive_response(text)?;
            StageOutcome::Completed
        };

        let run = StageRun { record, outcome };
        self.journal(patient, JournalStep::ResponseReceipt, false, before, &run)?;
        Ok(run)
    }

    /// Replace the stored response, clearing every output derived from it.
    ///
    /// The record ends at `ResponseReceived`; call `process_remaining` to
    /// re-derive the downstream outputs.
    pub fn replace_response(
        &self,
        patient: &Patient,
        mut record: InteractionRecord,
        text: &str,
    ) -> AftercareResult<StageRun> {
        let before = record.state();
        let text = text.trim();

        let outcome = if text.is_empty() {
            StageOutcome::PreconditionUnmet {
                reason: "patient response text is empty".to_string(),
            }
        } else if before < WorkflowState::CheckInSent {
            StageOutcome::PreconditionUnmet {
                reason: format!("no check-in has been sent, record is '{before}'"),
            }
        } else {
            record.clear_response();
            record.receive_response(text)?;
            StageOutcome::Completed
        };

        let run = StageRun { record, outcome };
        self.journal(patient, JournalStep::ResponseReplacement, true, before, &run)?;
        Ok(run)
    }

    /// Replace a generated care text or clinic summary with a clinician's edit.
    ///
    /// The stage must already have produced its output. Editing care clears
    /// the summary derived from it, leaving the record at `CareGenerated`;
    /// High and Unknown risk care keeps an escalation directive whatever the
    /// edit says. Other stages are not editable and report `PreconditionUnmet`.
    pub fn amend_output(
        &self,
        patient: &Patient,
        mut record: InteractionRecord,
        stage: Stage,
        text: &str,
    ) -> AftercareResult<StageRun> {
        let before = record.state();
        let text = text.trim();

        let outcome = if !matches!(stage, Stage::GenerateCare | Stage::GenerateSummary) {
            StageOutcome::PreconditionUnmet {
                reason: format!("'{stage}' output cannot be edited"),
            }
        } else if text.is_empty() {
            StageOutcome::PreconditionUnmet {
                reason: format!("replacement text for '{stage}' is empty"),
            }
        } else if !record.has_output(stage) {
            StageOutcome::PreconditionUnmet {
                reason: format!("'{stage}' has no output to edit, record is '{before}'"),
            }
        } else {
            let output = match stage {
                Stage::GenerateCare => {
                    let risk = required(record.risk(), stage)?.risk_level;
                    StageOutput::Care(ensure_escalation(text, risk))
                }
                _ => StageOutput::Summary(text.to_string()),
            };
            info!(
                patient_id = %patient.id(),
                interaction_id = %record.id(),
                stage = %stage,
                state = %before,
                "clinician edit, replacing stage output"
            );
            record.clear_from(stage);
            record.apply(output)?;
            StageOutcome::Completed
        };

        let run = StageRun { record, outcome };
        self.journal(patient, JournalStep::Amendment(stage), true, before, &run)?;
        Ok(run)
    }

    /// Run every missing stage in pipeline order, stopping at the first one
    /// that does not leave its output on the record.
    ///
    /// Stages whose output already exists are skipped without being recorded
    /// in `steps`. With no new external input a second call changes nothing.
    pub fn process_remaining(
        &self,
        patient: &Patient,
        mut record: InteractionRecord,
    ) -> AftercareResult<PipelineRun> {
        let mut steps = Vec::new();

        for stage in Stage::PIPELINE {
            if record.has_output(stage) {
                continue;
            }
            let run = self.run_stage(patient, record, stage)?;
            record = run.record;
            let advanced = run.outcome.advanced();
            steps.push((stage, run.outcome));
            if !advanced {
                break;
            }
        }

        debug!(
            patient_id = %patient.id(),
            interaction_id = %record.id(),
            state = %record.state(),
            attempted = steps.len(),
            "process remaining finished"
        );
        Ok(PipelineRun { record, steps })
    }

    /// Pull the patient's latest unprocessed message from the intake source,
    /// run the pipeline, and mark the destination processed once the record
    /// reaches `SummaryGenerated`.
    ///
    /// A message that arrives while the pipeline runs keeps the destination
    /// unprocessed, so the next round picks it up.
    ///
    /// # Errors
    ///
    /// `ConfigError` if no intake source is attached; fatal journal faults.
    /// An unreachable or slow intake source is reported as `NotCompleted`.
    pub fn process_intake(
        &self,
        patient: &Patient,
        record: InteractionRecord,
    ) -> AftercareResult<IntakeRun> {
        let intake = self.intake.as_ref().ok_or_else(|| AftercareError::ConfigError {
            reason: "no response intake source configured".to_string(),
        })?;

        let not_received = |record: InteractionRecord, receipt: StageOutcome| IntakeRun {
            record,
            receipt,
            steps: Vec::new(),
            marked_processed: false,
        };

        let Some(destination) = patient.phone_number.as_deref() else {
            return Ok(not_received(
                record,
                StageOutcome::PreconditionUnmet {
                    reason: format!("patient {} has no phone number", patient.id()),
                },
            ));
        };

        let intake_record = match fetch_with_timeout(intake, destination, self.config.intake_timeout) {
            Ok(found) => found,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(destination = %destination, error = %e, "intake check failed");
                return Ok(not_received(
                    record,
                    StageOutcome::NotCompleted {
                        reason: e.to_string(),
                    },
                ));
            }
        };

        let seen = intake_record.responses.len();
        let Some(message) = intake_record.latest_unprocessed() else {
            return Ok(not_received(
                record,
                StageOutcome::PreconditionUnmet {
                    reason: format!("no unprocessed response from {destination}"),
                },
            ));
        };

        let receipt = self.record_response(patient, record, &message.message)?;
        if !receipt.outcome.advanced() {
            return Ok(not_received(receipt.record, receipt.outcome));
        }

        let pipeline = self.process_remaining(patient, receipt.record)?;

        let marked_processed = if pipeline.record.state().is_terminal() {
            match intake.mark_processed_through(destination, seen) {
                Ok(true) => true,
                Ok(false) => {
                    info!(
                        destination = %destination,
                        seen,
                        "newer message arrived during the round, destination left unprocessed"
                    );
                    false
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    // Safe to repeat: the next intake round marks it again.
                    warn!(destination = %destination, error = %e, "mark processed failed");
                    false
                }
            }
        } else {
            false
        };

        Ok(IntakeRun {
            record: pipeline.record,
            receipt: receipt.outcome,
            steps: pipeline.steps,
            marked_processed,
        })
    }

    // ── Stage execution ──────────────────────────────────────────────────────

    /// Invoke the processor for `stage` and store its output or fallback.
    ///
    /// The caller guarantees `record.state() == stage.input_state()`.
    fn execute(
        &self,
        patient: &Patient,
        mut record: InteractionRecord,
        stage: Stage,
    ) -> AftercareResult<StageRun> {
        let outcome = match stage {
            Stage::CheckIn => match self.processors.check_in.generate(patient) {
                Ok(text) => store_text(&mut record, stage, text, StageOutput::CheckIn)?,
                Err(e) => not_completed(stage, e)?,
            },

            Stage::ExtractSymptoms => {
                let response = required(record.patient_response(), stage)?.to_string();
                match self.processors.symptoms.extract(patient, &response) {
                    Ok(extraction) => {
                        let failed = extraction.is_failure();
                        record.apply(StageOutput::Symptoms(extraction))?;
                        if failed {
                            warn!(
                                patient_id = %patient.id(),
                                "symptom extraction output did not decode, parse failure recorded"
                            );
                            StageOutcome::Degraded {
                                reason: "symptom extraction output failed to parse".to_string(),
                            }
                        } else {
                            StageOutcome::Completed
                        }
                    }
                    Err(e) => not_completed(stage, e)?,
                }
            }

            Stage::AssessRisk => {
                let symptoms = required(record.extracted_symptoms(), stage)?.clone();
                let assessment = self.assess_or_fallback(patient, &symptoms)?;
                let outcome = if assessment.risk_level == RiskLevel::Unknown {
                    StageOutcome::Degraded {
                        reason: assessment.justification.clone(),
                    }
                } else {
                    StageOutcome::Completed
                };
                record.apply(StageOutput::Risk(assessment))?;
                outcome
            }

            Stage::GenerateCare => {
                let symptoms = required(record.extracted_symptoms(), stage)?;
                let risk = required(record.risk(), stage)?;
                match self.processors.care.generate(patient, symptoms, risk) {
                    Ok(text) => store_text(&mut record, stage, text, StageOutput::Care)?,
                    Err(e) => not_completed(stage, e)?,
                }
            }

            Stage::GenerateSummary => {
                let symptoms = required(record.extracted_symptoms(), stage)?;
                let risk = required(record.risk(), stage)?;
                let care = required(record.care_instructions(), stage)?;
                match self.processors.summary.summarize(patient, symptoms, risk, care) {
                    Ok(text) => store_text(&mut record, stage, text, StageOutput::Summary)?,
                    Err(e) => not_completed(stage, e)?,
                }
            }
        };

        info!(
            patient_id = %patient.id(),
            interaction_id = %record.id(),
            stage = %stage,
            outcome = outcome.label(),
            state = %record.state(),
            "stage finished"
        );
        Ok(StageRun { record, outcome })
    }

    /// Risk never blocks the pipeline: parse-failed symptoms and assessor
    /// failures both become an `Unknown` assessment naming the cause.
    fn assess_or_fallback(
        &self,
        patient: &Patient,
        symptoms: &SymptomExtraction,
    ) -> AftercareResult<RiskAssessment> {
        if let SymptomExtraction::Failed(failure) = symptoms {
            return Ok(RiskAssessment::unknown(format!(
                "symptom extraction failed ({}); risk cannot be assessed from unparsed output",
                failure.error
            )));
        }

        match self.processors.risk.assess(patient, symptoms) {
            Ok(assessment) => Ok(assessment),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(patient_id = %patient.id(), error = %e, "risk assessment failed, using Unknown");
                Ok(RiskAssessment::unknown(format!("risk assessment unavailable: {e}")))
            }
        }
    }

    /// Append the journal entry for one call, sealing on the first arrival
    /// at the terminal state.
    fn journal(
        &self,
        patient: &Patient,
        step: JournalStep,
        forced: bool,
        state_before: WorkflowState,
        run: &StageRun,
    ) -> AftercareResult<()> {
        let state_after = run.record.state();
        let entry = StageEntry {
            patient_id: patient.id().clone(),
            interaction_id: run.record.id().clone(),
            step,
            forced,
            outcome: run.outcome.clone(),
            state_before,
            state_after,
            timestamp: Utc::now(),
        };
        self.journal.append(&entry)?;

        if state_after.is_terminal() && !state_before.is_terminal() {
            self.journal.seal(run.record.id())?;
        }
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Store a free-text stage output; blank text counts as not completed.
fn store_text(
    record: &mut InteractionRecord,
    stage: Stage,
    text: String,
    wrap: fn(String) -> StageOutput,
) -> AftercareResult<StageOutcome> {
    let text = text.trim();
    if text.is_empty() {
        warn!(stage = %stage, "processor returned empty text");
        return Ok(StageOutcome::NotCompleted {
            reason: format!("'{stage}' produced no text"),
        });
    }
    record.apply(wrap(text.to_string()))?;
    Ok(StageOutcome::Completed)
}

/// Convert a processor failure into `NotCompleted`, passing fatal faults up.
fn not_completed(stage: Stage, error: AftercareError) -> AftercareResult<StageOutcome> {
    if error.is_fatal() {
        return Err(error);
    }
    warn!(stage = %stage, error = %error, "stage not completed");
    Ok(StageOutcome::NotCompleted {
        reason: error.to_string(),
    })
}

/// An input the stage's input state guarantees; absence means a corrupt record.
fn required<T>(value: Option<T>, stage: Stage) -> AftercareResult<T> {
    value.ok_or_else(|| AftercareError::StateMachineError {
        reason: format!("record is missing {} required by '{stage}'", stage.requires()),
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        thread,
        time::Duration,
    };

    use chrono::NaiveDate;

    use aftercare_contracts::{
        error::{AftercareError, AftercareResult},
        execution::{JournalStep, StageEntry, StageOutcome},
        intake::{IntakeMessage, IntakeRecord},
        interaction::{InteractionId, InteractionRecord},
        patient::Patient,
        risk::{RiskAssessment, RiskLevel},
        stage::{Stage, WorkflowState},
        symptoms::{ExtractedSymptoms, ParseFailure, Severity, SymptomExtraction},
    };

    use super::{Orchestrator, StageProcessors};
    use crate::{
        config::OrchestratorConfig,
        traits::{
            CareInstructionGenerator, CheckInGenerator, ResponseIntake, RiskAssessor,
            StageJournal, SummaryGenerator, SymptomExtractor,
        },
    };

    // ── Mock helpers ─────────────────────────────────────────────────────────

    type Calls = Arc<Mutex<u32>>;

    fn patient() -> Patient {
        Patient::new(
            "P12345",
            "John Doe",
            "Wisdom Tooth Extraction",
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            "john.doe@example.com",
            "No known allergies.",
        )
        .with_phone_number("+15551234567")
    }

    fn bleeding_symptoms() -> SymptomExtraction {
        SymptomExtraction::Parsed(ExtractedSymptoms {
            pain_level: 7,
            bleeding: Severity::Severe,
            ..ExtractedSymptoms::symptom_free()
        })
    }

    struct MockCheckIn;

    impl CheckInGenerator for MockCheckIn {
        fn generate(&self, patient: &Patient) -> AftercareResult<String> {
            Ok(format!("Hi {}, how are you feeling?", patient.name))
        }
    }

    struct MockExtractor {
        result: AftercareResult<SymptomExtraction>,
        calls: Calls,
    }

    impl SymptomExtractor for MockExtractor {
        fn extract(&self, _patient: &Patient, _response: &str) -> AftercareResult<SymptomExtraction> {
            *self.calls.lock().unwrap() += 1;
            self.result.clone()
        }
    }

    struct MockRisk {
        result: AftercareResult<RiskAssessment>,
        calls: Calls,
    }

    impl RiskAssessor for MockRisk {
        fn assess(&self, _patient: &Patient, _symptoms: &SymptomExtraction) -> AftercareResult<RiskAssessment> {
            *self.calls.lock().unwrap() += 1;
            self.result.clone()
        }
    }

    struct MockCare {
        result: AftercareResult<String>,
        calls: Calls,
    }

    impl CareInstructionGenerator for MockCare {
        fn generate(
            &self,
            _patient: &Patient,
            _symptoms: &SymptomExtraction,
            risk: &RiskAssessment,
        ) -> AftercareResult<String> {
            *self.calls.lock().unwrap() += 1;
            assert_ne!(risk.justification, "", "care always sees a justification");
            self.result.clone()
        }
    }

    struct MockSummary;

    impl SummaryGenerator for MockSummary {
        fn summarize(
            &self,
            patient: &Patient,
            _symptoms: &SymptomExtraction,
            risk: &RiskAssessment,
            _care: &str,
        ) -> AftercareResult<String> {
            Ok(format!("{}: {} risk", patient.name, risk.risk_level))
        }
    }

    /// A journal that records every call for later inspection.
    #[derive(Clone, Default)]
    struct RecordingJournal {
        entries: Arc<Mutex<Vec<StageEntry>>>,
        sealed: Arc<Mutex<Vec<InteractionId>>>,
        fail: bool,
    }

    impl StageJournal for RecordingJournal {
        fn append(&self, entry: &StageEntry) -> AftercareResult<()> {
            if self.fail {
                return Err(AftercareError::JournalWriteFailed {
                    reason: "disk full".to_string(),
                });
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }

        fn seal(&self, interaction_id: &InteractionId) -> AftercareResult<()> {
            self.sealed.lock().unwrap().push(interaction_id.clone());
            Ok(())
        }
    }

    /// Counters shared with the processors inside an orchestrator.
    struct Harness {
        orchestrator: Orchestrator,
        journal: RecordingJournal,
        extract_calls: Calls,
        risk_calls: Calls,
        care_calls: Calls,
    }

    struct Setup {
        extraction: AftercareResult<SymptomExtraction>,
        risk: AftercareResult<RiskAssessment>,
        care: AftercareResult<String>,
        journal_fails: bool,
        config: OrchestratorConfig,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                extraction: Ok(bleeding_symptoms()),
                risk: Ok(RiskAssessment::new(RiskLevel::High, "severe bleeding")),
                care: Ok("Apply gauze and call the clinic.".to_string()),
                journal_fails: false,
                config: OrchestratorConfig::default(),
            }
        }
    }

    fn harness(setup: Setup) -> Harness {
        let extract_calls = Calls::default();
        let risk_calls = Calls::default();
        let care_calls = Calls::default();
        let journal = RecordingJournal {
            fail: setup.journal_fails,
            ..RecordingJournal::default()
        };

        let processors = StageProcessors {
            check_in: Box::new(MockCheckIn),
            symptoms: Box::new(MockExtractor {
                result: setup.extraction,
                calls: Arc::clone(&extract_calls),
            }),
            risk: Box::new(MockRisk {
                result: setup.risk,
                calls: Arc::clone(&risk_calls),
            }),
            care: Box::new(MockCare {
                result: setup.care,
                calls: Arc::clone(&care_calls),
            }),
            summary: Box::new(MockSummary),
        };

        Harness {
            orchestrator: Orchestrator::new(
                processors,
                Box::new(journal.clone()),
                setup.config,
            ),
            journal,
            extract_calls,
            risk_calls,
            care_calls,
        }
    }

    /// A record that has a check-in and the given response.
    fn responded(h: &Harness, p: &Patient, text: &str) -> InteractionRecord {
        let run = h
            .orchestrator
            .run_stage(p, InteractionRecord::new(), Stage::CheckIn)
            .unwrap();
        h.orchestrator.record_response(p, run.record, text).unwrap().record
    }

    // ── Ordering ─────────────────────────────────────────────────────────────

    /// Risk assessment before symptoms exist is a reported no-op.
    #[test]
    fn test_out_of_order_stage_is_precondition_unmet() {
        let h = harness(Setup::default());
        let p = patient();
        let record = h
            .orchestrator
            .run_stage(&p, InteractionRecord::new(), Stage::CheckIn)
            .unwrap()
            .record;
        let before = record.clone();

        let run = h.orchestrator.run_stage(&p, record, Stage::AssessRisk).unwrap();

        assert!(matches!(run.outcome, StageOutcome::PreconditionUnmet { .. }));
        assert_eq!(run.record, before, "record must be unchanged");
        assert_eq!(*h.risk_calls.lock().unwrap(), 0, "assessor must not run");

        // The no-op is still journaled.
        let entries = h.journal.entries.lock().unwrap();
        let last = entries.last().unwrap();
        assert_eq!(last.step, JournalStep::Stage(Stage::AssessRisk));
        assert_eq!(last.state_before, last.state_after);
    }

    /// Extraction is unreachable before a response was received.
    #[test]
    fn test_extraction_requires_response() {
        let h = harness(Setup::default());
        let p = patient();
        let record = h
            .orchestrator
            .run_stage(&p, InteractionRecord::new(), Stage::CheckIn)
            .unwrap()
            .record;

        let run = h.orchestrator.run_stage(&p, record, Stage::ExtractSymptoms).unwrap();

        assert!(matches!(run.outcome, StageOutcome::PreconditionUnmet { .. }));
        assert_eq!(run.record.state(), WorkflowState::CheckInSent);
        assert_eq!(*h.extract_calls.lock().unwrap(), 0);
    }

    /// Running a stage whose output exists does nothing.
    #[test]
    fn test_completed_stage_is_not_rerun() {
        let h = harness(Setup::default());
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");
        let first = h.orchestrator.run_stage(&p, record, Stage::ExtractSymptoms).unwrap();
        assert_eq!(first.outcome, StageOutcome::Completed);

        let second = h
            .orchestrator
            .run_stage(&p, first.record.clone(), Stage::ExtractSymptoms)
            .unwrap();

        assert_eq!(second.outcome, StageOutcome::AlreadyComplete);
        assert_eq!(second.record, first.record);
        assert_eq!(*h.extract_calls.lock().unwrap(), 1);
    }

    // ── process_remaining ────────────────────────────────────────────────────

    #[test]
    fn test_process_remaining_runs_to_summary() {
        let h = harness(Setup::default());
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");

        let run = h.orchestrator.process_remaining(&p, record).unwrap();

        assert_eq!(run.record.state(), WorkflowState::SummaryGenerated);
        let stages: Vec<Stage> = run.steps.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            stages,
            vec![
                Stage::ExtractSymptoms,
                Stage::AssessRisk,
                Stage::GenerateCare,
                Stage::GenerateSummary
            ]
        );
        assert!(run.changed());
        assert_eq!(h.journal.sealed.lock().unwrap().as_slice(), &[run.record.id().clone()]);
    }

    /// A second call with no new input yields a byte-identical record.
    #[test]
    fn test_process_remaining_is_idempotent() {
        let h = harness(Setup::default());
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");

        let first = h.orchestrator.process_remaining(&p, record).unwrap();
        let second = h.orchestrator.process_remaining(&p, first.record.clone()).unwrap();

        assert_eq!(
            serde_json::to_vec(&first.record).unwrap(),
            serde_json::to_vec(&second.record).unwrap()
        );
        assert!(second.steps.is_empty());
        assert!(!second.changed());
        assert_eq!(*h.extract_calls.lock().unwrap(), 1);
        assert_eq!(h.journal.sealed.lock().unwrap().len(), 1, "sealed once");
    }

    /// Waiting on a response: both calls stop at extraction and agree.
    #[test]
    fn test_process_remaining_stops_at_first_unmet_precondition() {
        let h = harness(Setup::default());
        let p = patient();

        let first = h
            .orchestrator
            .process_remaining(&p, InteractionRecord::new())
            .unwrap();
        assert_eq!(first.record.state(), WorkflowState::CheckInSent);
        assert_eq!(first.steps.len(), 2);
        assert!(matches!(first.steps[1], (Stage::ExtractSymptoms, StageOutcome::PreconditionUnmet { .. })));

        let second = h.orchestrator.process_remaining(&p, first.record.clone()).unwrap();
        assert_eq!(second.record, first.record);
        assert!(!second.changed());
    }

    // ── Re-run ───────────────────────────────────────────────────────────────

    #[test]
    fn test_force_rerun_extraction_clears_downstream() {
        let h = harness(Setup {
            care: Err(AftercareError::gateway("model", "offline")),
            ..Setup::default()
        });
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");
        let record = h.orchestrator.process_remaining(&p, record).unwrap().record;
        assert_eq!(record.state(), WorkflowState::RiskAssessed);

        let run = h
            .orchestrator
            .force_rerun(&p, record, Stage::ExtractSymptoms)
            .unwrap();

        assert_eq!(run.outcome, StageOutcome::Completed);
        assert_eq!(run.record.state(), WorkflowState::SymptomsExtracted);
        assert!(run.record.risk().is_none());
        assert!(run.record.care_instructions().is_none());
        assert!(run.record.summary().is_none());
        assert_eq!(*h.extract_calls.lock().unwrap(), 2);

        let entries = h.journal.entries.lock().unwrap();
        assert!(entries.last().unwrap().forced);
    }

    #[test]
    fn test_force_rerun_after_summary_clears_everything_downstream() {
        let h = harness(Setup::default());
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");
        let record = h.orchestrator.process_remaining(&p, record).unwrap().record;

        let run = h.orchestrator.force_rerun(&p, record, Stage::AssessRisk).unwrap();

        assert_eq!(run.record.state(), WorkflowState::RiskAssessed);
        assert!(run.record.care_instructions().is_none());
        assert!(run.record.summary().is_none());
        assert_eq!(*h.risk_calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_force_rerun_without_inputs_is_precondition_unmet() {
        let h = harness(Setup::default());
        let p = patient();
        let record = InteractionRecord::new();

        let run = h
            .orchestrator
            .force_rerun(&p, record.clone(), Stage::GenerateCare)
            .unwrap();

        assert!(matches!(run.outcome, StageOutcome::PreconditionUnmet { .. }));
        assert_eq!(run.record, record);
        assert_eq!(*h.care_calls.lock().unwrap(), 0);
    }

    // ── Fallbacks ────────────────────────────────────────────────────────────

    /// Parse failure is recorded; risk degrades to Unknown; pipeline finishes.
    #[test]
    fn test_parse_failure_degrades_risk_to_unknown() {
        let h = harness(Setup {
            extraction: Ok(SymptomExtraction::Failed(ParseFailure::new("I am not JSON"))),
            ..Setup::default()
        });
        let p = patient();
        let record = responded(&h, &p, "Fine");

        let run = h.orchestrator.process_remaining(&p, record).unwrap();

        assert!(matches!(run.steps[0].1, StageOutcome::Degraded { .. }));
        assert!(matches!(run.steps[1].1, StageOutcome::Degraded { .. }));
        let risk = run.record.risk().unwrap();
        assert_eq!(risk.risk_level, RiskLevel::Unknown);
        assert!(risk.justification.contains("extraction failed"), "{}", risk.justification);
        assert_eq!(*h.risk_calls.lock().unwrap(), 0, "assessor never sees unparsed output");
        assert_eq!(run.record.state(), WorkflowState::SummaryGenerated);
    }

    /// An assessor failure is non-fatal: Unknown is recorded and care runs.
    #[test]
    fn test_risk_gateway_failure_uses_unknown_and_continues() {
        let h = harness(Setup {
            risk: Err(AftercareError::gateway("model", "connection refused")),
            ..Setup::default()
        });
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");

        let run = h.orchestrator.process_remaining(&p, record).unwrap();

        let risk = run.record.risk().unwrap();
        assert_eq!(risk.risk_level, RiskLevel::Unknown);
        assert!(risk.justification.contains("connection refused"));
        assert_eq!(run.record.state(), WorkflowState::SummaryGenerated);
        assert_eq!(*h.care_calls.lock().unwrap(), 1);
    }

    /// Care generation failing leaves the record at RiskAssessed.
    #[test]
    fn test_care_gateway_failure_is_not_completed() {
        let h = harness(Setup {
            care: Err(AftercareError::gateway("model", "timeout")),
            ..Setup::default()
        });
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");

        let run = h.orchestrator.process_remaining(&p, record).unwrap();

        let (stage, outcome) = run.steps.last().unwrap();
        assert_eq!(*stage, Stage::GenerateCare);
        assert!(matches!(outcome, StageOutcome::NotCompleted { .. }));
        assert_eq!(run.record.state(), WorkflowState::RiskAssessed);
        assert!(run.record.care_instructions().is_none());
    }

    #[test]
    fn test_blank_model_text_is_not_completed() {
        let h = harness(Setup {
            care: Ok("   ".to_string()),
            ..Setup::default()
        });
        let p = patient();
        let record = responded(&h, &p, "bleeding a lot");

        let run = h.orchestrator.process_remaining(&p, record).unwrap();

        assert!(matches!(
            run.steps.last(),
            Some((Stage::GenerateCare, StageOutcome::NotCompleted { .. }))
        ));
        assert_eq!(run.record.state(), WorkflowState::RiskAssessed);
    }

    /// A journal that cannot be written is fatal.
    #[test]
    fn test_journal_failure_is_fatal() {
        let h = harness(Setup {
            journal_fails: true,
            ..Setup::default()
        });
        let p = patient();

        let err = h
            .orchestrator
            .run_stage(&p, InteractionRecord::new(), Stage::CheckIn)
            .unwrap_err();

        assert!(matches!(err, AftercareError::JournalWriteFailed { .. }));
        assert!(err.is_fatal());
    }

    // ── Responses ────────────────────────────────────────────────────────────

    #[test]
    fn test_response_before_check_in_is_precondition_unmet() {
        let h = harness(Setup::default());
        let p = patient();
        let run = h
            .orchestrator
            .record_response(&p, InteractionRecord::new(), "Fine")
            .unwrap();
        assert!(matches!(run.outcome, StageOutcome::PreconditionUnmet { .. }));
        assert_eq!(run.record.state(), WorkflowState::New);
    }

    #[test]
    fn test_same_response_twice_is_already_complete() {
        let h = harness(Setup::default());
        let p = patient();
        let record = responded(&h, &p, "Fine");

        let again = h.orchestrator.record_response(&p, record.clone(), "Fine").unwrap();
        assert_eq!(again.outcome, StageOutcome::AlreadyComplete);

        let different = h.orchestrator.record_response(&p, record, "Not fine").unwrap();
        assert!(matches!(different.outcome, StageOutcome::PreconditionUnmet { .. }));
        assert_eq!(different.record.patient_response(), Some("Fine"));
    }

    #[test]
    fn test_replace_response_clears_analysis() {
        let h = harness(Setup::default());
        let p = patient();
        let record = responded(&h, &p, "Fine");
        let record = h.orchestrator.process_remaining(&p, record).unwrap().record;

        let run = h
            .orchestrator
            .replace_response(&p, record, "Actually bleeding a lot")
            .unwrap();

        assert_eq!(run.outcome, StageOutcome::Completed);
        assert_eq!(run.record.state(), WorkflowState::ResponseReceived);
        assert_eq!(run.record.patient_response(), Some("Actually bleeding a lot"));
        assert!(run.record.extracted_symptoms().is_none());
        assert!(run.record.summary().is_none());
    }

    // ── Clinician edits ──────────────────────────────────────────────────────

    fn completed(h: &Harness, p: &Patient) -> InteractionRecord {
        let record = responded(h, p, "Bleeding a lot");
        let record = h.orchestrator.process_remaining(p, record).unwrap().record;
        assert_eq!(record.state(), WorkflowState::SummaryGenerated);
        record
    }

    #[test]
    fn test_amend_care_clears_summary() {
        let h = harness(Setup::default());
        let p = patient();
        let record = completed(&h, &p);
        let edited = "Bite on gauze for an hour. Please call the clinic today.";

        let run = h
            .orchestrator
            .amend_output(&p, record, Stage::GenerateCare, edited)
            .unwrap();

        assert_eq!(run.outcome, StageOutcome::Completed);
        assert_eq!(run.record.state(), WorkflowState::CareGenerated);
        assert_eq!(run.record.care_instructions(), Some(edited));
        assert!(run.record.summary().is_none());
        assert!(run.record.risk().is_some());

        let last = h.journal.entries.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.step, JournalStep::Amendment(Stage::GenerateCare));
        assert!(last.forced);
        assert_eq!(last.state_before, WorkflowState::SummaryGenerated);

        let rerun = h.orchestrator.process_remaining(&p, run.record).unwrap();
        assert_eq!(rerun.steps, vec![(Stage::GenerateSummary, StageOutcome::Completed)]);
        assert_eq!(*h.care_calls.lock().unwrap(), 1);
    }

    /// An edit that talks the patient out of calling still ends escalated.
    #[test]
    fn test_amended_high_risk_care_stays_escalated() {
        let h = harness(Setup::default());
        let p = patient();
        let record = completed(&h, &p);
        let edited = "Bleeding like this is normal, there is no need to call the clinic.";

        let run = h
            .orchestrator
            .amend_output(&p, record, Stage::GenerateCare, edited)
            .unwrap();

        let care = run.record.care_instructions().unwrap();
        assert!(care.starts_with(edited));
        assert!(care.len() > edited.len());
        assert!(aftercare_verify::has_escalation(care), "{care}");
    }

    #[test]
    fn test_amend_summary_keeps_care() {
        let h = harness(Setup::default());
        let p = patient();
        let record = completed(&h, &p);
        let care = record.care_instructions().map(str::to_string);

        let run = h
            .orchestrator
            .amend_output(&p, record, Stage::GenerateSummary, "  Reviewed; call-back booked.  ")
            .unwrap();

        assert_eq!(run.outcome, StageOutcome::Completed);
        assert_eq!(run.record.state(), WorkflowState::SummaryGenerated);
        assert_eq!(run.record.summary(), Some("Reviewed; call-back booked."));
        assert_eq!(run.record.care_instructions().map(str::to_string), care);
        assert_eq!(h.journal.sealed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_amend_without_output_is_precondition_unmet() {
        let h = harness(Setup::default());
        let p = patient();

        let record = responded(&h, &p, "Fine");
        let run = h
            .orchestrator
            .amend_output(&p, record.clone(), Stage::GenerateCare, "Rest.")
            .unwrap();
        assert!(matches!(run.outcome, StageOutcome::PreconditionUnmet { .. }));
        assert_eq!(run.record, record);

        let record = completed(&h, &p);
        for (stage, text) in [(Stage::AssessRisk, "Low"), (Stage::GenerateSummary, "   ")] {
            let run = h
                .orchestrator
                .amend_output(&p, record.clone(), stage, text)
                .unwrap();
            assert!(matches!(run.outcome, StageOutcome::PreconditionUnmet { .. }), "{stage}");
            assert_eq!(run.record, record);
        }
    }

    // ── Intake ───────────────────────────────────────────────────────────────

    /// Intake that holds one message per destination and tracks processing.
    #[derive(Default)]
    struct ScriptedIntake {
        records: Mutex<std::collections::HashMap<String, IntakeRecord>>,
        marks: Mutex<u32>,
        delay: Duration,
        /// Appended to the destination right after the next fetch.
        late: Mutex<Option<String>>,
    }

    impl ScriptedIntake {
        fn with_message(destination: &str, message: &str) -> Self {
            let intake = Self::default();
            intake.records.lock().unwrap().insert(
                destination.to_string(),
                IntakeRecord {
                    processed: false,
                    responses: vec![IntakeMessage {
                        timestamp: "2026-10-19T09:00:00Z".to_string(),
                        message: message.to_string(),
                    }],
                },
            );
            intake
        }
    }

    impl ResponseIntake for ScriptedIntake {
        fn fetch(&self, destination: &str) -> AftercareResult<IntakeRecord> {
            thread::sleep(self.delay);
            let mut records = self.records.lock().unwrap();
            let snapshot = records.get(destination).cloned().unwrap_or_default();
            if let Some(message) = self.late.lock().unwrap().take() {
                if let Some(record) = records.get_mut(destination) {
                    record.responses.push(IntakeMessage {
                        timestamp: "2026-10-19T09:05:00Z".to_string(),
                        message,
                    });
                }
            }
            Ok(snapshot)
        }

        fn mark_processed(&self, destination: &str) -> AftercareResult<()> {
            *self.marks.lock().unwrap() += 1;
            if let Some(record) = self.records.lock().unwrap().get_mut(destination) {
                record.processed = true;
            }
            Ok(())
        }
    }

    fn checked_in(h: &Harness, p: &Patient) -> InteractionRecord {
        h.orchestrator
            .run_stage(p, InteractionRecord::new(), Stage::CheckIn)
            .unwrap()
            .record
    }

    #[test]
    fn test_intake_round_processes_and_marks() {
        let intake = Arc::new(ScriptedIntake::with_message("+15551234567", "bleeding a lot"));
        let mut h = harness(Setup::default());
        h.orchestrator = h.orchestrator.with_intake(intake.clone());
        let p = patient();
        let record = checked_in(&h, &p);

        let run = h.orchestrator.process_intake(&p, record).unwrap();

        assert_eq!(run.receipt, StageOutcome::Completed);
        assert_eq!(run.record.state(), WorkflowState::SummaryGenerated);
        assert_eq!(run.record.patient_response(), Some("bleeding a lot"));
        assert!(run.marked_processed);
        assert_eq!(*intake.marks.lock().unwrap(), 1);

        // Nothing new: the second round is a reported no-op.
        let again = h.orchestrator.process_intake(&p, run.record.clone()).unwrap();
        assert!(matches!(again.receipt, StageOutcome::PreconditionUnmet { .. }));
        assert_eq!(again.record, run.record);
        assert_eq!(*intake.marks.lock().unwrap(), 1);
    }

    #[test]
    fn test_message_arriving_mid_round_stays_unprocessed() {
        let intake = Arc::new(ScriptedIntake::with_message("+15551234567", "bleeding a lot"));
        *intake.late.lock().unwrap() = Some("Now my cheek is swollen too".to_string());
        let mut h = harness(Setup::default());
        h.orchestrator = h.orchestrator.with_intake(intake.clone());
        let p = patient();
        let record = checked_in(&h, &p);

        let run = h.orchestrator.process_intake(&p, record).unwrap();

        assert_eq!(run.record.state(), WorkflowState::SummaryGenerated);
        assert_eq!(run.record.patient_response(), Some("bleeding a lot"));
        assert!(!run.marked_processed);
        assert_eq!(*intake.marks.lock().unwrap(), 0);

        let held = intake.fetch("+15551234567").unwrap();
        assert!(!held.processed);
        assert_eq!(held.latest_unprocessed().unwrap().message, "Now my cheek is swollen too");
    }

    #[test]
    fn test_slow_intake_is_gateway_unavailable() {
        let intake = Arc::new(ScriptedIntake {
            delay: Duration::from_millis(500),
            ..ScriptedIntake::with_message("+15551234567", "Fine")
        });
        let mut h = harness(Setup {
            config: OrchestratorConfig::default().with_intake_timeout(Duration::from_millis(20)),
            ..Setup::default()
        });
        h.orchestrator = h.orchestrator.with_intake(intake);
        let p = patient();
        let record = checked_in(&h, &p);

        let run = h.orchestrator.process_intake(&p, record.clone()).unwrap();

        match &run.receipt {
            StageOutcome::NotCompleted { reason } => assert!(reason.contains("intake"), "{reason}"),
            other => panic!("expected NotCompleted, got {:?}", other),
        }
        assert_eq!(run.record, record);
        assert!(!run.marked_processed);
    }

    #[test]
    fn test_intake_without_source_is_config_error() {
        let h = harness(Setup::default());
        let p = patient();
        let err = h
            .orchestrator
            .process_intake(&p, InteractionRecord::new())
            .unwrap_err();
        assert!(matches!(err, AftercareError::ConfigError { .. }));
    }

    /// Distinct records can be driven from separate threads.
    #[test]
    fn test_independent_records_run_in_parallel() {
        let h = Arc::new(harness(Setup::default()));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let h = Arc::clone(&h);
                thread::spawn(move || {
                    let p = patient();
                    let record = responded(&h, &p, &format!("bleeding {i}"));
                    h.orchestrator.process_remaining(&p, record).unwrap().record
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().state(), WorkflowState::SummaryGenerated);
        }
        assert_eq!(*h.extract_calls.lock().unwrap(), 4);
    }
}
