//! Scenario C: the model answers the extraction prompt in prose.
//!
//! The decoder keeps the text verbatim as a parse failure, risk falls back
//! to Unknown with a justification naming the failure, and the round still
//! reaches a clinic summary that asks for manual review. Once the model
//! behaves again, a forced re-run of extraction clears everything downstream
//! and the pipeline re-derives it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use aftercare_contracts::{
    error::AftercareResult,
    interaction::InteractionRecord,
    stage::Stage,
};
use aftercare_core::traits::ModelGateway;

use super::{print_record, print_step, Harness};
use crate::{
    mock_data::MIXED_RECOVERY_REPLY,
    offline_model::OfflineModel,
    prompts::{task_of, PromptTask},
};

pub const GARBLED_EXTRACTION: &str =
    "The patient seems to be recovering, with some pain and a little swelling. Nothing urgent.";

/// Answers extraction prompts with prose while `garbled` is set; every other
/// prompt goes to the offline model.
pub struct GarbledModel {
    garbled: Arc<AtomicBool>,
}

impl GarbledModel {
    pub fn new(garbled: Arc<AtomicBool>) -> Self {
        Self { garbled }
    }
}

impl ModelGateway for GarbledModel {
    fn complete(&self, system_instructions: &str, prompt: &str) -> AftercareResult<String> {
        if self.garbled.load(Ordering::SeqCst) && task_of(prompt) == Some(PromptTask::SymptomExtraction) {
            return Ok(GARBLED_EXTRACTION.to_string());
        }
        OfflineModel.complete(system_instructions, prompt)
    }
}

/// The degraded round, then the recovered one.
pub fn walk(
    harness: &mut Harness,
    garbled: &AtomicBool,
) -> AftercareResult<(InteractionRecord, InteractionRecord)> {
    let record = harness.start_round()?;
    let degraded = harness.respond(record, MIXED_RECOVERY_REPLY)?;

    garbled.store(false, Ordering::SeqCst);
    println!("  -- model recovered, forcing symptom extraction again --");

    let rerun = harness
        .orchestrator
        .force_rerun(&harness.patient, degraded.clone(), Stage::ExtractSymptoms)?;
    print_step("extract-symptoms", &rerun.outcome);
    let run = harness.orchestrator.process_remaining(&harness.patient, rerun.record)?;
    for (stage, outcome) in &run.steps {
        print_step(&stage.to_string(), outcome);
    }
    harness.patient.replace_latest(run.record.clone())?;
    Ok((degraded, run.record))
}

pub fn run_scenario() -> AftercareResult<()> {
    println!("=== Scenario C: Malformed model output ===");
    println!();

    let garbled = Arc::new(AtomicBool::new(true));
    let mut harness = Harness::with_model(Arc::new(GarbledModel::new(Arc::clone(&garbled))))?;
    let (degraded, recovered) = walk(&mut harness, &garbled)?;

    println!();
    println!("  Degraded round:");
    print_record(&degraded);
    println!();
    println!("  After re-run:");
    print_record(&recovered);
    println!();
    harness.print_journal(&recovered);
    println!();
    println!("  Scenario C complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicBool, Arc};

    use aftercare_contracts::{
        execution::{JournalStep, StageOutcome},
        risk::RiskLevel,
        stage::{Stage, WorkflowState},
        symptoms::{ParseFailure, SymptomExtraction},
    };
    use aftercare_verify::has_escalation;

    use super::{walk, GarbledModel, GARBLED_EXTRACTION};
    use crate::scenarios::Harness;

    fn harness() -> (Harness, Arc<AtomicBool>) {
        let garbled = Arc::new(AtomicBool::new(true));
        let harness = Harness::with_model(Arc::new(GarbledModel::new(Arc::clone(&garbled)))).unwrap();
        (harness, garbled)
    }

    #[test]
    fn test_prose_is_kept_verbatim_and_risk_is_unknown() {
        let (mut harness, garbled) = harness();
        let (degraded, _) = walk(&mut harness, &garbled).unwrap();

        assert_eq!(
            degraded.extracted_symptoms(),
            Some(&SymptomExtraction::Failed(ParseFailure::new(GARBLED_EXTRACTION)))
        );
        let risk = degraded.risk().unwrap();
        assert_eq!(risk.risk_level, RiskLevel::Unknown);
        assert!(risk.justification.contains("extraction failed"), "{}", risk.justification);

        assert_eq!(degraded.state(), WorkflowState::SummaryGenerated);
        assert!(has_escalation(degraded.care_instructions().unwrap()));
        assert!(degraded.summary().unwrap().contains("manual"));
    }

    #[test]
    fn test_risk_stage_is_journalled_as_degraded() {
        let (mut harness, garbled) = harness();
        let (degraded, _) = walk(&mut harness, &garbled).unwrap();

        let log = harness.journal.export_log();
        let risk_entry = log
            .entries_for(degraded.id())
            .into_iter()
            .find(|e| e.step == JournalStep::Stage(Stage::AssessRisk))
            .unwrap();
        match &risk_entry.outcome {
            StageOutcome::Degraded { reason } => assert!(reason.contains("extraction failed"), "{reason}"),
            other => panic!("expected Degraded, got {:?}", other),
        }
    }

    #[test]
    fn test_forced_rerun_rederives_downstream() {
        let (mut harness, garbled) = harness();
        let (degraded, recovered) = walk(&mut harness, &garbled).unwrap();

        assert_eq!(degraded.id(), recovered.id());
        assert!(recovered.extracted_symptoms().unwrap().parsed().is_some());
        assert_eq!(recovered.risk().unwrap().risk_level, RiskLevel::Medium);
        assert_ne!(recovered.summary(), degraded.summary());
        assert_eq!(recovered.patient_response(), degraded.patient_response());

        let forced: Vec<_> = harness
            .journal
            .export_log()
            .entries_for(recovered.id())
            .into_iter()
            .filter(|e| e.forced)
            .map(|e| e.step.clone())
            .collect();
        assert_eq!(forced, vec![JournalStep::Stage(Stage::ExtractSymptoms)]);
    }
}
