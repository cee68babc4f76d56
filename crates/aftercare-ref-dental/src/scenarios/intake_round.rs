//! Intake round: the reply arrives through the SMS inbox.
//!
//! The orchestrator fetches the patient's inbox entry with a bounded wait,
//! records the latest unprocessed message, runs the pipeline and marks the
//! entry processed. A second round finds nothing new and changes nothing.

use std::sync::Arc;

use aftercare_contracts::{error::AftercareResult, interaction::InteractionRecord};
use aftercare_core::IntakeRun;

use super::{print_record, print_step, Harness};
use crate::{
    inbox::ScriptedIntake,
    mock_data::{MIXED_RECOVERY_REPLY, SAMPLE_PHONE},
};

fn print_run(run: &IntakeRun) {
    print_step("intake", &run.receipt);
    for (stage, outcome) in &run.steps {
        print_step(&stage.to_string(), outcome);
    }
    println!("  Marked processed:   {}", run.marked_processed);
}

/// Two intake rounds against the same inbox.
pub fn walk(harness: &mut Harness) -> AftercareResult<(IntakeRun, IntakeRun)> {
    let record: InteractionRecord = harness.start_round()?;

    let first = harness.orchestrator.process_intake(&harness.patient, record)?;
    print_run(&first);
    harness.patient.replace_latest(first.record.clone())?;

    println!("  -- second round --");
    let second = harness
        .orchestrator
        .process_intake(&harness.patient, first.record.clone())?;
    print_run(&second);
    Ok((first, second))
}

pub fn harness_with_reply(reply: &str) -> AftercareResult<Harness> {
    let intake = ScriptedIntake::new();
    intake.push(SAMPLE_PHONE, reply);
    Ok(Harness::offline()?.with_intake(Arc::new(intake)))
}

pub fn run_scenario() -> AftercareResult<()> {
    println!("=== Intake round ===");
    println!();

    let mut harness = harness_with_reply(MIXED_RECOVERY_REPLY)?;
    let (first, _) = walk(&mut harness)?;

    println!();
    print_record(&first.record);
    println!();
    harness.print_journal(&first.record);
    println!();
    println!("  Intake round complete.");
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use aftercare_contracts::{
        execution::StageOutcome,
        risk::RiskLevel,
        stage::WorkflowState,
        symptoms::Severity,
    };

    use super::{harness_with_reply, walk};
    use crate::mock_data::MIXED_RECOVERY_REPLY;

    #[test]
    fn test_inbox_reply_runs_to_summary_and_is_marked() {
        let mut harness = harness_with_reply(MIXED_RECOVERY_REPLY).unwrap();
        let (first, _) = walk(&mut harness).unwrap();

        assert_eq!(first.receipt, StageOutcome::Completed);
        assert_eq!(first.steps.len(), 4);
        assert!(first.marked_processed);
        assert_eq!(first.record.state(), WorkflowState::SummaryGenerated);

        let symptoms = first.record.extracted_symptoms().unwrap().parsed().unwrap();
        assert_eq!(symptoms.pain_level, 6);
        assert_eq!(symptoms.bleeding, Severity::Mild);
        assert_eq!(symptoms.swelling, Severity::Moderate);
        assert_eq!(first.record.risk().unwrap().risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_second_round_changes_nothing() {
        let mut harness = harness_with_reply(MIXED_RECOVERY_REPLY).unwrap();
        let (first, second) = walk(&mut harness).unwrap();

        assert!(matches!(second.receipt, StageOutcome::PreconditionUnmet { .. }));
        assert!(second.steps.is_empty());
        assert!(!second.marked_processed);
        assert_eq!(second.record, first.record);
    }
}
