//! # aftercare-contracts
//!
//! Shared record types, stage contracts, and errors for the aftercare
//! follow-up workflow.
//!
//! All crates in the workspace import from here. No orchestration logic lives
//! in this crate; only data definitions, the record invariants, and error
//! types.

pub mod error;
pub mod execution;
pub mod intake;
pub mod interaction;
pub mod patient;
pub mod risk;
pub mod stage;
pub mod symptoms;

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use error::AftercareError;
    use interaction::{InteractionId, InteractionRecord, StageOutput};
    use patient::Patient;
    use risk::{RiskAssessment, RiskLevel};
    use stage::{Stage, WorkflowState};
    use symptoms::{ExtractedSymptoms, ParseFailure, Severity, SymptomExtraction};

    fn symptoms() -> SymptomExtraction {
        SymptomExtraction::Parsed(ExtractedSymptoms::symptom_free())
    }

    /// A record driven through every stage up to `RiskAssessed`.
    fn assessed_record() -> InteractionRecord {
        let mut record = InteractionRecord::new();
        record.apply(StageOutput::CheckIn("How are you feeling?".into())).unwrap();
        record.receive_response("Fine").unwrap();
        record.apply(StageOutput::Symptoms(symptoms())).unwrap();
        record
            .apply(StageOutput::Risk(RiskAssessment::new(RiskLevel::Low, "no symptoms")))
            .unwrap();
        record
    }

    // ── Workflow state ───────────────────────────────────────────────────────

    #[test]
    fn new_record_starts_in_new_state() {
        let record = InteractionRecord::new();
        assert_eq!(record.state(), WorkflowState::New);
        assert!(record.patient_response().is_none());
        assert!(record.extracted_symptoms().is_none());
    }

    #[test]
    fn state_follows_populated_fields() {
        let mut record = assessed_record();
        assert_eq!(record.state(), WorkflowState::RiskAssessed);

        record.apply(StageOutput::Care("Rinse gently.".into())).unwrap();
        record.apply(StageOutput::Summary("Recovering well.".into())).unwrap();
        assert_eq!(record.state(), WorkflowState::SummaryGenerated);
        assert!(record.state().is_terminal());
    }

    #[test]
    fn apply_out_of_order_is_rejected_and_leaves_record_untouched() {
        let mut record = InteractionRecord::new();
        record.apply(StageOutput::CheckIn("hello".into())).unwrap();
        let before = record.clone();

        let err = record
            .apply(StageOutput::Risk(RiskAssessment::new(RiskLevel::High, "x")))
            .unwrap_err();

        assert!(matches!(err, AftercareError::StateMachineError { .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn response_requires_check_in() {
        let mut record = InteractionRecord::new();
        assert!(record.receive_response("Fine").is_err());
        assert_eq!(record.state(), WorkflowState::New);
    }

    #[test]
    fn clear_from_symptoms_clears_every_downstream_field() {
        let mut record = assessed_record();
        record.apply(StageOutput::Care("Rinse gently.".into())).unwrap();

        record.clear_from(Stage::ExtractSymptoms);

        assert_eq!(record.state(), WorkflowState::ResponseReceived);
        assert!(record.extracted_symptoms().is_none());
        assert!(record.risk().is_none());
        assert!(record.care_instructions().is_none());
        assert!(record.summary().is_none());
        assert_eq!(record.patient_response(), Some("Fine"));
    }

    #[test]
    fn clear_response_returns_to_check_in_sent() {
        let mut record = assessed_record();
        record.clear_response();
        assert_eq!(record.state(), WorkflowState::CheckInSent);
        assert!(record.patient_response().is_none());
        assert!(record.check_in_message().is_some());
    }

    #[test]
    fn validate_detects_downstream_field_without_upstream() {
        let record = assessed_record();
        let mut value = serde_json::to_value(&record).unwrap();
        value["extracted_symptoms"] = serde_json::Value::Null;

        let corrupted: InteractionRecord = serde_json::from_value(value).unwrap();
        let err = corrupted.validate().unwrap_err();
        assert!(err.to_string().contains("risk-assessed"), "{err}");
        assert_eq!(corrupted.state(), WorkflowState::ResponseReceived);
    }

    #[test]
    fn stage_downstream_is_strictly_later() {
        let downstream: Vec<Stage> = Stage::ExtractSymptoms.downstream().collect();
        assert_eq!(
            downstream,
            vec![Stage::AssessRisk, Stage::GenerateCare, Stage::GenerateSummary]
        );
        assert_eq!(Stage::GenerateSummary.downstream().count(), 0);
    }

    #[test]
    fn stage_names_parse_back() {
        for stage in Stage::PIPELINE {
            assert_eq!(stage.to_string().parse::<Stage>().unwrap(), stage);
        }
        assert!("reticulate-splines".parse::<Stage>().is_err());
    }

    // ── Symptom wire format ──────────────────────────────────────────────────

    #[test]
    fn parse_failure_serializes_as_error_marker() {
        let failed = SymptomExtraction::Failed(ParseFailure::new("not json"));
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(value, json!({ "error": "parse failed", "raw_response": "not json" }));

        let decoded: SymptomExtraction = serde_json::from_value(value).unwrap();
        assert!(decoded.is_failure());
    }

    #[test]
    fn not_mentioned_uses_spaced_wire_value() {
        let value = serde_json::to_value(Severity::NotMentioned).unwrap();
        assert_eq!(value, json!("not mentioned"));
        assert_eq!(Severity::NotMentioned.rank(), Severity::None.rank());
        assert!(Severity::Severe.rank() > Severity::Moderate.rank());
    }

    #[test]
    fn extracted_symptoms_reject_unknown_fields() {
        let mut value = serde_json::to_value(ExtractedSymptoms::symptom_free()).unwrap();
        value["mood"] = json!("grumpy");
        assert!(serde_json::from_value::<ExtractedSymptoms>(value).is_err());
    }

    // ── Patient ──────────────────────────────────────────────────────────────

    fn patient() -> Patient {
        Patient::new(
            "P12345",
            "John Doe",
            "Wisdom Tooth Extraction",
            NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
            "john.doe@example.com",
            "No significant medical history.",
        )
    }

    #[test]
    fn latest_interaction_is_last_added() {
        let mut p = patient();
        assert!(p.latest_interaction().is_none());
        let first = p.add_interaction().id().clone();
        let second = p.add_interaction().id().clone();
        assert_ne!(first, second);
        assert_eq!(p.latest_interaction().unwrap().id(), &second);
        assert_eq!(p.interactions().len(), 2);
    }

    #[test]
    fn replace_latest_rejects_a_foreign_round() {
        let mut p = patient();
        p.add_interaction();
        let err = p.replace_latest(InteractionRecord::new()).unwrap_err();
        assert!(matches!(err, AftercareError::StateMachineError { .. }));
    }

    #[test]
    fn replace_latest_updates_in_place() {
        let mut p = patient();
        let mut record = p.add_interaction().clone();
        record.apply(StageOutput::CheckIn("hi".into())).unwrap();
        p.replace_latest(record).unwrap();
        assert_eq!(p.latest_interaction().unwrap().state(), WorkflowState::CheckInSent);
        assert_eq!(p.interactions().len(), 1);
    }

    #[test]
    fn days_since_procedure_counts_whole_days() {
        let p = patient();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(p.days_since_procedure(today), 2);
    }

    // ── Identifiers and helpers ──────────────────────────────────────────────

    #[test]
    fn interaction_id_new_produces_unique_values() {
        let unique: std::collections::HashSet<String> =
            (0..100).map(|_| InteractionId::new().to_string()).collect();
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn phone_number_validation() {
        assert!(intake::is_valid_phone_number("+15551234567"));
        assert!(!intake::is_valid_phone_number("15551234567"));
        assert!(!intake::is_valid_phone_number("+1"));
        assert!(!intake::is_valid_phone_number("+1555-123-4567"));
    }

    // ── AftercareError display messages ──────────────────────────────────────

    #[test]
    fn error_gateway_unavailable_display() {
        let err = AftercareError::gateway("model", "timed out");
        let msg = err.to_string();
        assert!(msg.contains("model"));
        assert!(msg.contains("timed out"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn error_storage_unavailable_is_fatal() {
        let err = AftercareError::StorageUnavailable {
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));
        assert!(err.is_fatal());
    }

    #[test]
    fn error_invalid_destination_display() {
        let err = AftercareError::InvalidDestination {
            destination: "555".to_string(),
        };
        assert!(err.to_string().contains("'555'"));
    }
}
