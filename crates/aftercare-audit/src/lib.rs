//! # aftercare-audit
//!
//! Append-only, SHA-256 hash-chained stage journals.
//!
//! ## Overview
//!
//! Every orchestrator invocation is wrapped in a `JournalEvent` that links
//! to the previous event via its SHA-256 hash. Tampering with any event,
//! even a single byte, breaks the chain and is detected by `verify_chain`.
//! When an interaction reaches its terminal state a seal event is chained
//! after its last stage entry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aftercare_audit::InMemoryStageJournal;
//!
//! let journal = InMemoryStageJournal::new("clinic-journal");
//! let orchestrator = Orchestrator::new(processors, Box::new(journal.clone()), config);
//! // ...
//! assert!(journal.verify_integrity());
//! ```

pub mod chain;
pub mod event;
pub mod file;
pub mod memory;

pub use chain::{hash_event, verify_chain};
pub use event::{JournalEvent, JournalLog, JournalRecord};
pub use file::FileStageJournal;
pub use memory::InMemoryStageJournal;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use aftercare_contracts::{
        execution::{JournalStep, StageEntry, StageOutcome},
        interaction::InteractionId,
        patient::PatientId,
        stage::{Stage, WorkflowState},
    };
    use aftercare_core::traits::StageJournal;

    use super::{FileStageJournal, InMemoryStageJournal, JournalEvent, JournalRecord};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn entry(interaction: &InteractionId, stage: Stage) -> StageEntry {
        StageEntry {
            patient_id: PatientId("P12345".to_string()),
            interaction_id: interaction.clone(),
            step: JournalStep::Stage(stage),
            forced: false,
            outcome: StageOutcome::Completed,
            state_before: stage.input_state(),
            state_after: stage.output_state(),
            timestamp: Utc::now(),
        }
    }

    fn three_entries(journal: &dyn StageJournal, interaction: &InteractionId) {
        for stage in [Stage::CheckIn, Stage::ExtractSymptoms, Stage::AssessRisk] {
            journal.append(&entry(interaction, stage)).unwrap();
        }
    }

    // ── In-memory ─────────────────────────────────────────────────────────────

    #[test]
    fn test_hash_chain_integrity() {
        let journal = InMemoryStageJournal::new("journal-integrity");
        three_entries(&journal, &InteractionId::new());
        assert!(journal.verify_integrity(), "chain must be valid after sequential writes");
    }

    /// Mutating any stored entry breaks the chain.
    #[test]
    fn test_tamper_detection() {
        let journal = InMemoryStageJournal::new("journal-tamper");
        three_entries(&journal, &InteractionId::new());

        {
            let mut state = journal.state.lock().unwrap();
            if let JournalRecord::Stage(entry) = &mut state.events[0].record {
                entry.outcome = StageOutcome::Degraded {
                    reason: "TAMPERED".to_string(),
                };
            }
        }

        assert!(!journal.verify_integrity(), "chain must detect tampering with a stored event");
    }

    #[test]
    fn test_genesis_hash_and_sequence() {
        let journal = InMemoryStageJournal::new("journal-genesis");
        three_entries(&journal, &InteractionId::new());

        let log = journal.export_log();
        assert_eq!(log.events[0].prev_hash, JournalEvent::GENESIS_HASH);
        for (idx, event) in log.events.iter().enumerate() {
            assert_eq!(event.sequence, idx as u64);
        }
        assert_eq!(log.terminal_hash, log.events.last().unwrap().this_hash);
    }

    #[test]
    fn test_seal_is_chained_and_queryable() {
        let journal = InMemoryStageJournal::new("journal-seal");
        let sealed = InteractionId::new();
        let open = InteractionId::new();
        three_entries(&journal, &sealed);
        journal.append(&entry(&open, Stage::CheckIn)).unwrap();
        journal.seal(&sealed).unwrap();

        let log = journal.export_log();
        assert!(log.is_sealed(&sealed));
        assert!(!log.is_sealed(&open));
        assert_eq!(log.entries_for(&sealed).len(), 3);
        assert_eq!(log.entries_for(&open).len(), 1);
        assert!(super::verify_chain(&log.events));
    }

    #[test]
    fn test_verify_empty() {
        let journal = InMemoryStageJournal::new("journal-empty");
        assert!(journal.verify_integrity());
        assert!(super::verify_chain(&[]));
        assert_eq!(journal.export_log().terminal_hash, "");
    }

    /// A dropped event leaves a sequence gap and a broken link.
    #[test]
    fn test_removed_event_is_detected() {
        let journal = InMemoryStageJournal::new("journal-gap");
        three_entries(&journal, &InteractionId::new());
        let mut log = journal.export_log();
        log.events.remove(1);
        assert!(!super::verify_chain(&log.events));
    }

    // ── File-backed ───────────────────────────────────────────────────────────

    #[test]
    fn test_file_journal_resumes_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        let interaction = InteractionId::new();

        {
            let journal = FileStageJournal::open(&path).unwrap();
            three_entries(&journal, &interaction);
        }

        let journal = FileStageJournal::open(&path).unwrap();
        journal.seal(&interaction).unwrap();

        let log = journal.export_log();
        assert_eq!(log.events.len(), 4);
        assert_eq!(log.journal_id, "journal");
        assert!(journal.verify_integrity());
        assert!(log.is_sealed(&interaction));

        let lines = std::fs::read_to_string(&path).unwrap();
        assert_eq!(lines.lines().count(), 4);
    }

    #[test]
    fn test_file_journal_rejects_edited_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.jsonl");
        {
            let journal = FileStageJournal::open(&path).unwrap();
            three_entries(&journal, &InteractionId::new());
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, contents.replacen("\"completed\"", "\"degraded\",\"reason\":\"x\"", 1)).unwrap();

        assert!(FileStageJournal::open(&path).is_err());
    }
}
