//! In-memory implementation of `StageJournal`.
//!
//! `InMemoryStageJournal` keeps all events in a `Vec` behind a `Mutex`, so it
//! can be shared across threads while the orchestrator appends. Use
//! `export_log()` to obtain a snapshot and `verify_integrity()` at any time to
//! confirm the chain has not been tampered with.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    execution::StageEntry,
    interaction::InteractionId,
};
use aftercare_core::traits::StageJournal;

use crate::{
    chain::{verify_chain, ChainState},
    event::{JournalLog, JournalRecord},
};

/// An in-memory, append-only stage journal backed by a SHA-256 hash chain.
///
/// Clones share the same chain.
#[derive(Clone)]
pub struct InMemoryStageJournal {
    journal_id: String,
    pub(crate) state: Arc<Mutex<ChainState>>,
}

impl InMemoryStageJournal {
    pub fn new(journal_id: impl Into<String>) -> Self {
        Self {
            journal_id: journal_id.into(),
            state: Arc::new(Mutex::new(ChainState::new())),
        }
    }

    /// Snapshot every event written so far.
    pub fn export_log(&self) -> JournalLog {
        let state = self.read();
        JournalLog {
            journal_id: self.journal_id.clone(),
            events: state.events.clone(),
            exported_at: Utc::now(),
            terminal_hash: state.events.last().map(|e| e.this_hash.clone()).unwrap_or_default(),
        }
    }

    pub fn verify_integrity(&self) -> bool {
        verify_chain(&self.read().events)
    }

    /// A poisoned lock still holds a consistent chain: events are only
    /// pushed after their hash is computed.
    fn read(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn append_record(&self, record: JournalRecord) -> AftercareResult<()> {
        let mut state = self.state.lock().map_err(|e| AftercareError::JournalWriteFailed {
            reason: format!("journal lock poisoned: {}", e),
        })?;
        let event = state.next_event(&self.journal_id, record)?;
        state.push(event);
        Ok(())
    }
}

impl StageJournal for InMemoryStageJournal {
    fn append(&self, entry: &StageEntry) -> AftercareResult<()> {
        self.append_record(JournalRecord::Stage(entry.clone()))
    }

    fn seal(&self, interaction_id: &InteractionId) -> AftercareResult<()> {
        self.append_record(JournalRecord::Sealed {
            interaction_id: interaction_id.clone(),
            sealed_at: Utc::now(),
        })?;
        info!(
            journal_id = %self.journal_id,
            interaction_id = %interaction_id,
            event_count = self.read().events.len(),
            "interaction sealed"
        );
        Ok(())
    }
}
