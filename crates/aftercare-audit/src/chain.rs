//! Hash-chain primitives: hashing, appending and chain integrity checks.
//!
//! Hash input layout (bytes, in order):
//!   1. journal_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the record

use sha2::{Digest, Sha256};

use aftercare_contracts::error::{AftercareError, AftercareResult};

use crate::event::{JournalEvent, JournalRecord};

/// Compute the SHA-256 hash for a single journal event.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_event(
    journal_id: &str,
    sequence: u64,
    record: &JournalRecord,
    prev_hash: &str,
) -> AftercareResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| AftercareError::JournalWriteFailed {
        reason: format!("journal record is not serializable: {e}"),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(journal_id.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify the integrity of a hash chain.
///
/// Valid when each event's `prev_hash` equals the `this_hash` of the event
/// before it (or `GENESIS_HASH` for the first), each `this_hash` matches the
/// value recomputed from the event's own fields, and sequence numbers run
/// 0, 1, 2, ... without gaps. An empty chain is valid.
pub fn verify_chain(events: &[JournalEvent]) -> bool {
    let mut expected_prev = JournalEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }

        match hash_event(&event.journal_id, event.sequence, &event.record, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}

/// The growing tail of one chain.
#[derive(Debug)]
pub(crate) struct ChainState {
    pub(crate) events: Vec<JournalEvent>,
    pub(crate) last_hash: String,
}

impl ChainState {
    pub(crate) fn new() -> Self {
        Self {
            events: Vec::new(),
            last_hash: JournalEvent::GENESIS_HASH.to_string(),
        }
    }

    /// Resume a chain from previously written events.
    pub(crate) fn resume(events: Vec<JournalEvent>) -> Self {
        let last_hash = events
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_else(|| JournalEvent::GENESIS_HASH.to_string());
        Self { events, last_hash }
    }

    /// Build the next event without appending it.
    pub(crate) fn next_event(&self, journal_id: &str, record: JournalRecord) -> AftercareResult<JournalEvent> {
        let sequence = self.events.len() as u64;
        let prev_hash = self.last_hash.clone();
        let this_hash = hash_event(journal_id, sequence, &record, &prev_hash)?;
        Ok(JournalEvent {
            sequence,
            journal_id: journal_id.to_string(),
            record,
            prev_hash,
            this_hash,
        })
    }

    pub(crate) fn push(&mut self, event: JournalEvent) {
        self.last_hash = event.this_hash.clone();
        self.events.push(event);
    }
}
