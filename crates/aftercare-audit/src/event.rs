//! Journal event and log types.
//!
//! `JournalEvent` is a single entry in the hash chain: it wraps a
//! `JournalRecord` with sequence numbering and the SHA-256 hashes that make
//! tampering detectable. `JournalLog` is the exported snapshot of a chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aftercare_contracts::{execution::StageEntry, interaction::InteractionId};

/// What one chain link records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JournalRecord {
    /// One orchestrator invocation.
    Stage(StageEntry),
    /// An interaction reached its terminal state.
    Sealed {
        interaction_id: InteractionId,
        sealed_at: DateTime<Utc>,
    },
}

impl JournalRecord {
    pub fn interaction_id(&self) -> &InteractionId {
        match self {
            Self::Stage(entry) => &entry.interaction_id,
            Self::Sealed { interaction_id, .. } => interaction_id,
        }
    }
}

/// A single entry in the SHA-256 hash chain of one journal.
///
/// Each event commits to the previous event via `prev_hash`. Modifying any
/// field, including those of the embedded `record`, invalidates `this_hash`
/// and every later `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    /// The journal this event belongs to.
    pub journal_id: String,

    pub record: JournalRecord,

    /// SHA-256 hash (hex) of the previous event, or `GENESIS_HASH` for the
    /// first event.
    pub prev_hash: String,

    /// SHA-256 hash (hex) over (journal_id, sequence, prev_hash, record).
    pub this_hash: String,
}

impl JournalEvent {
    /// The `prev_hash` of the first event in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// An exported snapshot of a journal.
///
/// `terminal_hash` is the `this_hash` of the last event and serves as a
/// compact commitment to the whole log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLog {
    pub journal_id: String,

    /// All events in chain order (sequence 0 first).
    pub events: Vec<JournalEvent>,

    pub exported_at: DateTime<Utc>,

    /// Empty string if the log is empty.
    pub terminal_hash: String,
}

impl JournalLog {
    /// Stage entries for one interaction, in the order they were written.
    pub fn entries_for(&self, interaction_id: &InteractionId) -> Vec<&StageEntry> {
        self.events
            .iter()
            .filter_map(|event| match &event.record {
                JournalRecord::Stage(entry) if &entry.interaction_id == interaction_id => Some(entry),
                _ => None,
            })
            .collect()
    }

    /// True if a seal was written for `interaction_id`.
    pub fn is_sealed(&self, interaction_id: &InteractionId) -> bool {
        self.events.iter().any(|event| {
            matches!(&event.record, JournalRecord::Sealed { .. })
                && event.record.interaction_id() == interaction_id
        })
    }
}
