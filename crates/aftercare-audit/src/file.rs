//! Append-only JSON Lines journal on disk.
//!
//! One `JournalEvent` per line. Opening an existing file replays and
//! verifies its chain, then continues it, so the chain spans every process
//! that ever wrote to the file.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use tracing::{debug, info};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    execution::StageEntry,
    interaction::InteractionId,
};
use aftercare_core::traits::StageJournal;

use crate::{
    chain::{verify_chain, ChainState},
    event::{JournalEvent, JournalLog, JournalRecord},
};

pub struct FileStageJournal {
    journal_id: String,
    path: PathBuf,
    state: Mutex<ChainState>,
}

impl FileStageJournal {
    /// Open or create the journal at `path`.
    ///
    /// # Errors
    ///
    /// `JournalWriteFailed` if the file cannot be read, a line does not
    /// decode, or the stored chain fails verification.
    pub fn open(path: impl Into<PathBuf>) -> AftercareResult<Self> {
        let path = path.into();
        let events = if path.exists() {
            read_events(&path)?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| write_failed(&path, e))?;
            }
            Vec::new()
        };

        if !verify_chain(&events) {
            return Err(AftercareError::JournalWriteFailed {
                reason: format!("journal '{}' failed hash chain verification", path.display()),
            });
        }

        let journal_id = events
            .first()
            .map(|e| e.journal_id.clone())
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "journal".to_string());

        debug!(path = %path.display(), events = events.len(), "journal opened");
        Ok(Self {
            journal_id,
            path,
            state: Mutex::new(ChainState::resume(events)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

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

    fn read(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The line is on disk before the in-memory tail advances.
    fn append_record(&self, record: JournalRecord) -> AftercareResult<()> {
        let mut state = self.state.lock().map_err(|e| AftercareError::JournalWriteFailed {
            reason: format!("journal lock poisoned: {}", e),
        })?;
        let event = state.next_event(&self.journal_id, record)?;

        let mut line = serde_json::to_string(&event).map_err(|e| write_failed(&self.path, e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| write_failed(&self.path, e))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| write_failed(&self.path, e))?;

        state.push(event);
        Ok(())
    }
}

impl StageJournal for FileStageJournal {
    fn append(&self, entry: &StageEntry) -> AftercareResult<()> {
        self.append_record(JournalRecord::Stage(entry.clone()))
    }

    fn seal(&self, interaction_id: &InteractionId) -> AftercareResult<()> {
        self.append_record(JournalRecord::Sealed {
            interaction_id: interaction_id.clone(),
            sealed_at: Utc::now(),
        })?;
        info!(
            path = %self.path.display(),
            interaction_id = %interaction_id,
            "interaction sealed"
        );
        Ok(())
    }
}

fn read_events(path: &Path) -> AftercareResult<Vec<JournalEvent>> {
    let contents = fs::read_to_string(path).map_err(|e| write_failed(path, e))?;
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| AftercareError::JournalWriteFailed {
                reason: format!("journal '{}' line {}: {}", path.display(), n + 1, e),
            })
        })
        .collect()
}

fn write_failed(path: &Path, e: impl std::fmt::Display) -> AftercareError {
    AftercareError::JournalWriteFailed {
        reason: format!("journal '{}': {}", path.display(), e),
    }
}
