//! `ResponseIntake` implementations.
//!
//! - `ScriptedIntake` holds messages in memory; scenarios and tests push
//!   replies into it.
//! - `JsonInbox` reads a JSON file keyed by phone number, the layout an SMS
//!   webhook writes:
//!
//! ```json
//! {
//!   "+15551234567": {
//!     "processed": false,
//!     "responses": [{ "timestamp": "2026-10-19 09:12:44", "message": "Fine" }]
//!   }
//! }
//! ```

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Mutex,
    thread,
    time::Duration,
};

use chrono::Local;
use tracing::{debug, info};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    intake::{IntakeMessage, IntakeRecord},
};
use aftercare_core::traits::ResponseIntake;

type Inbox = BTreeMap<String, IntakeRecord>;

fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Append `message` for `destination`, reopening it for processing.
fn deliver_into(inbox: &mut Inbox, destination: &str, message: &str) {
    let record = inbox.entry(destination.to_string()).or_default();
    record.processed = false;
    record.responses.push(IntakeMessage {
        timestamp: timestamp_now(),
        message: message.to_string(),
    });
}

/// Mark `destination` processed unless it holds more than `seen` responses.
/// Returns whether the inbox changed, or `None` when newer messages block it.
fn mark_through(inbox: &mut Inbox, destination: &str, seen: usize) -> Option<bool> {
    match inbox.get_mut(destination) {
        Some(record) if record.responses.len() > seen => None,
        Some(record) if !record.processed => {
            record.processed = true;
            Some(true)
        }
        _ => Some(false),
    }
}

// ── ScriptedIntake ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedIntake {
    inbox: Mutex<Inbox>,
    delay: Option<Duration>,
}

impl ScriptedIntake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long in every `fetch`, to simulate a slow source.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, destination: &str, message: &str) {
        let mut inbox = self.inbox.lock().unwrap_or_else(|p| p.into_inner());
        deliver_into(&mut inbox, destination, message);
    }
}

impl ResponseIntake for ScriptedIntake {
    fn fetch(&self, destination: &str) -> AftercareResult<IntakeRecord> {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let inbox = self.inbox.lock().unwrap_or_else(|p| p.into_inner());
        Ok(inbox.get(destination).cloned().unwrap_or_default())
    }

    fn mark_processed(&self, destination: &str) -> AftercareResult<()> {
        self.mark_processed_through(destination, usize::MAX).map(|_| ())
    }

    fn mark_processed_through(&self, destination: &str, seen: usize) -> AftercareResult<bool> {
        let mut inbox = self
            .inbox
            .lock()
            .map_err(|e| AftercareError::gateway("intake", format!("lock poisoned: {e}")))?;
        Ok(mark_through(&mut inbox, destination, seen).is_some())
    }
}

// ── JsonInbox ─────────────────────────────────────────────────────────────────

/// File-backed intake. The file is re-read on every call, so another
/// process may append to it between rounds.
pub struct JsonInbox {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl JsonInbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a message, as the webhook would on an inbound SMS.
    pub fn deliver(&self, destination: &str, message: &str) -> AftercareResult<()> {
        let _guard = self.guard.lock().unwrap_or_else(|p| p.into_inner());
        let mut inbox = self.read()?;
        deliver_into(&mut inbox, destination, message);
        self.write(&inbox)?;
        info!(destination = %destination, path = %self.path.display(), "message added to inbox");
        Ok(())
    }

    fn read(&self) -> AftercareResult<Inbox> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "inbox file absent, treating as empty");
                return Ok(Inbox::new());
            }
            Err(e) => return Err(self.unavailable(e)),
        };
        if text.trim().is_empty() {
            return Ok(Inbox::new());
        }
        serde_json::from_str(&text).map_err(|e| self.unavailable(e))
    }

    fn write(&self, inbox: &Inbox) -> AftercareResult<()> {
        let json = serde_json::to_string_pretty(inbox).map_err(|e| self.unavailable(e))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.unavailable(e))?;
        }
        let staged = self.path.with_extension("json.tmp");
        fs::write(&staged, json).map_err(|e| self.unavailable(e))?;
        fs::rename(&staged, &self.path).map_err(|e| self.unavailable(e))
    }

    fn unavailable(&self, e: impl std::fmt::Display) -> AftercareError {
        AftercareError::gateway("intake", format!("{}: {e}", self.path.display()))
    }
}

impl ResponseIntake for JsonInbox {
    fn fetch(&self, destination: &str) -> AftercareResult<IntakeRecord> {
        let _guard = self.guard.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.read()?.remove(destination).unwrap_or_default())
    }

    fn mark_processed(&self, destination: &str) -> AftercareResult<()> {
        self.mark_processed_through(destination, usize::MAX).map(|_| ())
    }

    fn mark_processed_through(&self, destination: &str, seen: usize) -> AftercareResult<bool> {
        let _guard = self.guard.lock().unwrap_or_else(|p| p.into_inner());
        let mut inbox = self.read()?;
        match mark_through(&mut inbox, destination, seen) {
            Some(true) => self.write(&inbox).map(|()| true),
            Some(false) => Ok(true),
            None => {
                debug!(destination = %destination, seen, "newer message in inbox, not marking");
                Ok(false)
            }
        }
    }
}
