//! Patient identity, medical context, and interaction history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AftercareError, AftercareResult},
    interaction::InteractionRecord,
};

/// Stable identifier for a patient, e.g. `PatientId("P12345")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientId(pub String);

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A patient recovering from a dental procedure.
///
/// `interactions` is append-only and chronological; the last element is
/// always the round the workflow currently operates on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    id: PatientId,
    pub name: String,
    pub procedure: String,
    pub procedure_date: NaiveDate,
    pub contact_info: String,
    pub phone_number: Option<String>,
    /// Free-text history passed read-only to every stage.
    pub medical_history: String,
    interactions: Vec<InteractionRecord>,
}

impl Patient {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        procedure: impl Into<String>,
        procedure_date: NaiveDate,
        contact_info: impl Into<String>,
        medical_history: impl Into<String>,
    ) -> Self {
        Self {
            id: PatientId(id.into()),
            name: name.into(),
            procedure: procedure.into(),
            procedure_date,
            contact_info: contact_info.into(),
            phone_number: None,
            medical_history: medical_history.into(),
            interactions: Vec::new(),
        }
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn id(&self) -> &PatientId {
        &self.id
    }

    pub fn interactions(&self) -> &[InteractionRecord] {
        &self.interactions
    }

    /// Start a new round of contact and return it.
    pub fn add_interaction(&mut self) -> &InteractionRecord {
        self.interactions.push(InteractionRecord::new());
        &self.interactions[self.interactions.len() - 1]
    }

    pub fn latest_interaction(&self) -> Option<&InteractionRecord> {
        self.interactions.last()
    }

    /// Replace the latest round with an updated snapshot of the same round.
    ///
    /// Fails if there is no round yet or `record` belongs to another round;
    /// history is never rewritten.
    pub fn replace_latest(&mut self, record: InteractionRecord) -> AftercareResult<()> {
        let latest = self
            .interactions
            .last_mut()
            .ok_or_else(|| AftercareError::StateMachineError {
                reason: format!("patient {} has no interaction to update", self.id),
            })?;
        if latest.id() != record.id() {
            return Err(AftercareError::StateMachineError {
                reason: format!(
                    "interaction {} is not the latest round for patient {}",
                    record.id(),
                    self.id
                ),
            });
        }
        *latest = record;
        Ok(())
    }

    /// Whole days between the procedure and `today`; negative if the
    /// procedure is scheduled in the future.
    pub fn days_since_procedure(&self, today: NaiveDate) -> i64 {
        (today - self.procedure_date).num_days()
    }

    /// Validate every stored round. Used when loading persisted patients.
    pub fn validate(&self) -> AftercareResult<()> {
        self.interactions.iter().try_for_each(InteractionRecord::validate)
    }
}
