//! In-memory `RecordStore`, for tests and single-process runs.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    patient::{Patient, PatientId},
};
use aftercare_core::traits::RecordStore;

/// Clones share the same map.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    patients: Arc<Mutex<BTreeMap<PatientId, Patient>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> AftercareResult<std::sync::MutexGuard<'_, BTreeMap<PatientId, Patient>>> {
        self.patients.lock().map_err(|e| AftercareError::StorageUnavailable {
            reason: format!("record store lock poisoned: {e}"),
        })
    }
}

impl RecordStore for InMemoryRecordStore {
    fn load(&self, id: &PatientId) -> AftercareResult<Option<Patient>> {
        Ok(self.locked()?.get(id).cloned())
    }

    fn save(&self, patient: &Patient) -> AftercareResult<()> {
        patient.validate()?;
        self.locked()?.insert(patient.id().clone(), patient.clone());
        Ok(())
    }

    fn list(&self) -> AftercareResult<Vec<PatientId>> {
        Ok(self.locked()?.keys().cloned().collect())
    }
}
