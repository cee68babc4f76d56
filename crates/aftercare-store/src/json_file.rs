//! One JSON document per patient in a directory.
//!
//! `<dir>/<patient-id>.json` holds the full `Patient`, interaction history
//! included. Writes go to a hidden temp file that is then renamed over the
//! target, so a reader never sees a half-written record. Loaded records are
//! validated against the workflow invariants before they are returned.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    patient::{Patient, PatientId},
};
use aftercare_core::traits::RecordStore;

pub struct JsonFileRecordStore {
    dir: PathBuf,
}

impl JsonFileRecordStore {
    /// Use `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> AftercareResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| unavailable(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &PatientId) -> AftercareResult<PathBuf> {
        let valid = !id.0.is_empty()
            && !id.0.starts_with('.')
            && id
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(AftercareError::StorageUnavailable {
                reason: format!("patient id '{id}' cannot be used as a file name"),
            });
        }
        Ok(self.dir.join(format!("{}.json", id.0)))
    }
}

impl RecordStore for JsonFileRecordStore {
    fn load(&self, id: &PatientId) -> AftercareResult<Option<Patient>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&path).map_err(|e| unavailable(&path, e))?;
        let patient: Patient = serde_json::from_str(&contents).map_err(|e| {
            AftercareError::StorageUnavailable {
                reason: format!("'{}' is not a valid patient record: {e}", path.display()),
            }
        })?;

        if let Err(e) = patient.validate() {
            warn!(path = %path.display(), error = %e, "stored record violates workflow invariants");
            return Err(e);
        }
        if patient.id() != id {
            return Err(AftercareError::StorageUnavailable {
                reason: format!("'{}' holds patient '{}'", path.display(), patient.id()),
            });
        }

        debug!(patient_id = %id, interactions = patient.interactions().len(), "patient loaded");
        Ok(Some(patient))
    }

    fn save(&self, patient: &Patient) -> AftercareResult<()> {
        patient.validate()?;
        let path = self.path_for(patient.id())?;
        let tmp_path = self.dir.join(format!(".{}.json.tmp", patient.id().0));

        let body = serde_json::to_string_pretty(patient).map_err(|e| unavailable(&path, e))?;
        fs::write(&tmp_path, body).map_err(|e| unavailable(&tmp_path, e))?;
        fs::rename(&tmp_path, &path).map_err(|e| unavailable(&path, e))?;

        debug!(patient_id = %patient.id(), path = %path.display(), "patient saved");
        Ok(())
    }

    fn list(&self) -> AftercareResult<Vec<PatientId>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| unavailable(&self.dir, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| unavailable(&self.dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    ids.push(PatientId(stem.to_string()));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn unavailable(path: &Path, e: impl std::fmt::Display) -> AftercareError {
    AftercareError::StorageUnavailable {
        reason: format!("{}: {e}", path.display()),
    }
}
