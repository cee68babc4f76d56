//! Model-backed stage processors for dental follow-up.
//!
//! Each processor renders its prompt, calls the shared `ModelGateway` and
//! post-processes the reply: extraction output goes through the strict
//! `SymptomDecoder`, care instructions through the escalation guard.
//! Risk is never asked of the model; it comes from the TOML rule table.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::debug;

use aftercare_contracts::{
    error::AftercareResult,
    patient::Patient,
    risk::RiskAssessment,
    symptoms::SymptomExtraction,
};
use aftercare_core::{
    traits::{CareInstructionGenerator, CheckInGenerator, ModelGateway, SummaryGenerator, SymptomExtractor},
    StageProcessors,
};
use aftercare_policy::TomlRiskRules;
use aftercare_verify::{ensure_escalation, SymptomDecoder};

use crate::prompts;

// ── Check-in ──────────────────────────────────────────────────────────────────

pub struct ModelCheckIn {
    model: Arc<dyn ModelGateway>,
    today: Option<NaiveDate>,
}

impl ModelCheckIn {
    pub fn new(model: Arc<dyn ModelGateway>) -> Self {
        Self { model, today: None }
    }

    /// Pin the date used for "days since procedure". Defaults to the local
    /// calendar date at generation time.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }
}

impl CheckInGenerator for ModelCheckIn {
    fn generate(&self, patient: &Patient) -> AftercareResult<String> {
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let prompt = prompts::check_in(patient, today);
        self.model.complete(&prompt.system, &prompt.user)
    }
}

// ── Symptom extraction ────────────────────────────────────────────────────────

pub struct ModelSymptomExtractor {
    model: Arc<dyn ModelGateway>,
    decoder: SymptomDecoder,
}

impl ModelSymptomExtractor {
    pub fn new(model: Arc<dyn ModelGateway>) -> AftercareResult<Self> {
        Ok(Self {
            model,
            decoder: SymptomDecoder::new()?,
        })
    }
}

impl SymptomExtractor for ModelSymptomExtractor {
    fn extract(&self, patient: &Patient, response: &str) -> AftercareResult<SymptomExtraction> {
        let prompt = prompts::symptom_extraction(patient, response);
        let raw = self.model.complete(&prompt.system, &prompt.user)?;
        debug!(patient_id = %patient.id(), bytes = raw.len(), "decoding extraction output");
        Ok(self.decoder.decode(&raw))
    }
}

// ── Care instructions ─────────────────────────────────────────────────────────

pub struct ModelCareWriter {
    model: Arc<dyn ModelGateway>,
}

impl ModelCareWriter {
    pub fn new(model: Arc<dyn ModelGateway>) -> Self {
        Self { model }
    }
}

impl CareInstructionGenerator for ModelCareWriter {
    fn generate(
        &self,
        patient: &Patient,
        symptoms: &SymptomExtraction,
        risk: &RiskAssessment,
    ) -> AftercareResult<String> {
        let prompt = prompts::care_instructions(patient, symptoms, risk)?;
        let text = self.model.complete(&prompt.system, &prompt.user)?;
        // Blank output stays blank so the orchestrator reports it.
        if text.trim().is_empty() {
            return Ok(text);
        }
        Ok(ensure_escalation(&text, risk.risk_level))
    }
}

// ── Clinic summary ────────────────────────────────────────────────────────────

pub struct ModelSummaryWriter {
    model: Arc<dyn ModelGateway>,
}

impl ModelSummaryWriter {
    pub fn new(model: Arc<dyn ModelGateway>) -> Self {
        Self { model }
    }
}

impl SummaryGenerator for ModelSummaryWriter {
    fn summarize(
        &self,
        patient: &Patient,
        symptoms: &SymptomExtraction,
        risk: &RiskAssessment,
        care_instructions: &str,
    ) -> AftercareResult<String> {
        let prompt = prompts::clinic_summary(patient, symptoms, risk, care_instructions)?;
        self.model.complete(&prompt.system, &prompt.user)
    }
}

// ── Assembly ──────────────────────────────────────────────────────────────────

/// The full dental processor set: four model-backed stages around a rule
/// table for risk.
pub fn dental_processors(
    model: Arc<dyn ModelGateway>,
    rules: TomlRiskRules,
) -> AftercareResult<StageProcessors> {
    Ok(StageProcessors {
        check_in: Box::new(ModelCheckIn::new(Arc::clone(&model))),
        symptoms: Box::new(ModelSymptomExtractor::new(Arc::clone(&model))?),
        risk: Box::new(rules),
        care: Box::new(ModelCareWriter::new(Arc::clone(&model))),
        summary: Box::new(ModelSummaryWriter::new(model)),
    })
}
