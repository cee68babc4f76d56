//! TOML-driven risk rule engine.
//!
//! `TomlRiskRules` loads a `RiskRuleConfig` from a TOML string or file and
//! implements the `RiskAssessor` trait from aftercare-core.
//!
//! Evaluation algorithm:
//!
//! 1. Parse-failed symptoms are never graded: the result is `Unknown`.
//! 2. Iterate rules in declaration order.
//! 3. The first rule whose conditions all hold decides the tier; the
//!    justification quotes the rule and the symptom values it saw.
//! 4. If no rule matched → `Unknown` naming the unmatched symptoms.

use std::path::Path;

use tracing::{debug, warn};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    patient::Patient,
    risk::RiskAssessment,
    symptoms::{ExtractedSymptoms, SymptomExtraction},
};
use aftercare_core::traits::RiskAssessor;

use crate::rule::RiskRuleConfig;

/// The rule table shipped with the crate.
pub const DENTAL_RULES: &str = include_str!("../rules/dental.toml");

/// A `RiskAssessor` that grades symptoms against rules read from TOML.
///
/// ```rust,ignore
/// use aftercare_policy::engine::TomlRiskRules;
///
/// let rules = TomlRiskRules::from_file(Path::new("rules/dental.toml"))?;
/// ```
#[derive(Debug)]
pub struct TomlRiskRules {
    config: RiskRuleConfig,
}

impl TomlRiskRules {
    /// Parse `s` as TOML and build a `TomlRiskRules`.
    ///
    /// Returns `AftercareError::ConfigError` if the TOML is malformed or does
    /// not match the expected `RiskRuleConfig` schema.
    pub fn from_toml_str(s: &str) -> AftercareResult<Self> {
        let config: RiskRuleConfig = toml::from_str(s).map_err(|e| AftercareError::ConfigError {
            reason: format!("failed to parse risk rule TOML: {}", e),
        })?;
        Ok(Self { config })
    }

    /// Read the file at `path` and parse it as a risk rule table.
    pub fn from_file(path: &Path) -> AftercareResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AftercareError::ConfigError {
            reason: format!("failed to read risk rule file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The built-in post-operative dental table.
    pub fn default_dental() -> AftercareResult<Self> {
        Self::from_toml_str(DENTAL_RULES)
    }

    pub fn rule_count(&self) -> usize {
        self.config.rules.len()
    }

    /// Grade decoded symptoms. First match wins; no match is `Unknown`.
    pub fn evaluate(&self, symptoms: &ExtractedSymptoms) -> RiskAssessment {
        let observed = describe(symptoms);

        for rule in &self.config.rules {
            if !rule.matches(symptoms) {
                continue;
            }
            debug!(rule_id = %rule.id, risk_level = ?rule.risk_level, "risk rule matched");
            return RiskAssessment::new(
                rule.risk_level.into(),
                format!("{} (rule '{}'): {}", rule.description, rule.id, observed),
            );
        }

        warn!(symptoms = %observed, "no risk rule matched");
        RiskAssessment::unknown(format!("no risk rule matched the reported symptoms: {observed}"))
    }
}

impl RiskAssessor for TomlRiskRules {
    fn assess(&self, patient: &Patient, symptoms: &SymptomExtraction) -> AftercareResult<RiskAssessment> {
        debug!(patient_id = %patient.id(), "assessing risk");
        match symptoms {
            SymptomExtraction::Parsed(parsed) => Ok(self.evaluate(parsed)),
            SymptomExtraction::Failed(failure) => Ok(RiskAssessment::unknown(format!(
                "symptom extraction failed ({}); no rule can be applied",
                failure.error
            ))),
        }
    }
}

fn describe(s: &ExtractedSymptoms) -> String {
    format!(
        "pain {}/10, bleeding {}, swelling {}, fever {}",
        s.pain_level,
        s.bleeding,
        s.swelling,
        if s.fever { "yes" } else { "no" }
    )
}
