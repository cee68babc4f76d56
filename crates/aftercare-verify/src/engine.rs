//! Structured decoding of symptom extraction output.
//!
//! `SymptomDecoder` turns raw model text into a `SymptomExtraction`.
//! Decoding runs in three phases:
//!
//! 1. **Framing**: surrounding whitespace and a Markdown code fence are
//!    removed; the remainder must be one JSON document.
//! 2. **Structural**: the document is validated against the symptom JSON
//!    Schema using the `jsonschema` crate. All violations are collected so
//!    the log shows the full failure set in one pass.
//! 3. **Typed**: the validated document is deserialized into
//!    `ExtractedSymptoms`.
//!
//! Any failure yields `SymptomExtraction::Failed` carrying the raw text
//! verbatim. Decoding never returns an error past this boundary.

use serde_json::{json, Value};
use tracing::{debug, warn};

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    symptoms::{ExtractedSymptoms, ParseFailure, Sentiment, Severity, SymptomExtraction},
};

/// The JSON Schema every extraction must satisfy.
pub fn symptom_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "required": [
            "pain_level", "bleeding", "swelling", "fever", "medication_taken",
            "other_symptoms", "patient_concerns", "overall_sentiment"
        ],
        "properties": {
            "pain_level": { "type": "integer", "minimum": 0, "maximum": ExtractedSymptoms::MAX_PAIN },
            "bleeding": { "enum": Severity::WIRE_VALUES },
            "swelling": { "enum": Severity::WIRE_VALUES },
            "fever": { "type": "boolean" },
            "medication_taken": { "type": "string" },
            "other_symptoms": { "type": "array", "items": { "type": "string" } },
            "patient_concerns": { "type": "string" },
            "overall_sentiment": { "enum": Sentiment::WIRE_VALUES }
        }
    })
}

/// Validates and decodes model output for the symptom extraction stage.
pub struct SymptomDecoder {
    validator: jsonschema::Validator,
}

impl SymptomDecoder {
    /// Compile the symptom schema.
    ///
    /// Returns `AftercareError::SchemaValidation` if the schema document
    /// itself does not compile.
    pub fn new() -> AftercareResult<Self> {
        let validator = jsonschema::validator_for(&symptom_schema()).map_err(|e| {
            AftercareError::SchemaValidation {
                reason: format!("invalid symptom schema: {e}"),
            }
        })?;
        Ok(Self { validator })
    }

    /// Decode `raw` model text. Failures are returned as data, not errors.
    pub fn decode(&self, raw: &str) -> SymptomExtraction {
        match self.try_decode(raw) {
            Ok(symptoms) => {
                debug!(
                    pain_level = symptoms.pain_level,
                    sentiment = %symptoms.overall_sentiment,
                    "symptom output decoded"
                );
                SymptomExtraction::Parsed(symptoms)
            }
            Err(problems) => {
                warn!(problems = %problems.join("; "), "symptom output rejected");
                SymptomExtraction::Failed(ParseFailure::new(raw))
            }
        }
    }

    /// Decode `raw`, returning every problem found on failure.
    pub fn try_decode(&self, raw: &str) -> Result<ExtractedSymptoms, Vec<String>> {
        let document: Value = serde_json::from_str(unframe(raw))
            .map_err(|e| vec![format!("not a JSON document: {e}")])?;

        let violations = self.violations(&document);
        if !violations.is_empty() {
            return Err(violations);
        }

        serde_json::from_value(document).map_err(|e| vec![format!("decode: {e}")])
    }

    /// Every JSON Schema violation in `document`.
    pub fn violations(&self, document: &Value) -> Vec<String> {
        self.validator
            .iter_errors(document)
            .map(|error| format!("JSON Schema violation at {}: {}", error.instance_path, error))
            .collect()
    }
}

/// Strip surrounding whitespace and an optional ```/```json fence.
fn unframe(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
