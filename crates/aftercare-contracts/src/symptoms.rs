//! The structured output contract of symptom extraction.
//!
//! A symptom extraction either decodes into `ExtractedSymptoms` or is kept as
//! an explicit `ParseFailure` carrying the offending model text. Use-sites
//! never look up individual fields on a loosely-typed map.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Graded severity for bleeding and swelling.
///
/// `NotMentioned` is distinct from `None`: the patient said nothing about the
/// symptom versus explicitly reporting its absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "mild")]
    Mild,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "severe")]
    Severe,
    #[serde(rename = "not mentioned")]
    NotMentioned,
}

impl Severity {
    /// Every accepted wire value, in the order used by the JSON Schema.
    pub const WIRE_VALUES: [&'static str; 5] = ["none", "mild", "moderate", "severe", "not mentioned"];

    /// Ordinal used for threshold comparisons. An unmentioned symptom ranks
    /// alongside an absent one.
    pub fn rank(self) -> u8 {
        match self {
            Self::None | Self::NotMentioned => 0,
            Self::Mild => 1,
            Self::Moderate => 2,
            Self::Severe => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::NotMentioned => "not mentioned",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall tone of the patient's message. Closed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Concerned,
    Neutral,
}

impl Sentiment {
    pub const WIRE_VALUES: [&'static str; 4] = ["positive", "negative", "concerned", "neutral"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Concerned => "concerned",
            Self::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symptoms decoded from one patient response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractedSymptoms {
    /// Pain on a 0-10 scale; 0 when the patient reports none.
    pub pain_level: u8,
    pub bleeding: Severity,
    pub swelling: Severity,
    pub fever: bool,
    /// Medication named by the patient, or "none".
    pub medication_taken: String,
    /// Additional symptom phrases in the order the patient mentioned them.
    pub other_symptoms: Vec<String>,
    /// The patient's stated worries, or "none".
    pub patient_concerns: String,
    pub overall_sentiment: Sentiment,
}

impl ExtractedSymptoms {
    /// Highest accepted pain score.
    pub const MAX_PAIN: u8 = 10;

    /// The structure for a response that reports no symptoms at all.
    pub fn symptom_free() -> Self {
        Self {
            pain_level: 0,
            bleeding: Severity::None,
            swelling: Severity::None,
            fever: false,
            medication_taken: "none".to_string(),
            other_symptoms: Vec::new(),
            patient_concerns: "none".to_string(),
            overall_sentiment: Sentiment::Positive,
        }
    }
}

/// Marker stored in place of symptoms when model output could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParseFailure {
    /// Always `ParseFailure::MARKER`.
    pub error: String,
    /// The model text that failed to decode, verbatim.
    pub raw_response: String,
}

impl ParseFailure {
    pub const MARKER: &'static str = "parse failed";

    pub fn new(raw_response: impl Into<String>) -> Self {
        Self {
            error: Self::MARKER.to_string(),
            raw_response: raw_response.into(),
        }
    }
}

/// The value stored in `extracted_symptoms` once extraction has run.
///
/// Serialized untagged, so a parse failure persists as
/// `{"error": "parse failed", "raw_response": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymptomExtraction {
    Parsed(ExtractedSymptoms),
    Failed(ParseFailure),
}

impl SymptomExtraction {
    pub fn parsed(&self) -> Option<&ExtractedSymptoms> {
        match self {
            Self::Parsed(symptoms) => Some(symptoms),
            Self::Failed(_) => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}
