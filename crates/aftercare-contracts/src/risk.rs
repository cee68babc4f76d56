//! Risk tiers and the assessment stored on an interaction record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discrete risk tier. `Unknown` is the mandatory fallback whenever an
/// assessment fails or cannot run; it is never replaced by `Low` silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [Self::Low, Self::Medium, Self::High, Self::Unknown];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A risk tier together with the reason it was chosen.
///
/// Stored as one value so the tier and its justification are always written
/// and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub justification: String,
}

impl RiskAssessment {
    pub fn new(risk_level: RiskLevel, justification: impl Into<String>) -> Self {
        Self {
            risk_level,
            justification: justification.into(),
        }
    }

    /// The fallback assessment, naming why no real verdict exists.
    pub fn unknown(cause: impl Into<String>) -> Self {
        Self::new(RiskLevel::Unknown, cause)
    }
}
