//! Risk rule types and configuration schema.
//!
//! A `RiskRuleConfig` is deserialized from TOML and holds an ordered list of
//! `RiskRule`s. Rules are evaluated in declaration order; the first rule whose
//! conditions all hold decides the tier. If no rule matches, the assessment is
//! `Unknown`.

use serde::{Deserialize, Serialize};

use aftercare_contracts::{
    risk::RiskLevel,
    symptoms::{ExtractedSymptoms, Severity},
};

/// The tier a rule assigns when it matches.
///
/// Kept separate from `RiskLevel` so a rule file cannot declare `Unknown`,
/// which is reserved for the fallback path.
///
/// ```toml
/// risk_level = "high"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleTier {
    Low,
    Medium,
    High,
}

impl From<RuleTier> for RiskLevel {
    fn from(tier: RuleTier) -> Self {
        match tier {
            RuleTier::Low => RiskLevel::Low,
            RuleTier::Medium => RiskLevel::Medium,
            RuleTier::High => RiskLevel::High,
        }
    }
}

/// A single risk rule loaded from TOML.
///
/// Every condition is optional; an absent condition always holds. Severity
/// bounds compare by `Severity::rank`, so `"not mentioned"` satisfies an
/// upper bound the same way `"none"` does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskRule {
    /// Stable identifier quoted in justifications and logs.
    pub id: String,

    /// Clinical wording used as the lead of the justification.
    pub description: String,

    pub min_pain: Option<u8>,
    pub max_pain: Option<u8>,

    pub bleeding_at_least: Option<Severity>,
    pub bleeding_at_most: Option<Severity>,

    pub swelling_at_least: Option<Severity>,
    pub swelling_at_most: Option<Severity>,

    /// Exact match on the fever flag.
    pub fever: Option<bool>,

    pub risk_level: RuleTier,
}

impl RiskRule {
    /// Return true if every condition on this rule holds for `symptoms`.
    pub fn matches(&self, symptoms: &ExtractedSymptoms) -> bool {
        let pain = symptoms.pain_level;
        self.min_pain.map_or(true, |min| pain >= min)
            && self.max_pain.map_or(true, |max| pain <= max)
            && at_least(self.bleeding_at_least, symptoms.bleeding)
            && at_most(self.bleeding_at_most, symptoms.bleeding)
            && at_least(self.swelling_at_least, symptoms.swelling)
            && at_most(self.swelling_at_most, symptoms.swelling)
            && self.fever.map_or(true, |fever| symptoms.fever == fever)
    }
}

fn at_least(bound: Option<Severity>, value: Severity) -> bool {
    bound.map_or(true, |b| value.rank() >= b.rank())
}

fn at_most(bound: Option<Severity>, value: Severity) -> bool {
    bound.map_or(true, |b| value.rank() <= b.rank())
}

/// The top-level structure deserialized from a TOML risk rule file.
///
/// ```toml
/// [[rules]]
/// id = "severe-bleeding"
/// description = "Severe bleeding reported"
/// bleeding_at_least = "severe"
/// risk_level = "high"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskRuleConfig {
    /// Ordered list of rules. First match wins.
    pub rules: Vec<RiskRule>,
}
