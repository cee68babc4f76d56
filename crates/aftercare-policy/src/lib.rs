//! # aftercare-policy
//!
//! A TOML-driven risk rule engine for post-operative follow-up.
//!
//! ## Overview
//!
//! This crate provides [`TomlRiskRules`], which implements the
//! [`RiskAssessor`](aftercare_core::traits::RiskAssessor) trait. Rules are
//! declared in a TOML file, evaluated in order, and the first matching rule
//! decides the tier. If no rule matches, the assessment is `Unknown`.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use aftercare_policy::TomlRiskRules;
//!
//! let rules = TomlRiskRules::default_dental()?;
//! // Pass `rules` as the risk processor of `aftercare_core::StageProcessors`.
//! ```

pub mod engine;
pub mod rule;

pub use engine::{TomlRiskRules, DENTAL_RULES};
pub use rule::{RiskRule, RiskRuleConfig, RuleTier};

// ── Tests ─────────────────────────────────────────────────────────────────────
