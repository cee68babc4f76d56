//! Runtime configuration for the dental follow-up runtime.
//!
//! Loaded from a TOML file. Every section and key is optional; a missing
//! file yields the defaults.
//!
//! ```toml
//! [intake]
//! timeout_secs = 5
//!
//! [risk]
//! rules_path = "rules/clinic.toml"
//!
//! [delivery]
//! segment_length = 153
//!
//! [store]
//! dir = ".aftercare"
//! ```

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use aftercare_contracts::error::{AftercareError, AftercareResult};
use aftercare_core::config::OrchestratorConfig;
use aftercare_policy::TomlRiskRules;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub intake: IntakeSection,
    pub risk: RiskSection,
    pub delivery: DeliverySection,
    pub store: StoreSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeSection {
    /// Seconds to wait for the intake source before giving up.
    pub timeout_secs: u64,
    /// JSON inbox file read by the `intake` command.
    pub inbox_path: Option<PathBuf>,
}

impl Default for IntakeSection {
    fn default() -> Self {
        Self {
            timeout_secs: OrchestratorConfig::DEFAULT_INTAKE_TIMEOUT.as_secs(),
            inbox_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskSection {
    /// Replaces the built-in dental rule table when set.
    pub rules_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliverySection {
    /// Characters per outbound message segment.
    pub segment_length: usize,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self { segment_length: 153 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSection {
    /// Directory holding patient records and the journal.
    pub dir: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".aftercare"),
        }
    }
}

impl AppConfig {
    /// Parse and check a configuration document.
    pub fn from_toml_str(s: &str) -> AftercareResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| AftercareError::ConfigError { reason: e.to_string() })?;
        config.check()?;
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> AftercareResult<Self> {
        match fs::read_to_string(path) {
            Ok(text) => {
                info!(path = %path.display(), "loaded configuration");
                Self::from_toml_str(&text)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AftercareError::ConfigError {
                reason: format!("cannot read {}: {e}", path.display()),
            }),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default().with_intake_timeout(Duration::from_secs(self.intake.timeout_secs))
    }

    /// The configured rule table, or the built-in dental table.
    pub fn risk_rules(&self) -> AftercareResult<TomlRiskRules> {
        match &self.risk.rules_path {
            Some(path) => TomlRiskRules::from_file(path),
            None => TomlRiskRules::default_dental(),
        }
    }

    fn check(&self) -> AftercareResult<()> {
        if self.delivery.segment_length == 0 {
            return Err(AftercareError::ConfigError {
                reason: "delivery.segment_length must be at least 1".to_string(),
            });
        }
        if self.intake.timeout_secs == 0 {
            return Err(AftercareError::ConfigError {
                reason: "intake.timeout_secs must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
