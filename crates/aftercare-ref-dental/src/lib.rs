//! # aftercare-ref-dental
//!
//! Dental reference runtime for the aftercare workflow orchestrator.
//!
//! Wires the concrete pieces around `aftercare-core`:
//!
//! - `processors`: check-in, extraction, care and summary stages over any
//!   `ModelGateway`, with risk taken from the TOML rule table
//! - `offline_model`: a deterministic keyword model, so everything runs
//!   without network access
//! - `inbox` and `mock_data`: scripted and file-backed intake, a console SMS
//!   gateway, the sample patient
//! - `config`: the TOML application config
//! - `scenarios`: runnable walk-throughs (fine reply, severe bleeding,
//!   malformed model output, invalid destination, intake round)
//!
//! All patient data is fictional.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use aftercare_ref_dental::{dental_processors, OfflineModel};
//!
//! let processors = dental_processors(Arc::new(OfflineModel), config.risk_rules()?)?;
//! let orchestrator = Orchestrator::new(processors, Box::new(journal), config.orchestrator_config());
//! ```

pub mod config;
pub mod inbox;
pub mod mock_data;
pub mod offline_model;
pub mod processors;
pub mod prompts;
pub mod scenarios;

pub use config::AppConfig;
pub use inbox::{JsonInbox, ScriptedIntake};
pub use mock_data::ConsoleDelivery;
pub use offline_model::{analyze_response, OfflineModel};
pub use processors::dental_processors;
