//! # aftercare-core
//!
//! The deterministic, resumable orchestration runtime for post-operative
//! dental follow-up.
//!
//! This crate provides:
//! - The collaborator and stage-processor traits
//! - The `Orchestrator` that runs stages against interaction records in
//!   workflow order
//! - `DeliveryService`, which never sends to an unvalidated destination
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aftercare_core::{Orchestrator, StageProcessors, config::OrchestratorConfig};
//!
//! let orchestrator = Orchestrator::new(processors, journal, OrchestratorConfig::default());
//! let run = orchestrator.process_remaining(&patient, record)?;
//! ```

pub mod config;
pub mod delivery;
pub mod intake;
pub mod orchestrator;
pub mod traits;

pub use delivery::DeliveryService;
pub use orchestrator::{IntakeRun, Orchestrator, StageProcessors};
