//! # aftercare-verify
//!
//! Output checks between the model and the interaction record:
//!
//! - [`SymptomDecoder`] validates symptom extraction output against a JSON
//!   Schema before decoding it, and records anything else as a parse failure.
//! - [`escalation`] guarantees that high-risk care instructions always carry
//!   a directive to contact the clinic.

pub mod engine;
pub mod escalation;

pub use engine::{symptom_schema, SymptomDecoder};
pub use escalation::{ensure_escalation, has_escalation};
