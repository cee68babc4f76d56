//! Response intake and delivery data types.
//!
//! The intake source is keyed by destination (a phone number) and reports
//! every message received from it plus whether the destination has already
//! been processed. Delivery reports one identifier per sent segment.

use serde::{Deserialize, Serialize};

/// One inbound message from a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeMessage {
    /// Timestamp as reported by the intake source.
    pub timestamp: String,
    pub message: String,
}

/// Everything the intake source holds for one destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub processed: bool,
    /// Messages in arrival order.
    pub responses: Vec<IntakeMessage>,
}

impl IntakeRecord {
    /// The most recent message, if the destination still awaits processing.
    pub fn latest_unprocessed(&self) -> Option<&IntakeMessage> {
        if self.processed {
            None
        } else {
            self.responses.last()
        }
    }
}

/// Identifier of one delivered message segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub String);

/// Result of a delivery attempt to a validated destination.
///
/// An empty `segments` list means the gateway could not deliver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub destination: String,
    pub segments: Vec<SegmentId>,
}

impl DeliveryReceipt {
    pub fn delivered(&self) -> bool {
        !self.segments.is_empty()
    }
}

/// True for `+` followed by 8 to 15 digits, e.g. `+15551234567`.
pub fn is_valid_phone_number(destination: &str) -> bool {
    match destination.strip_prefix('+') {
        Some(digits) => {
            (8..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}
