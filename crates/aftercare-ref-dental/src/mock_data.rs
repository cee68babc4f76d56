//! Fictional patients, sample replies and a console delivery gateway.
//!
//! Nothing here contacts an external system. `ConsoleDelivery` stands in for
//! an SMS provider: it validates destinations the way a provider would,
//! splits text into segments and prints them.

use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate};
use tracing::info;

use aftercare_contracts::{
    intake::{is_valid_phone_number, SegmentId},
    patient::Patient,
};
use aftercare_core::traits::DeliveryGateway;

// ── Patients ──────────────────────────────────────────────────────────────────

pub const SAMPLE_PHONE: &str = "+15551234567";

/// John Doe, two days after a wisdom tooth extraction as of `today`.
pub fn sample_patient(today: NaiveDate) -> Patient {
    Patient::new(
        "P12345",
        "John Doe",
        "Wisdom Tooth Extraction",
        today - Duration::days(2),
        "john.doe@example.com",
        "No significant medical history. No known allergies.",
    )
    .with_phone_number(SAMPLE_PHONE)
}

// ── Sample replies ────────────────────────────────────────────────────────────

pub const FINE_REPLY: &str = "Fine";

pub const SEVERE_BLEEDING_REPLY: &str =
    "Im bleeding a significant amount still. Very concerned and in pain";

pub const MIXED_RECOVERY_REPLY: &str = "Hi, thanks for checking in. I'm feeling okay but still have \
some pain, about a 6 out of 10. The bleeding has mostly stopped, just a little bit when I brush my \
teeth. My cheek is still pretty swollen though. I've been taking the prescribed pain medication. \
I'm a bit worried about the swelling - is it normal for it to still be this swollen after 2 days?";

// ── Delivery ──────────────────────────────────────────────────────────────────

/// Prints each outbound segment and records what was sent.
#[derive(Clone)]
pub struct ConsoleDelivery {
    segment_length: usize,
    sent: Arc<Mutex<Vec<(String, String)>>>,
    quiet: bool,
}

impl ConsoleDelivery {
    pub fn new(segment_length: usize) -> Self {
        Self {
            segment_length: segment_length.max(1),
            sent: Arc::new(Mutex::new(Vec::new())),
            quiet: false,
        }
    }

    /// Record without printing.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Every `(destination, segment)` pair sent so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl DeliveryGateway for ConsoleDelivery {
    fn send(&self, destination: &str, text: &str) -> Vec<SegmentId> {
        let segments = split_segments(text, self.segment_length);
        let mut sent = self.sent.lock().unwrap_or_else(|p| p.into_inner());
        let total = segments.len();
        let ids: Vec<SegmentId> = segments
            .into_iter()
            .enumerate()
            .map(|(i, segment)| {
                let id = SegmentId(format!("SM{}", uuid::Uuid::new_v4().simple()));
                if !self.quiet {
                    println!("  [sms {}/{} → {destination}] {segment}", i + 1, total);
                }
                sent.push((destination.to_string(), segment));
                id
            })
            .collect();
        info!(destination = %destination, segments = ids.len(), "console delivery");
        ids
    }

    fn validate_destination(&self, destination: &str) -> bool {
        is_valid_phone_number(destination)
    }
}

/// Split on whitespace into segments of at most `limit` characters. A word
/// longer than `limit` is broken across segments.
pub fn split_segments(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut segments = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > limit {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            segments.push(word.drain(..limit).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > limit {
            segments.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
