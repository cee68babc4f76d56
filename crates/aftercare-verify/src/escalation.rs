//! Escalation guard for patient-facing care instructions.
//!
//! High-risk instructions must tell the patient to contact the clinic or
//! seek urgent care. A phrase only counts when no negation sits just before
//! it in the same clause, so "no need to call the clinic" is not a
//! directive. When a generator's text lacks one, a standard directive is
//! appended. Unknown risk gets a softer request to get in
//! touch, since the symptoms could not be graded.

use tracing::info;

use aftercare_contracts::risk::RiskLevel;

/// Phrases that count as an escalation directive (matched case-insensitively).
pub const ESCALATION_PHRASES: &[&str] = &[
    "contact the clinic",
    "call the clinic",
    "contact your dentist",
    "call your dentist",
    "contact your surgeon",
    "call your surgeon",
    "seek emergency",
    "seek urgent",
    "emergency room",
    "call 911",
];

/// Words that cancel a directive when they appear shortly before it.
const NEGATIONS: &[&str] = &[
    "no", "not", "don't", "dont", "never", "needn't", "neednt", "without", "shouldn't",
    "unnecessary", "nothing",
];

/// How many words before a phrase are checked for a negation.
const NEGATION_WINDOW: usize = 4;

pub const HIGH_RISK_DIRECTIVE: &str = "Your symptoms need prompt attention. Please contact the clinic \
immediately, and seek emergency care if bleeding does not stop with firm pressure or you have \
trouble breathing or swallowing.";

pub const UNKNOWN_RISK_DIRECTIVE: &str = "We could not fully assess your symptoms from your message. \
Please contact the clinic so a member of the care team can check in with you.";

/// True if `text` already contains an escalation directive that is not
/// negated.
pub fn has_escalation(text: &str) -> bool {
    let lower = text.to_lowercase().replace('\u{2019}', "'");
    ESCALATION_PHRASES.iter().any(|phrase| {
        lower
            .match_indices(phrase)
            .any(|(at, _)| !negated_before(&lower[..at]))
    })
}

/// True if the last few words of the clause ending at `prefix` negate what
/// follows.
fn negated_before(prefix: &str) -> bool {
    let clause = prefix
        .rsplit(['.', '!', '?', ',', ';', ':', '\n'])
        .next()
        .unwrap_or_default();
    clause
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .rev()
        .take(NEGATION_WINDOW)
        .any(|w| NEGATIONS.contains(&w))
}

/// Return `text` with an escalation directive appended where `risk` needs one.
pub fn ensure_escalation(text: &str, risk: RiskLevel) -> String {
    let directive = match risk {
        RiskLevel::High => HIGH_RISK_DIRECTIVE,
        RiskLevel::Unknown => UNKNOWN_RISK_DIRECTIVE,
        RiskLevel::Low | RiskLevel::Medium => return text.to_string(),
    };

    if has_escalation(text) {
        return text.to_string();
    }

    info!(risk_level = %risk, "care text lacked an escalation directive, appending");
    let body = text.trim_end();
    if body.is_empty() {
        directive.to_string()
    } else {
        format!("{body}\n\n{directive}")
    }
}
