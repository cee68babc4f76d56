//! A deterministic, keyword-driven `ModelGateway` for offline runs.
//!
//! `OfflineModel` reads the `[task: ...]` line of each prompt and answers
//! the way a language model is asked to, without any network access:
//!
//! - check-in: a templated follow-up message
//! - symptom extraction: JSON produced by `analyze_response`
//! - care instructions and clinic summary: text assembled from the symptoms
//!   and risk carried in the prompt
//!
//! Severity inference works clause by clause. A category mentioned next to
//! an intensity word ("significant", "a lot", "very", "terrible") is graded
//! severe; softeners ("a little", "some", "mostly") grade it mild; a
//! negation grades it none, except a negated stop ("hasn't stopped") which
//! means the symptom persists and grades it severe. A reply that discusses no symptom at all reports
//! none for everything, while a symptomatic reply leaves the categories it
//! skipped as "not mentioned".

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    risk::RiskLevel,
    symptoms::{ExtractedSymptoms, Sentiment, Severity, SymptomExtraction},
};
use aftercare_core::traits::ModelGateway;
use aftercare_verify::has_escalation;

use crate::prompts::{labelled, tagged, task_of, PromptTask};

// ── Vocabulary ────────────────────────────────────────────────────────────────

const BLEEDING: &[&str] = &["bleed", "blood"];
const SWELLING: &[&str] = &["swell", "swollen", "puffy"];
const SWELLING_PHRASES: &[&str] = &["face is huge", "cheek is huge", "face is puffed"];
const FEVER: &[&str] = &["fever", "temperature", "chills"];
const PAIN: &[&str] = &["pain", "hurt", "sore", "ache", "aching", "throb", "tender"];

const HARD_PAIN: &[&str] = &[
    "barely function",
    "can't function",
    "cant function",
    "unbearable",
    "excruciating",
    "worst pain",
];
const SEVERE: &[&str] = &[
    "significant",
    "significantly",
    "a lot",
    "lots",
    "so much",
    "terrible",
    "terribly",
    "really bad",
    "so bad",
    "very",
    "severe",
    "heavy",
    "heavily",
    "huge",
    "extreme",
    "nonstop",
    "soaking",
    "awful",
];
const MILD: &[&str] = &[
    "a little", "little bit", "slight", "slightly", "some", "a bit", "mild", "minor", "mostly", "tiny",
];
const MODERATE: &[&str] = &["pretty", "quite", "moderate", "fairly", "bad", "still"];
/// A symptom that keeps going. Checked before `NEGATION`, whose words
/// ("hasn't", "stopped") these phrases contain.
const PERSISTENT: &[&str] = &[
    "won't stop",
    "wont stop",
    "doesn't stop",
    "doesnt stop",
    "didn't stop",
    "didnt stop",
    "hasn't stopped",
    "hasnt stopped",
    "haven't stopped",
    "havent stopped",
    "not stopped",
    "not stopping",
    "isn't stopping",
    "won't go away",
    "hasn't gone away",
    "not going away",
    "keeps bleeding",
    "still bleeding",
];
const NEGATION: &[&str] = &[
    "no", "not", "none", "without", "stopped", "gone", "don't", "dont", "doesn't", "didn't",
    "haven't", "hasn't", "isn't", "never", "zero",
];

const CONCERN: &[&str] = &[
    "worried", "worry", "concerned", "concern", "scared", "afraid", "terrified", "anxious",
    "nervous", "is it normal", "should i",
];
const DISTRESS: &[&str] = &[
    "terrified", "awful", "terrible", "miserable", "horrible", "barely function", "unbearable",
];
const POSITIVE: &[&str] = &["fine", "okay", "ok", "good", "great", "better", "well", "alright"];

/// Words next to a number that mean it is not a pain score.
const UNITS: &[&str] = &[
    "day", "days", "hour", "hours", "hr", "hrs", "night", "nights", "week", "weeks", "minute",
    "minutes", "am", "pm", "mg", "times", "pills", "tablets", "teeth", "tooth", "dose", "doses",
];

/// A bare number counts as a score only this close after a pain word.
const SCORE_WINDOW: usize = 4;

/// Spoken form → recorded medication name. Longer phrases first.
const MEDICATIONS: &[(&str, &str)] = &[
    ("prescribed pain medication", "prescribed pain medication"),
    ("pain medication", "pain medication"),
    ("pain meds", "pain medication"),
    ("painkillers", "painkillers"),
    ("painkiller", "painkillers"),
    ("ibuprofen", "ibuprofen"),
    ("advil", "ibuprofen"),
    ("motrin", "ibuprofen"),
    ("tylenol", "acetaminophen"),
    ("acetaminophen", "acetaminophen"),
    ("paracetamol", "paracetamol"),
    ("naproxen", "naproxen"),
    ("aleve", "naproxen"),
    ("aspirin", "aspirin"),
    ("amoxicillin", "amoxicillin"),
    ("antibiotics", "antibiotics"),
    ("antibiotic", "antibiotics"),
    ("codeine", "codeine"),
    ("hydrocodone", "hydrocodone"),
    ("oxycodone", "oxycodone"),
    ("chlorhexidine", "chlorhexidine rinse"),
];

const OTHER_SYMPTOMS: &[(&str, &str)] = &[
    ("barely function", "difficulty functioning"),
    ("can't function", "difficulty functioning"),
    ("nausea", "nausea"),
    ("nauseous", "nausea"),
    ("threw up", "vomiting"),
    ("vomiting", "vomiting"),
    ("bad taste", "bad taste"),
    ("bad breath", "bad breath"),
    ("numb", "numbness"),
    ("numbness", "numbness"),
    ("headache", "headache"),
    ("dizzy", "dizziness"),
    ("pus", "pus discharge"),
    ("trouble swallowing", "difficulty swallowing"),
    ("difficulty swallowing", "difficulty swallowing"),
    ("hard to swallow", "difficulty swallowing"),
    ("can't open my mouth", "limited jaw opening"),
    ("stiff jaw", "jaw stiffness"),
    ("jaw is stiff", "jaw stiffness"),
    ("dry socket", "possible dry socket"),
];

// ── Gateway ───────────────────────────────────────────────────────────────────

/// Answers every prompt locally; never fails for a recognised task.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineModel;

impl ModelGateway for OfflineModel {
    fn complete(&self, _system_instructions: &str, prompt: &str) -> AftercareResult<String> {
        match task_of(prompt) {
            Some(PromptTask::CheckIn) => Ok(check_in_text(prompt)),
            Some(PromptTask::SymptomExtraction) => {
                let response = tagged(prompt, "response").unwrap_or_default();
                serde_json::to_string_pretty(&analyze_response(response)).map_err(|e| {
                    AftercareError::gateway("offline-model", format!("cannot encode symptoms: {e}"))
                })
            }
            Some(PromptTask::CareInstructions) => Ok(care_text(prompt)),
            Some(PromptTask::ClinicSummary) => Ok(summary_text(prompt)),
            None => Err(AftercareError::gateway(
                "offline-model",
                "prompt does not name a known task",
            )),
        }
    }
}

// ── Symptom analysis ──────────────────────────────────────────────────────────

/// One sentence of the reply, normalized for phrase matching.
struct Sentence {
    original: String,
    whole: String,
    clauses: Vec<String>,
}

impl Sentence {
    fn clause_with(&self, mentions: impl Fn(&str) -> bool) -> Option<&str> {
        self.clauses.iter().map(String::as_str).find(|c| mentions(c))
    }
}

/// Decode a free-text patient reply into structured symptoms.
pub fn analyze_response(text: &str) -> ExtractedSymptoms {
    let sentences = split_sentences(text);
    let whole = normalize(text);

    let bleeding = max_severity(&sentences, |c| has_stem(c, BLEEDING));
    let swelling = max_severity(&sentences, |c| {
        has_stem(c, SWELLING) || has_any(c, SWELLING_PHRASES)
    });
    let fever = fever_reported(&sentences);
    let pain = pain_level(&sentences);
    let other_symptoms = other_symptoms(&whole);

    let discussed = bleeding.is_some()
        || swelling.is_some()
        || fever.is_some()
        || pain.is_some()
        || !other_symptoms.is_empty();
    let unmentioned = if discussed {
        Severity::NotMentioned
    } else {
        Severity::None
    };

    let bleeding = bleeding.unwrap_or(unmentioned);
    let swelling = swelling.unwrap_or(unmentioned);
    let fever = fever.unwrap_or(false);
    let pain_level = pain.unwrap_or(0);

    let concerns: Vec<&str> = sentences
        .iter()
        .filter(|s| has_any(&s.whole, CONCERN))
        .map(|s| s.original.as_str())
        .collect();

    let worst = bleeding.rank().max(swelling.rank());
    let overall_sentiment = if pain_level >= 7 || has_any(&whole, DISTRESS) {
        Sentiment::Negative
    } else if !concerns.is_empty() || fever || worst >= Severity::Severe.rank() {
        Sentiment::Concerned
    } else if !discussed || (has_any(&whole, POSITIVE) && worst <= Severity::Mild.rank() && pain_level <= 3) {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };

    ExtractedSymptoms {
        pain_level,
        bleeding,
        swelling,
        fever,
        medication_taken: medications(&whole),
        other_symptoms,
        patient_concerns: if concerns.is_empty() {
            "none".to_string()
        } else {
            capitalize(&concerns.join("; "))
        },
        overall_sentiment,
    }
}

/// Highest severity over every sentence that mentions the category.
fn max_severity(sentences: &[Sentence], mentions: impl Fn(&str) -> bool + Copy) -> Option<Severity> {
    sentences
        .iter()
        .filter_map(|s| grade(s, mentions))
        .max_by_key(|severity| severity.rank())
}

/// The clause naming the symptom decides first; the whole sentence is the
/// fallback when that clause carries no modifier.
fn grade(sentence: &Sentence, mentions: impl Fn(&str) -> bool) -> Option<Severity> {
    let clause = sentence.clause_with(mentions)?;
    let severity = if has_any(clause, SEVERE) {
        Severity::Severe
    } else if has_any(clause, MILD) {
        Severity::Mild
    } else if has_any(clause, PERSISTENT) {
        Severity::Severe
    } else if has_any(clause, NEGATION) {
        Severity::None
    } else if has_any(clause, MODERATE) {
        Severity::Moderate
    } else if has_any(&sentence.whole, SEVERE) {
        Severity::Severe
    } else if has_any(&sentence.whole, MILD) {
        Severity::Mild
    } else {
        Severity::Moderate
    };
    Some(severity)
}

/// `Some(true)` if any sentence reports fever, `Some(false)` if it is only
/// ever denied, `None` if never discussed.
fn fever_reported(sentences: &[Sentence]) -> Option<bool> {
    sentences
        .iter()
        .filter_map(|s| s.clause_with(|c| has_stem(c, FEVER)))
        .map(|clause| has_any(clause, PERSISTENT) || !has_any(clause, NEGATION))
        .reduce(|a, b| a || b)
}

/// An explicit score anywhere wins; otherwise the worst graded mention.
fn pain_level(sentences: &[Sentence]) -> Option<u8> {
    let explicit = sentences.iter().filter_map(explicit_pain).max();
    if explicit.is_some() {
        return explicit;
    }
    sentences.iter().filter_map(graded_pain).max()
}

/// A score written as "N/10" or "N out of 10", or a bare number right after
/// a pain word ("pain is about a 6"). Numbers beside a unit ("day 3",
/// "2 days") never count.
fn explicit_pain(sentence: &Sentence) -> Option<u8> {
    let text = strip_medication_names(&sentence.whole);
    let words: Vec<&str> = text.split_whitespace().collect();

    for (i, word) in words.iter().enumerate() {
        if let Some(score) = word.strip_suffix("/10").and_then(|n| n.parse::<u8>().ok()) {
            return Some(score.min(ExtractedSymptoms::MAX_PAIN));
        }
        let Ok(score) = word.parse::<u8>() else {
            continue;
        };
        if score > ExtractedSymptoms::MAX_PAIN {
            continue;
        }
        if words.get(i + 1..i + 4) == Some(&["out", "of", "10"][..]) {
            return Some(score);
        }

        let unit_before = i > 0 && UNITS.contains(&words[i - 1]);
        let unit_after = words.get(i + 1).is_some_and(|next| UNITS.contains(next));
        if unit_before || unit_after {
            continue;
        }
        let pain_before = words[i.saturating_sub(SCORE_WINDOW)..i]
            .iter()
            .any(|w| is_pain_word(w));
        let pain_after = words.get(i + 1).is_some_and(|w| is_pain_word(w));
        if pain_before || pain_after {
            return Some(score);
        }
    }
    None
}

fn is_pain_word(word: &str) -> bool {
    PAIN.iter().any(|stem| word.starts_with(stem))
}

fn graded_pain(sentence: &Sentence) -> Option<u8> {
    let whole = strip_medication_names(&sentence.whole);
    let clause = sentence
        .clauses
        .iter()
        .map(|c| strip_medication_names(c))
        .find(|c| has_stem(c, PAIN))?;

    let level = if has_any(&clause, HARD_PAIN) || has_any(&whole, HARD_PAIN) {
        9
    } else if has_any(&clause, SEVERE) {
        7
    } else if has_any(&clause, MILD) {
        3
    } else if has_any(&clause, PERSISTENT) {
        7
    } else if has_any(&clause, NEGATION) {
        0
    } else if has_any(&clause, MODERATE) {
        5
    } else if has_any(&whole, SEVERE) {
        7
    } else if has_any(&whole, MILD) || has_stem(&clause, &["sore"]) {
        3
    } else {
        4
    };
    Some(level)
}

fn medications(whole: &str) -> String {
    let mut found: Vec<&str> = Vec::new();
    let mut remaining = whole.to_string();
    for (spoken, name) in MEDICATIONS {
        let phrase = format!(" {spoken} ");
        if remaining.contains(&phrase) {
            remaining = remaining.replace(&phrase, " ");
            if !found.contains(name) {
                found.push(*name);
            }
        }
    }
    if found.is_empty() {
        "none".to_string()
    } else {
        found.join(", ")
    }
}

fn other_symptoms(whole: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (phrase, label) in OTHER_SYMPTOMS {
        if has_any(whole, &[*phrase]) && !found.iter().any(|f| f == label) {
            found.push(label.to_string());
        }
    }
    found
}

// ── Text helpers ──────────────────────────────────────────────────────────────

fn split_sentences(text: &str) -> Vec<Sentence> {
    text.split(['.', '!', '?', '\n', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|original| Sentence {
            original: original.to_string(),
            whole: normalize(original),
            clauses: split_clauses(original),
        })
        .collect()
}

fn split_clauses(sentence: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    for piece in sentence.split([',', '-']) {
        let mut current: Vec<String> = Vec::new();
        for word in words(piece) {
            if matches!(word.as_str(), "and" | "but" | "though" | "although") {
                if !current.is_empty() {
                    clauses.push(pad(&current));
                    current.clear();
                }
            } else {
                current.push(word);
            }
        }
        if !current.is_empty() {
            clauses.push(pad(&current));
        }
    }
    clauses
}

/// Lowercase words separated by single spaces, padded with one space on
/// each side so phrases can be matched on word boundaries.
fn normalize(text: &str) -> String {
    pad(&words(text))
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '/'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn pad(words: &[String]) -> String {
    format!(" {} ", words.join(" "))
}

fn has_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases
        .iter()
        .any(|phrase| normalized.contains(&format!(" {phrase} ")))
}

fn has_stem(normalized: &str, stems: &[&str]) -> bool {
    normalized
        .split_whitespace()
        .any(|word| stems.iter().any(|stem| word.starts_with(stem)))
}

/// "pain medication" names a drug, not a symptom.
fn strip_medication_names(normalized: &str) -> String {
    MEDICATIONS
        .iter()
        .filter(|(spoken, _)| spoken.contains("pain"))
        .fold(normalized.to_string(), |text, (spoken, _)| {
            text.replace(&format!(" {spoken} "), " medication ")
        })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn first_name(prompt: &str) -> &str {
    labelled(prompt, "Patient")
        .and_then(|name| name.split_whitespace().next())
        .unwrap_or("there")
}

// ── Text stages ───────────────────────────────────────────────────────────────

fn check_in_text(prompt: &str) -> String {
    let procedure = labelled(prompt, "Procedure").unwrap_or("procedure").to_lowercase();
    let when = match labelled(prompt, "Days since procedure").and_then(|d| d.parse::<i64>().ok()) {
        Some(0) | None => "on the day of".to_string(),
        Some(1) => "one day after".to_string(),
        Some(days) => format!("{days} days after"),
    };
    format!(
        "Hi {}, this is your dental care team checking in {when} your {procedure}. How are you \
         feeling? Please tell us about any pain (0-10), bleeding, swelling or fever, and whether \
         you have taken any medication.",
        first_name(prompt)
    )
}

fn prompt_symptoms(prompt: &str) -> Option<SymptomExtraction> {
    labelled(prompt, "Symptoms").and_then(|line| serde_json::from_str(line).ok())
}

fn prompt_risk(prompt: &str) -> RiskLevel {
    labelled(prompt, "Risk level")
        .and_then(|level| RiskLevel::ALL.into_iter().find(|l| l.as_str() == level))
        .unwrap_or(RiskLevel::Unknown)
}

fn care_text(prompt: &str) -> String {
    let mut lines = vec![format!(
        "Hi {}, thank you for letting us know how you are doing.",
        first_name(prompt)
    )];

    if let Some(s) = prompt_symptoms(prompt).as_ref().and_then(SymptomExtraction::parsed) {
        if s.bleeding.rank() > 0 {
            lines.push(
                "For the bleeding, bite firmly on a clean, damp gauze pad for 30 minutes and avoid \
                 spitting or rinsing hard."
                    .to_string(),
            );
        }
        if s.swelling.rank() > 0 {
            lines.push(
                "For the swelling, hold a cold pack against your cheek, 20 minutes on and 20 minutes off."
                    .to_string(),
            );
        }
        if s.pain_level > 0 {
            lines.push(
                "For pain, take your pain medication as directed and do not exceed the dose on the label."
                    .to_string(),
            );
        }
        if s.fever {
            lines.push("Rest, drink plenty of fluids and keep an eye on your temperature.".to_string());
        }
    }

    lines.push(
        "Keep to soft foods, avoid straws and smoking, and rinse gently with warm salt water after meals."
            .to_string(),
    );

    match prompt_risk(prompt) {
        RiskLevel::Low => lines.push("Your recovery looks on track.".to_string()),
        RiskLevel::Medium => lines.push(
            "Some of your symptoms need watching. If they get worse or have not improved within \
             24 hours, call the clinic."
                .to_string(),
        ),
        RiskLevel::High => lines.push(
            "Your symptoms need to be seen promptly. Please call the clinic today.".to_string(),
        ),
        RiskLevel::Unknown => {}
    }

    lines.join("\n")
}

fn summary_text(prompt: &str) -> String {
    let patient = labelled(prompt, "Patient").unwrap_or("Unknown patient");
    let patient_id = labelled(prompt, "Patient ID").unwrap_or("?");
    let procedure = labelled(prompt, "Procedure").unwrap_or("procedure");
    let procedure_date = labelled(prompt, "Procedure date").unwrap_or("unknown date");
    let risk = prompt_risk(prompt);
    let justification = labelled(prompt, "Justification").unwrap_or("none given");

    let reported = match prompt_symptoms(prompt) {
        Some(SymptomExtraction::Parsed(s)) => format!(
            "Reported: pain {}/10, bleeding {}, swelling {}, fever {}. Medication: {}. Other symptoms: {}. Concerns: {}. Sentiment: {}.",
            s.pain_level,
            s.bleeding,
            s.swelling,
            if s.fever { "yes" } else { "no" },
            s.medication_taken,
            if s.other_symptoms.is_empty() {
                "none".to_string()
            } else {
                s.other_symptoms.join(", ")
            },
            s.patient_concerns,
            s.overall_sentiment,
        ),
        Some(SymptomExtraction::Failed(_)) | None => {
            "Reported: symptom extraction failed; review the patient's reply manually.".to_string()
        }
    };

    let escalated = tagged(prompt, "care").is_some_and(has_escalation);
    let action = match risk {
        RiskLevel::Low => "Action: routine follow-up only.",
        RiskLevel::Medium => "Action: review within 24 hours and consider a call-back.",
        RiskLevel::High => "Action: urgent clinician call-back.",
        RiskLevel::Unknown => "Action: manual review required; automated assessment unavailable.",
    };

    format!(
        "Post-op check-in for {patient} ({patient_id}), {procedure} on {procedure_date}.\n\
         {reported}\n\
         Risk: {risk}. {justification}\n\
         Patient {} to contact the clinic.\n\
         {action}",
        if escalated { "was told" } else { "was not asked" },
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
