//! Prompt assembly for the model-backed stage processors.
//!
//! Every prompt opens with a `[task: ...]` line naming the stage, followed by
//! `Label: value` lines for the patient context. Free text supplied by the
//! patient or an earlier stage is wrapped in `<tag>...</tag>` blocks so it
//! cannot be mistaken for an instruction line.

use chrono::NaiveDate;

use aftercare_contracts::{
    error::{AftercareError, AftercareResult},
    patient::Patient,
    risk::RiskAssessment,
    symptoms::SymptomExtraction,
};

/// Which stage a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTask {
    CheckIn,
    SymptomExtraction,
    CareInstructions,
    ClinicSummary,
}

impl PromptTask {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check-in",
            Self::SymptomExtraction => "symptom-extraction",
            Self::CareInstructions => "care-instructions",
            Self::ClinicSummary => "clinic-summary",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        [
            Self::CheckIn,
            Self::SymptomExtraction,
            Self::CareInstructions,
            Self::ClinicSummary,
        ]
        .into_iter()
        .find(|task| task.as_str() == s)
    }
}

/// A system instruction and the prompt sent with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

// ── Builders ──────────────────────────────────────────────────────────────────

pub fn check_in(patient: &Patient, today: NaiveDate) -> Prompt {
    let system = "You are a friendly dental care coordinator following up with a patient after \
                  a procedure. Write one short, warm text message. Ask how they are feeling and \
                  invite them to describe pain on a 0-10 scale, bleeding, swelling, fever and any \
                  medication taken. Do not give medical advice in this message.";

    let user = format!(
        "{}\n{}\nDays since procedure: {}\n\nWrite the check-in message.",
        task_line(PromptTask::CheckIn),
        patient_block(patient),
        patient.days_since_procedure(today).max(0),
    );

    Prompt {
        system: system.to_string(),
        user,
    }
}

pub fn symptom_extraction(patient: &Patient, response: &str) -> Prompt {
    let system = "You are a dental professional analysing a patient's reply after a procedure. \
                  Extract pain (0-10), bleeding and swelling (none, mild, moderate, severe, or \
                  \"not mentioned\"), fever, medication taken, other symptoms, the patient's \
                  concerns and the overall sentiment (positive, negative, concerned, neutral). \
                  Infer severity from intensity words such as \"significant\", \"a lot\", \
                  \"very\" or \"terrible\". A reply like \"Fine\" reports no symptoms: use 0 and \
                  \"none\". Use \"not mentioned\" only when the reply describes other symptoms \
                  but says nothing about that one.";

    let user = format!(
        "{task}\n{patient}\n\n\
         Example reply: \"Doing okay, just a little sore. Took some ibuprofen this morning.\"\n\
         Example output: {{\"pain_level\": 3, \"bleeding\": \"not mentioned\", \"swelling\": \"not mentioned\", \
         \"fever\": false, \"medication_taken\": \"ibuprofen\", \"other_symptoms\": [], \
         \"patient_concerns\": \"none\", \"overall_sentiment\": \"positive\"}}\n\n\
         <response>\n{response}\n</response>\n\n\
         Reply with ONLY the JSON object, no other text.",
        task = task_line(PromptTask::SymptomExtraction),
        patient = patient_block(patient),
        response = response.trim(),
    );

    Prompt {
        system: system.to_string(),
        user,
    }
}

pub fn care_instructions(
    patient: &Patient,
    symptoms: &SymptomExtraction,
    risk: &RiskAssessment,
) -> AftercareResult<Prompt> {
    let system = "You are a dental professional writing follow-up care instructions addressed \
                  directly to the patient. Be specific to the symptoms reported, plain and \
                  reassuring. If the risk level is High, tell the patient to contact the clinic \
                  immediately.";

    let user = format!(
        "{}\n{}\nSymptoms: {}\nRisk level: {}\nJustification: {}\n\nWrite the care instructions.",
        task_line(PromptTask::CareInstructions),
        patient_block(patient),
        symptoms_line(symptoms)?,
        risk.risk_level,
        risk.justification,
    );

    Ok(Prompt {
        system: system.to_string(),
        user,
    })
}

pub fn clinic_summary(
    patient: &Patient,
    symptoms: &SymptomExtraction,
    risk: &RiskAssessment,
    care_instructions: &str,
) -> AftercareResult<Prompt> {
    let system = "You are a dental assistant writing a concise summary for clinic staff. Cover the \
                  reported symptoms, the assessed risk and its justification, the instructions \
                  given to the patient, and the recommended clinic action.";

    let user = format!(
        "{}\n{}\nSymptoms: {}\nRisk level: {}\nJustification: {}\n\n<care>\n{}\n</care>\n\nWrite the clinic summary.",
        task_line(PromptTask::ClinicSummary),
        patient_block(patient),
        symptoms_line(symptoms)?,
        risk.risk_level,
        risk.justification,
        care_instructions.trim(),
    );

    Ok(Prompt {
        system: system.to_string(),
        user,
    })
}

// ── Readers ───────────────────────────────────────────────────────────────────

/// The task named on a prompt's `[task: ...]` line.
pub fn task_of(prompt: &str) -> Option<PromptTask> {
    let start = prompt.find("[task:")? + "[task:".len();
    let end = start + prompt[start..].find(']')?;
    PromptTask::parse(prompt[start..end].trim())
}

/// The value of the first `label: value` line.
pub fn labelled<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    let prefix = format!("{label}:");
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .map(str::trim)
}

/// The text between `<tag>` and `</tag>`, trimmed.
pub fn tagged<'a>(prompt: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = prompt.find(&open)? + open.len();
    let end = start + prompt[start..].find(&close)?;
    Some(prompt[start..end].trim())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn task_line(task: PromptTask) -> String {
    format!("[task: {}]", task.as_str())
}

fn patient_block(patient: &Patient) -> String {
    let history = if patient.medical_history.trim().is_empty() {
        "none recorded"
    } else {
        patient.medical_history.trim()
    };
    format!(
        "Patient: {}\nPatient ID: {}\nProcedure: {}\nProcedure date: {}\nMedical history: {}",
        patient.name,
        patient.id(),
        patient.procedure,
        patient.procedure_date.format("%Y-%m-%d"),
        history,
    )
}

/// Compact JSON keeps the symptoms on one line.
fn symptoms_line(symptoms: &SymptomExtraction) -> AftercareResult<String> {
    serde_json::to_string(symptoms).map_err(|e| AftercareError::SchemaValidation {
        reason: format!("symptoms cannot be serialized for the prompt: {e}"),
    })
}
