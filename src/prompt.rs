//! Prompt templates for the direct analyzer.

use crate::language::Language;

/// What is known about the patient, used to tailor the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientContext {
    pub age: Option<u32>,
    pub history: Option<String>,
}

impl PatientContext {
    fn age_text(&self) -> String {
        self.age
            .map(|age| format!("{} years", age))
            .unwrap_or_else(|| "unknown age".to_string())
    }

    fn history_text(&self) -> &str {
        self.history
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or("none provided")
    }
}

/// Prompt asking for a plain-language reading of a lab report.
pub fn lab_report_prompt(extracted_text: &str, language: Language, patient: &PatientContext) -> String {
    format!(
        r#"Summarize this lab report for a patient ({age}; past health records: {history}).

Instructions:
1. Skip non-medical details such as names, addresses and dates.
2. Find the test results and keep only the values outside their reference range.
3. For each abnormal value give the test name and measured value, whether it is high or low, and a short layman explanation of what it may indicate.
4. Add a one-sentence summary of the main findings.
5. Only for concerning results, suggest a brief next step such as seeing a doctor.
6. No jargon, no markdown, plain text only.

Write the answer in {language}.

Lab report text:
{text}"#,
        age = patient.age_text(),
        history = patient.history_text(),
        language = language.backend_id(),
        text = extracted_text.trim(),
    )
}

/// Prompt asking for an explanation of a medicine label.
pub fn medicine_prompt(extracted_text: &str, language: Language, patient: &PatientContext) -> String {
    format!(
        r#"Explain this medicine label for a patient ({age}; past health records: {history}).

Instructions:
1. Identify the drug name, what it is used for and any warnings.
2. Describe its benefits, risks and notable side effects or interactions, taking the patient's history into account.
3. Suggest one supportive Ayurvedic practice (diet, yoga or similar) where appropriate.
4. Keep it short, in plain text, using exactly these sections:
   Medicine: name and purpose.
   Effects: benefits, risks, interactions.
   Ayurvedic Option: one alternative or practice.
   Next Steps: brief advice.
5. Be cautious and always encourage consulting a doctor.

Write the answer in {language}.

Label text:
{text}"#,
        age = patient.age_text(),
        history = patient.history_text(),
        language = language.backend_id(),
        text = extracted_text.trim(),
    )
}
