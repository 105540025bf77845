use serde::{Deserialize, Serialize};

/// One multiple-choice quiz item as exchanged with the provider and the browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionRecord {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer", default)]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl QuestionRecord {
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            options,
            correct_answer: correct_answer.into(),
            explanation: explanation.into(),
        }
    }

    pub fn is_correct(&self, selected: &str) -> bool {
        self.correct_answer == selected
    }

    pub fn has_explanation(&self) -> bool {
        !self.explanation.trim().is_empty()
    }

    /// Whether an answer can be checked against this record: at least two
    /// options and a non-blank correct answer that is one of them.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2
            && !self.correct_answer.trim().is_empty()
            && self.options.iter().any(|o| *o == self.correct_answer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedQuestions {
    pub questions: Vec<QuestionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InformationalText {
    #[serde(rename = "informationalText")]
    pub informational_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub issue: String,
}

pub fn validate_record(record: &QuestionRecord) -> Result<(), Vec<ValidationIssue>> {
    let mut issues = Vec::new();
    if record.prompt.trim().is_empty() {
        issues.push(ValidationIssue {
            field: "question".into(),
            issue: "must not be empty".into(),
        });
    }
    if record.options.len() < 2 {
        issues.push(ValidationIssue {
            field: "options".into(),
            issue: "must contain at least 2 options".into(),
        });
    }
    for (j, opt) in record.options.iter().enumerate() {
        if opt.trim().is_empty() {
            issues.push(ValidationIssue {
                field: format!("options[{j}]"),
                issue: "must not be empty".into(),
            });
        }
    }
    if record.correct_answer.trim().is_empty() {
        issues.push(ValidationIssue {
            field: "correctAnswer".into(),
            issue: "must not be empty".into(),
        });
    } else if !record.options.iter().any(|o| *o == record.correct_answer) {
        issues.push(ValidationIssue {
            field: "correctAnswer".into(),
            issue: "must reference one of the options".into(),
        });
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
