//! Question and revision-text generation on top of a [`CompletionClient`].
//!
//! Provider output is untrusted. Question completions go through a two-stage
//! parser (strict JSON, then a fenced ```json block) and every record is
//! checked against `contracts/question_record.schema.json` before it is
//! handed out as a typed [`QuestionRecord`].

use crate::models::{validate_record, QuestionRecord};
use crate::provider::{CompletionClient, CompletionRequest, ProviderError};
use jsonschema::Validator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_QUESTION_COUNT: u32 = 5;

const RECORD_SCHEMA: &str = include_str!("../contracts/question_record.schema.json");

static FENCED_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("fenced block pattern is valid")
});

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Source text cannot be empty.")]
    EmptySourceText,
    #[error("Number of questions must be a positive integer.")]
    InvalidQuestionCount,
    #[error("Topic cannot be empty.")]
    EmptyTopic,
    #[error("Expansion query cannot be empty.")]
    EmptyQuery,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("completion is neither JSON nor contains a fenced JSON block")]
    ContentParse,
    #[error("completion has no `questions` array")]
    MissingQuestions,
    #[error("none of the {received} generated questions passed validation")]
    NoValidQuestions { received: usize },
}

impl GenerationError {
    /// Rejected before the provider was contacted.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            GenerationError::EmptySourceText
                | GenerationError::InvalidQuestionCount
                | GenerationError::EmptyTopic
                | GenerationError::EmptyQuery
        )
    }
}

pub fn compile_record_schema() -> anyhow::Result<Validator> {
    let schema: Value = serde_json::from_str(RECORD_SCHEMA)?;
    jsonschema::draft202012::new(&schema)
        .map_err(|e| anyhow::anyhow!("question record schema does not compile: {}", e))
}

pub fn question_prompt(source_text: &str, count: u32) -> String {
    format!(
        "Generate {count} multiple-choice questions based on the following text: \"{source_text}\"\n\
         Each question must include \"question\", \"options\" (an array of 4 strings), \
         \"correctAnswer\" (one of the options, copied exactly) and \"explanation\" fields.\n\
         Return the result as a single, valid JSON object with a root key \"questions\" \
         containing an array of exactly {count} of these question objects."
    )
}

pub fn info_prompt(topic: &str) -> String {
    format!(
        "Generate comprehensive information about the topic: \"{topic}\". \
         Structure it in clear paragraphs, suitable for a beginner."
    )
}

pub fn expansion_prompt(topic: &str, current_text: &str, query: &str) -> String {
    format!(
        "The user is learning about \"{topic}\" from this text: \"{current_text}\". \
         Expand on this specific query: \"{query}\". \
         Provide a detailed, well-structured response."
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Strict,
    Fenced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Parsed(Value),
    Rejected(String),
}

pub fn parse_strict(raw: &str) -> StageOutcome {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => StageOutcome::Parsed(value),
        Err(e) => StageOutcome::Rejected(e.to_string()),
    }
}

pub fn parse_fenced(raw: &str) -> StageOutcome {
    let Some(block) = FENCED_JSON.captures(raw).and_then(|c| c.get(1)) else {
        return StageOutcome::Rejected("no fenced json block".to_string());
    };
    parse_strict(block.as_str())
}

pub fn parse_completion(raw: &str) -> Result<(Value, ParseStage), GenerationError> {
    let strict_issue = match parse_strict(raw) {
        StageOutcome::Parsed(value) => return Ok((value, ParseStage::Strict)),
        StageOutcome::Rejected(issue) => issue,
    };
    match parse_fenced(raw) {
        StageOutcome::Parsed(value) => {
            debug!(%strict_issue, "completion recovered from fenced block");
            Ok((value, ParseStage::Fenced))
        }
        StageOutcome::Rejected(fenced_issue) => {
            warn!(%strict_issue, %fenced_issue, "completion is not parseable");
            Err(GenerationError::ContentParse)
        }
    }
}

/// Keeps the well-formed entries of `payload.questions`, in order.
pub fn validate_questions(
    payload: &Value,
    record_schema: &Validator,
) -> Result<Vec<QuestionRecord>, GenerationError> {
    let items = payload
        .get("questions")
        .and_then(Value::as_array)
        .ok_or(GenerationError::MissingQuestions)?;

    let mut kept = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if !record_schema.is_valid(item) {
            let issues: Vec<String> = record_schema
                .iter_errors(item)
                .map(|e| format!("{}: {}", e.instance_path, e))
                .collect();
            warn!(index, ?issues, "dropping generated question");
            continue;
        }
        let record: QuestionRecord = match serde_json::from_value(item.clone()) {
            Ok(record) => record,
            Err(e) => {
                warn!(index, error = %e, "dropping undecodable generated question");
                continue;
            }
        };
        if let Err(issues) = validate_record(&record) {
            warn!(index, ?issues, "dropping generated question");
            continue;
        }
        kept.push(record);
    }

    if kept.is_empty() && !items.is_empty() {
        return Err(GenerationError::NoValidQuestions {
            received: items.len(),
        });
    }
    Ok(kept)
}

#[derive(Clone)]
pub struct GenerationService {
    client: Arc<dyn CompletionClient>,
    record_schema: Arc<Validator>,
}

impl GenerationService {
    pub fn new(client: Arc<dyn CompletionClient>, record_schema: Validator) -> Self {
        Self {
            client,
            record_schema: Arc::new(record_schema),
        }
    }

    pub async fn generate_questions(
        &self,
        source_text: &str,
        count: u32,
    ) -> Result<Vec<QuestionRecord>, GenerationError> {
        let source_text = source_text.trim();
        if source_text.is_empty() {
            return Err(GenerationError::EmptySourceText);
        }
        if count == 0 {
            return Err(GenerationError::InvalidQuestionCount);
        }

        info!(count, source_chars = source_text.chars().count(), "requesting questions");
        let raw = self
            .client
            .complete(CompletionRequest::json(question_prompt(source_text, count)))
            .await?;
        let (payload, stage) = parse_completion(&raw)?;
        let questions = validate_questions(&payload, &self.record_schema)?;
        info!(?stage, requested = count, returned = questions.len(), "questions generated");
        Ok(questions)
    }

    pub async fn generate_info(&self, topic: &str) -> Result<String, GenerationError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(GenerationError::EmptyTopic);
        }
        info!(topic, "requesting informational text");
        let text = self.client.complete(CompletionRequest::text(info_prompt(topic))).await?;
        Ok(text)
    }

    pub async fn expand_info(
        &self,
        topic: &str,
        current_text: &str,
        query: &str,
    ) -> Result<String, GenerationError> {
        let topic = topic.trim();
        let query = query.trim();
        if topic.is_empty() {
            return Err(GenerationError::EmptyTopic);
        }
        if query.is_empty() {
            return Err(GenerationError::EmptyQuery);
        }
        info!(topic, query, "requesting expansion");
        let text = self
            .client
            .complete(CompletionRequest::text(expansion_prompt(topic, current_text, query)))
            .await?;
        Ok(text)
    }
}
