use crate::error::AppError;
use crate::generation::{GenerationError, DEFAULT_QUESTION_COUNT};
use crate::models::{GeneratedQuestions, InformationalText};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::borrow::Cow;
use tracing::{error, info};
use validator::{Validate, ValidationError};

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Accepts JSON integers and integral floats in `1..=u32::MAX`.
pub fn question_count(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok().filter(|n| *n > 0);
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && f >= 1.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

fn validate_source_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::new("blank")
            .with_message(Cow::Borrowed("Source text cannot be empty.")));
    }
    Ok(())
}

fn validate_question_count(value: &Value) -> Result<(), ValidationError> {
    match question_count(value) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("not_positive_integer")
            .with_message(Cow::Borrowed("Number of questions must be a positive integer."))),
    }
}

fn validate_topic(topic: &str) -> Result<(), ValidationError> {
    if topic.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message(Cow::Borrowed("Topic cannot be empty.")));
    }
    Ok(())
}

fn validate_expansion_query(query: &str) -> Result<(), ValidationError> {
    if query.trim().is_empty() {
        return Err(ValidationError::new("blank")
            .with_message(Cow::Borrowed("Expansion query cannot be empty.")));
    }
    Ok(())
}

/// A present `null` stays `Some(Value::Null)`; only an absent field is `None`.
fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn generation_failure(err: GenerationError, public_message: &str, request_id: &str) -> AppError {
    if err.is_input_error() {
        return AppError::bad_request(err.to_string(), request_id);
    }
    error!(request_id, error = %err, "generation failed");
    AppError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "GENERATION_FAILED",
        public_message,
        request_id,
    )
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateQuestionsPayload {
    #[serde(default)]
    #[validate(custom(function = "validate_source_text"))]
    pub text: String,
    #[serde(rename = "numQuestions", default, deserialize_with = "present_value")]
    #[validate(custom(function = "validate_question_count"))]
    pub num_questions: Option<Value>,
}

pub async fn generate_questions(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateQuestionsPayload>, JsonRejection>,
) -> Result<Json<GeneratedQuestions>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text(), req_id.clone()))?;
    info!(request_id = %req_id, "generate-questions request received");

    payload
        .validate()
        .map_err(|errs| AppError::from_validation(&errs, req_id.clone()))?;
    let count = match &payload.num_questions {
        None => DEFAULT_QUESTION_COUNT,
        Some(value) => question_count(value).ok_or_else(|| {
            AppError::bad_request("Number of questions must be a positive integer.", req_id.clone())
        })?,
    };

    let questions = state
        .generator
        .generate_questions(&payload.text, count)
        .await
        .map_err(|e| generation_failure(e, "An error occurred while generating questions.", &req_id))?;
    Ok(Json(GeneratedQuestions { questions }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateInfoPayload {
    #[serde(default)]
    #[validate(custom(function = "validate_topic"))]
    pub topic: String,
    #[serde(rename = "currentText", default)]
    pub current_text: Option<String>,
    #[serde(rename = "expansionQuery", default)]
    #[validate(custom(function = "validate_expansion_query"))]
    pub expansion_query: Option<String>,
}

pub async fn generate_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateInfoPayload>, JsonRejection>,
) -> Result<Json<InformationalText>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let Json(payload) = payload.map_err(|e| AppError::bad_request(e.body_text(), req_id.clone()))?;
    info!(request_id = %req_id, "generate-info request received");

    payload
        .validate()
        .map_err(|errs| AppError::from_validation(&errs, req_id.clone()))?;

    let current_text = payload
        .current_text
        .as_deref()
        .filter(|t| !t.trim().is_empty());
    let result = match (payload.expansion_query.as_deref(), current_text) {
        (Some(query), Some(current)) => {
            state
                .generator
                .expand_info(&payload.topic, current, query)
                .await
        }
        _ => state.generator.generate_info(&payload.topic).await,
    };
    let informational_text = result
        .map_err(|e| generation_failure(e, "An error occurred while generating information.", &req_id))?;
    Ok(Json(InformationalText { informational_text }))
}
