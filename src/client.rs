//! HTTP client for the quizgen server, used by the terminal player.

use crate::models::{GeneratedQuestions, InformationalText, QuestionRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("failed to connect to the server or a network issue occurred; check that the server is running")]
    Network(#[source] reqwest::Error),
    #[error("{0}")]
    Server(String),
    #[error("no questions were returned by the server; the source text may be unsuitable")]
    NoQuestions,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: Option<String>,
}

#[derive(Clone)]
pub struct QuizApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl QuizApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn generate_questions(
        &self,
        text: &str,
        count: u32,
    ) -> Result<Vec<QuestionRecord>, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation("Source text cannot be empty."));
        }
        if count == 0 {
            return Err(ClientError::Validation("Number of questions must be a positive number."));
        }
        let reply: GeneratedQuestions = self
            .post("/api/generate-questions", json!({ "text": text, "numQuestions": count }))
            .await?;
        if reply.questions.is_empty() {
            return Err(ClientError::NoQuestions);
        }
        Ok(reply.questions)
    }

    pub async fn generate_info(&self, topic: &str) -> Result<String, ClientError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ClientError::Validation("Topic cannot be empty."));
        }
        let reply: InformationalText = self
            .post("/api/generate-info", json!({ "topic": topic }))
            .await?;
        Ok(reply.informational_text)
    }

    pub async fn expand_info(
        &self,
        topic: &str,
        current_text: &str,
        query: &str,
    ) -> Result<String, ClientError> {
        let topic = topic.trim();
        let query = query.trim();
        if topic.is_empty() {
            return Err(ClientError::Validation("Topic cannot be empty."));
        }
        if query.is_empty() {
            return Err(ClientError::Validation("Expansion query cannot be empty."));
        }
        let reply: InformationalText = self
            .post(
                "/api/generate-info",
                json!({ "topic": topic, "currentText": current_text, "expansionQuery": query }),
            )
            .await?;
        Ok(reply.informational_text)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "calling quizgen server");
        let res = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::Network)?;

        let status = res.status();
        if !status.is_success() {
            let message = match res.json::<ErrorReply>().await {
                Ok(ErrorReply { error: Some(message) }) => message,
                _ => format!("Server error: {}", status),
            };
            return Err(ClientError::Server(message));
        }
        res.json::<T>()
            .await
            .map_err(|e| ClientError::Server(format!("unexpected response from server: {}", e)))
    }
}
