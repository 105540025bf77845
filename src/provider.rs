use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub format: ResponseFormat,
}

impl CompletionRequest {
    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            format: ResponseFormat::Json,
        }
    }

    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            format: ResponseFormat::Text,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("completion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response could not be decoded: {0}")]
    Decode(String),
    #[error("completion response carried no message content")]
    EmptyCompletion,
}

/// A single-shot chat completion call. Implementations must not retry.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'static, Result<String, ProviderError>>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormatBody {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormatBody>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

fn first_content(response: ChatCompletionResponse) -> Result<String, ProviderError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ProviderError::EmptyCompletion)
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    pub base_url: String,
    api_key: String,
    pub question_model: String,
    pub info_model: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        question_model: impl Into<String>,
        info_model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            question_model: question_model.into(),
            info_model: info_model.into(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Self {
        Self::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.question_model.clone(),
            config.info_model.clone(),
        )
    }

    fn model_for(&self, format: ResponseFormat) -> &str {
        match format {
            ResponseFormat::Json => &self.question_model,
            ResponseFormat::Text => &self.info_model,
        }
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'static, Result<String, ProviderError>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionBody {
            model: self.model_for(request.format),
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            response_format: (request.format == ResponseFormat::Json)
                .then_some(ResponseFormatBody { kind: "json_object" }),
        };
        let call = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body);

        Box::pin(async move {
            let res = call.send().await?;
            let status = res.status();
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            let raw = res.text().await?;
            let parsed: ChatCompletionResponse =
                serde_json::from_str(&raw).map_err(|e| ProviderError::Decode(e.to_string()))?;
            first_content(parsed)
        })
    }
}
