use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_QUESTION_MODEL: &str = "gpt-3.5-turbo-0125";
pub const DEFAULT_INFO_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OPENAI_API_KEY is not set; add it to the environment or a .env file")]
    MissingApiKey,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub question_model: String,
    pub info_model: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let openai_api_key = non_blank("OPENAI_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let openai_base_url = non_blank("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let question_model =
            non_blank("OPENAI_QUESTION_MODEL").unwrap_or_else(|| DEFAULT_QUESTION_MODEL.to_string());
        let info_model = non_blank("OPENAI_INFO_MODEL").unwrap_or_else(|| DEFAULT_INFO_MODEL.to_string());
        let host = non_blank("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = non_blank("PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(Self {
            openai_api_key,
            openai_base_url,
            question_model,
            info_model,
            host,
            port,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
