//! Entity classification over an OpenAI-compatible chat completions API.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod openai;

pub use openai::OpenAiClassifier;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for [`OpenAiClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierConfig {
    pub api_key: String,
    /// API root; `/chat/completions` is appended.
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Extra attempts after a transport error or a 5xx/429 reply.
    pub max_retries: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: 0,
        }
    }
}

impl ClassifierConfig {
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Error)]
pub enum ClassifierBuildError {
    #[error("no API key configured (set OPENAI_API_KEY or apiKey in the config file)")]
    MissingApiKey,
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_url() {
        let mut config = ClassifierConfig::default();
        assert_eq!(config.endpoint(), "https://api.openai.com/v1/chat/completions");
        config.base_url = "http://localhost:8080/v1/".into();
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
    }

    #[test]
    fn config_reads_camel_case_with_defaults() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{"apiKey": "sk-test", "maxRetries": 2}"#).unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }
}
