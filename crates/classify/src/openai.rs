use std::time::Duration;

use blackout_core::{ClassifyError, EntityClassifier, EntityRecord};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::{ClassifierBuildError, ClassifierConfig};

const USER_PREFIX: &str = "The page content is:\n\n\n";
const INITIAL_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 30_000;
/// Error bodies are cut to this many chars before they end up in reports.
const MAX_ERROR_BODY: usize = 500;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    response_format: ResponseFormat,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Sends each page to a chat completions endpoint in JSON mode and parses
/// the reply into an [`EntityRecord`].
pub struct OpenAiClassifier {
    client: Client,
    config: ClassifierConfig,
    endpoint: String,
}

impl OpenAiClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierBuildError> {
        if config.api_key.trim().is_empty() {
            return Err(ClassifierBuildError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| ClassifierBuildError::Client(e.to_string()))?;
        let endpoint = config.endpoint();
        log::info!(
            "[Classify] using model {} at {}",
            config.model,
            endpoint
        );
        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    fn send_once(&self, body: &ChatRequest<'_>) -> Result<EntityRecord, ClassifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ClassifyError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClassifyError::Status {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let reply: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ClassifyError::UnexpectedShape(format!("completion envelope: {e}")))?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ClassifyError::EmptyResponse)?;

        EntityRecord::parse(&content)
    }
}

/// Wait before retry `attempt` (1-based): doubles from
/// [`INITIAL_BACKOFF_MS`], capped at [`MAX_BACKOFF_MS`].
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 1u64
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(INITIAL_BACKOFF_MS.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

fn is_retryable(err: &ClassifyError) -> bool {
    match err {
        ClassifyError::Transport(_) => true,
        ClassifyError::Status { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}

impl EntityClassifier for OpenAiClassifier {
    fn classify(
        &self,
        page: u32,
        page_text: &str,
        instruction: &str,
    ) -> Result<EntityRecord, ClassifyError> {
        let user = format!("{USER_PREFIX}{page_text}");
        let body = ChatRequest {
            model: &self.config.model,
            response_format: ResponseFormat { kind: "json_object" },
            messages: [
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        };

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                log::debug!(
                    "[Classify] page {}: retry {} in {:?}",
                    page,
                    attempt,
                    delay
                );
                std::thread::sleep(delay);
            }

            match self.send_once(&body) {
                Ok(record) => return Ok(record),
                Err(e) if is_retryable(&e) && attempt < self.config.max_retries => {
                    log::warn!("[Classify] page {} attempt {} failed: {}", page, attempt + 1, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
