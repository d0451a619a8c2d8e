use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs},
    Client,
};
use async_trait::async_trait;

use crate::{error::AppError, utils::config::AppConfig};

/// Black-box generative capability: prompt in, text out.
///
/// Implementations must surface quota exhaustion as
/// [`AppError::QuotaExhausted`] so callers can apply backoff; every other
/// failure maps to [`AppError::Generation`] and is not retried.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

pub struct OpenAiGenerative {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
}

impl OpenAiGenerative {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String) -> Self {
        Self { client, model }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let client = Client::with_config(
            OpenAIConfig::new()
                .with_api_key(config.openai_api_key.clone())
                .with_api_base(config.openai_base_url.clone()),
        );
        Self::new(Arc::new(client), config.generation_model.clone())
    }
}

#[async_trait]
impl GenerativeModel for OpenAiGenerative {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessage::from(prompt).into()])
            .build()
            .map_err(classify_openai_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::Generation("No content found in LLM response".into()))
    }
}

/// Maps an OpenAI failure onto the retryable/non-retryable split.
pub fn classify_openai_error(err: OpenAIError) -> AppError {
    let message = err.to_string();
    if is_quota_signal(&message) {
        AppError::QuotaExhausted(message)
    } else {
        AppError::Generation(message)
    }
}

fn is_quota_signal(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("429")
        || lowered.contains("rate limit")
        || lowered.contains("rate_limit")
        || lowered.contains("quota")
        || lowered.contains("resource exhausted")
}
