use std::path::PathBuf;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;

use super::SummaryProvider;
use crate::config::AppConfig;
use crate::{Error, Result};

/// LLM summarizer over an OpenAI-compatible chat completions API.
///
/// The prompt template lives in a file so it can be edited without a
/// restart; it is re-read on every call and must contain a `{{content}}`
/// placeholder.
pub struct Summarizer {
    client: Client<OpenAIConfig>,
    model: String,
    prompt_path: PathBuf,
    max_retries: u32,
    retry_wait: Duration,
}

impl Summarizer {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let api_key = config
            .summarize
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("Summarization API key is not configured".to_string()))?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(&config.summarize.api_base);

        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.summarize.model.clone(),
            prompt_path: config.summarize.prompt_path.clone(),
            max_retries: config.summarize.max_retries.max(1),
            retry_wait: Duration::from_secs(config.summarize.retry_wait_secs),
        })
    }

    fn build_prompt(&self, content: &str) -> Result<String> {
        let template = std::fs::read_to_string(&self.prompt_path).map_err(|e| {
            Error::Config(format!(
                "Cannot read summarization prompt {}: {}",
                self.prompt_path.display(),
                e
            ))
        })?;
        Ok(template.replace("{{content}}", content))
    }

    async fn request_summary(&self, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| Error::Summarize(e.to_string()))?,
            )])
            .build()
            .map_err(|e| Error::Summarize(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| Error::Summarize(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::Summarize("Model returned an empty response".to_string()))
    }
}

#[async_trait::async_trait]
impl SummaryProvider for Summarizer {
    /// Summarize with a fixed wait between attempts. A missing prompt file
    /// is a configuration error and is not retried.
    async fn summarize(&self, content: &str) -> Result<String> {
        let prompt = self.build_prompt(content)?;
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            match self.request_summary(&prompt).await {
                Ok(summary) => return Ok(summary),
                Err(e) => {
                    tracing::warn!("Summarization attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_wait).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::Summarize("No summarization attempts were made".to_string())))
    }
}
