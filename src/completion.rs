//! OpenAI text-completion client.
//!
//! Implements [`CompletionProvider`] over `POST {base_url}/completions` with
//! temperature fixed at zero, so a given prompt always requests the same
//! deterministic sampling.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use repo_chat_core::completion::CompletionProvider;

use crate::config::{CompletionConfig, ProviderConfig};
use crate::retry::{post_json, RetryPolicy};

pub struct OpenAICompleter {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig, provider: &ProviderConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/completions", provider.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "max_tokens": self.max_tokens,
            "temperature": 0,
        });
        let json = post_json(&self.client, &self.url, &self.api_key, &body, self.retry, "OpenAI").await?;
        json.pointer("/choices/0/text")
            .and_then(|t| t.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].text"))
    }
}
