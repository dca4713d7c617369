use crate::config::LlmConfig;
use anyhow::{Context, Result, bail};
use serde_json::{Value, json};
use std::future::Future;
use std::time::Duration;

/// Something that turns a prompt into completion text.
pub trait Completion: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

pub struct LLMClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LLMClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building http client")?;

        Ok(LLMClient { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl Completion for LLMClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut request_builder = self
            .client
            .post(&self.config.api_url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.config.model,
                "prompt": prompt,
                "stream": false,
                "options": {
                    "temperature": self.config.temperature
                }
            }));

        if let Some(api_key) = &self.config.api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = request_builder
            .send()
            .await
            .with_context(|| format!("calling {}", self.config.api_url))?;

        let status = response.status();
        let response_text = response.text().await.context("reading completion body")?;
        if !status.is_success() {
            bail!("completion endpoint returned {}: {}", status, response_text);
        }

        tracing::debug!(model = %self.config.model, bytes = response_text.len(), "completion received");
        Ok(completion_text(&response_text))
    }
}

/// Pulls the generated text out of an Ollama or OpenAI-style body; anything
/// else is returned as-is for the segment parser to deal with.
pub fn completion_text(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.to_string();
    };

    let text = value
        .get("response")
        .and_then(Value::as_str)
        .or_else(|| {
            value
                .pointer("/choices/0/message/content")
                .and_then(Value::as_str)
        })
        .or_else(|| value.pointer("/choices/0/text").and_then(Value::as_str));

    match text {
        Some(text) => text.to_string(),
        None => body.to_string(),
    }
}
