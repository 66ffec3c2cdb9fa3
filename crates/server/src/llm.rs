use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use hrdesk_agent::llm::LlmClient;
use hrdesk_core::config::{LlmConfig, LlmProvider};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

/// HTTP-backed completion client. OpenAI and Ollama speak the
/// chat-completions shape; Anthropic uses its messages endpoint. Any
/// transport or parse failure surfaces as an error and the caller's
/// keyword fallback takes over.
pub struct HttpLlmClient {
    client: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build http client")?;

        let base_url = match (&config.base_url, config.provider) {
            (Some(base_url), _) => base_url.trim_end_matches('/').to_string(),
            (None, LlmProvider::OpenAi) => "https://api.openai.com".to_string(),
            (None, LlmProvider::Anthropic) => "https://api.anthropic.com".to_string(),
            (None, LlmProvider::Ollama) => "http://localhost:11434".to_string(),
        };

        Ok(Self {
            client,
            provider: config.provider,
            base_url,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    async fn complete_chat(&self, prompt: &str) -> Result<String> {
        let mut request = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "temperature": 0,
            }));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let body: Value = request
            .send()
            .await
            .context("chat completion request failed")?
            .error_for_status()
            .context("chat completion returned an error status")?
            .json()
            .await
            .context("chat completion body was not json")?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("chat completion had no message content"))
    }

    async fn complete_messages(&self, prompt: &str) -> Result<String> {
        let api_key =
            self.api_key.as_ref().ok_or_else(|| anyhow!("anthropic requires an api key"))?;

        let body: Value = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&json!({
                "model": self.model,
                "max_tokens": 64,
                "messages": [{ "role": "user", "content": prompt }],
            }))
            .send()
            .await
            .context("messages request failed")?
            .error_for_status()
            .context("messages endpoint returned an error status")?
            .json()
            .await
            .context("messages body was not json")?;

        body["content"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("messages response had no text content"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Ollama => self.complete_chat(prompt).await,
            LlmProvider::Anthropic => self.complete_messages(prompt).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use hrdesk_core::config::{LlmConfig, LlmProvider};

    use super::HttpLlmClient;

    #[test]
    fn base_url_defaults_follow_the_provider() {
        let config = LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key: Some("sk-test".to_string().into()),
            base_url: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 5,
        };
        let client = HttpLlmClient::from_config(&config).expect("client");
        assert_eq!(client.base_url, "https://api.openai.com");
    }

    #[test]
    fn explicit_base_url_is_trimmed() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: Some("http://localhost:11434/".to_string()),
            model: "llama3.1".to_string(),
            timeout_secs: 5,
        };
        let client = HttpLlmClient::from_config(&config).expect("client");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
