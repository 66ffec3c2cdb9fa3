use anyhow::Result;
use async_trait::async_trait;

/// Minimal completion contract. Implementations live with the transport
/// (see the server crate's HTTP client); tests script responses inline.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
