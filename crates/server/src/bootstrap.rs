use std::sync::Arc;

use hrdesk_agent::classifier::{IntentClassifier, KeywordClassifier, LlmIntentClassifier};
use hrdesk_agent::demo::demo_registry;
use hrdesk_agent::AgentRuntime;
use hrdesk_core::config::{AppConfig, ConfigError};
use thiserror::Error;
use tracing::info;

use crate::llm::HttpLlmClient;

pub struct Application {
    pub config: AppConfig,
    pub runtime: AgentRuntime,
    /// Which classifier backs the runtime, for the startup log line.
    pub classifier_kind: &'static str,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("llm client initialization failed: {0}")]
    Llm(String),
}

/// Builds the runtime from an already-loaded config. The capability
/// registry is the in-process fixture set; swapping in real backend
/// connectors is a registry change, not a pipeline change.
pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let classifier: Arc<dyn IntentClassifier> = match HttpLlmClient::from_config(&config.llm) {
        Ok(client) => Arc::new(LlmIntentClassifier::new(client)),
        Err(error) => return Err(BootstrapError::Llm(error.to_string())),
    };
    let classifier_kind = "llm_with_keyword_fallback";

    let registry = Arc::new(demo_registry());
    info!(
        event_name = "system.bootstrap.capabilities_registered",
        correlation_id = "bootstrap",
        capabilities = registry.len(),
        "capability registry populated"
    );

    let runtime = AgentRuntime::new(&config, classifier, registry);
    Ok(Application { config, runtime, classifier_kind })
}

#[allow(dead_code)]
pub fn bootstrap_keyword_only(config: AppConfig) -> Application {
    let registry = Arc::new(demo_registry());
    let runtime = AgentRuntime::new(&config, Arc::new(KeywordClassifier::new()), registry);
    Application { config, runtime, classifier_kind: "keyword" }
}

#[cfg(test)]
mod tests {
    use hrdesk_core::config::AppConfig;
    use hrdesk_core::{SenderIdentity, Utterance};

    use super::{bootstrap_keyword_only, bootstrap_with_config};

    #[tokio::test]
    async fn bootstrap_builds_a_complete_runtime() {
        let app = bootstrap_with_config(AppConfig::default()).expect("bootstrap");
        assert_eq!(app.runtime.registry().len(), 8);
        assert_eq!(app.classifier_kind, "llm_with_keyword_fallback");
    }

    #[tokio::test]
    async fn keyword_only_runtime_answers_turns() {
        let app = bootstrap_keyword_only(AppConfig::default());
        let sender = SenderIdentity {
            user_id: "U-1".to_string(),
            email: "priya.sharma@acme.test".to_string(),
            display_name: "Priya Sharma".to_string(),
            is_manager: false,
        };
        let response = app
            .runtime
            .handle(&Utterance::new("What's my leave balance?", sender, "C-1"))
            .await;
        assert!(response.table.is_some());
    }
}
