use std::sync::Arc;

use hrdesk_core::config::AppConfig;
use hrdesk_core::{CapabilityRegistry, ComposedResponse, Utterance};

use crate::classifier::IntentClassifier;
use crate::router::Router;
use crate::state::InMemoryStateStore;

/// Wires the turn pipeline together: classifier, in-process dialog state
/// sized from config, and the capability registry. One instance serves
/// every conversation.
pub struct AgentRuntime {
    router: Router,
    registry: Arc<CapabilityRegistry>,
}

impl AgentRuntime {
    pub fn new(
        config: &AppConfig,
        classifier: Arc<dyn IntentClassifier>,
        registry: Arc<CapabilityRegistry>,
    ) -> Self {
        let store = Arc::new(InMemoryStateStore::new(config.dialog.idle_window()));
        let router = Router::new(classifier, store, Arc::clone(&registry), config);
        Self { router, registry }
    }

    pub async fn handle(&self, utterance: &Utterance) -> ComposedResponse {
        self.router.handle_turn(utterance).await
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }
}
