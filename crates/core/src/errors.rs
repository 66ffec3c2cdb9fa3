use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("unknown capability `{0}`")]
    Unknown(String),
}

/// Failures internal to the orchestration layer. Everything here is the
/// "Fatal/Unexpected" bucket of the turn taxonomy: recoverable conditions
/// (validation, not-found, transient unavailability, low confidence) travel
/// as data, not as errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("intent classification failed: {0}")]
    Classification(String),
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("dialog state store failure: {0}")]
    StateStore(String),
    #[error("no workflow definition named `{0}`")]
    UnknownWorkflow(String),
}

impl OrchestrationError {
    /// Safe message surfaced to the user when a turn fails unexpectedly.
    /// Conversation state is left untouched on this path, so "try again"
    /// is accurate: the user retries the same turn.
    pub fn user_message(&self) -> &'static str {
        "Something went wrong while handling that. Nothing was changed - please try again."
    }
}

#[cfg(test)]
mod tests {
    use super::{CapabilityError, OrchestrationError};

    #[test]
    fn unknown_capability_names_the_capability() {
        let error = OrchestrationError::from(CapabilityError::Unknown("leave.transfer".to_string()));
        assert_eq!(error.to_string(), "unknown capability `leave.transfer`");
    }

    #[test]
    fn user_message_never_leaks_internals() {
        let error = OrchestrationError::StateStore("redis connection refused".to_string());
        assert!(!error.user_message().contains("redis"));
    }
}
