use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated identity of the message sender, resolved by the channel
/// layer before the utterance reaches the orchestrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderIdentity {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub is_manager: bool,
}

impl SenderIdentity {
    pub fn first_name(&self) -> &str {
        self.display_name.split_whitespace().next().unwrap_or(&self.display_name)
    }
}

/// A single inbound message. Immutable once received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    pub sender: SenderIdentity,
    pub conversation_id: String,
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    pub fn new(
        text: impl Into<String>,
        sender: SenderIdentity,
        conversation_id: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            sender,
            conversation_id: conversation_id.into(),
            received_at: Utc::now(),
        }
    }
}
