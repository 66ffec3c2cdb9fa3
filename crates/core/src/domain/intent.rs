use serde::{Deserialize, Serialize};

/// Closed category describing what the user wants from one utterance.
/// Produced fresh per turn and never persisted beyond it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    InformationalPolicy,
    PersonalDataQuery,
    LeaveSubmit,
    LeaveApproval,
    Unknown,
}

impl Intent {
    /// Transactional intents drive a multi-turn slot-filling workflow;
    /// everything else resolves within a single turn.
    pub fn is_transactional(&self) -> bool {
        matches!(self, Self::LeaveSubmit | Self::LeaveApproval)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::InformationalPolicy => "POLICY_QUERY",
            Self::PersonalDataQuery => "PERSONAL_DATA",
            Self::LeaveSubmit => "LEAVE_SUBMIT",
            Self::LeaveApproval => "LEAVE_APPROVAL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parses a classifier label. Anything unrecognized maps to `Unknown`
    /// rather than an error so a misbehaving model degrades to the
    /// clarification path instead of failing the turn.
    pub fn from_label(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "POLICY_QUERY" => Self::InformationalPolicy,
            "PERSONAL_DATA" => Self::PersonalDataQuery,
            "LEAVE_SUBMIT" => Self::LeaveSubmit,
            "LEAVE_APPROVAL" => Self::LeaveApproval,
            _ => Self::Unknown,
        }
    }
}

/// Intent plus the classifier's confidence in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    pub confidence: f32,
}

impl Classification {
    pub fn new(intent: Intent, confidence: f32) -> Self {
        Self { intent, confidence: confidence.clamp(0.0, 1.0) }
    }

    /// Confidence below the threshold forces `Unknown` regardless of the
    /// raw classification; the router must treat `Unknown` as "ask for
    /// clarification", never as a default route.
    pub fn with_threshold(self, threshold: f32) -> Self {
        if self.confidence < threshold {
            Self { intent: Intent::Unknown, confidence: self.confidence }
        } else {
            self
        }
    }
}
