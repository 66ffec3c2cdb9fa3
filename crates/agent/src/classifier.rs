use async_trait::async_trait;
use hrdesk_core::{Classification, Intent, OrchestrationError, Utterance};
use tracing::warn;

use crate::llm::LlmClient;

/// Maps one utterance to an HR intent with a confidence score. The prior
/// turn's intent, when present, only breaks ties; it never overrides a
/// clear signal in the current text.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(
        &self,
        utterance: &Utterance,
        prior: Option<Intent>,
    ) -> Result<Classification, OrchestrationError>;
}

/// How an utterance addressed to an active workflow should be consumed.
/// Screened before classification, so "cancel" works mid-workflow even
/// when the classifier would label the word something else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowSignal {
    Cancel,
    Confirm,
    Amend { slot: String, value: String },
    SlotValue,
}

pub fn screen_workflow_utterance(text: &str) -> WorkflowSignal {
    let trimmed = text.trim();
    let normalized = trimmed.to_ascii_lowercase();

    if matches!(
        normalized.as_str(),
        "cancel" | "never mind" | "nevermind" | "forget it" | "stop" | "abort"
    ) {
        return WorkflowSignal::Cancel;
    }

    if matches!(
        normalized.as_str(),
        "confirm" | "yes" | "y" | "yep" | "yeah" | "correct" | "ok" | "okay" | "go ahead"
            | "submit it" | "try again" | "retry"
    ) {
        return WorkflowSignal::Confirm;
    }

    if let Some(amendment) = parse_amendment(&normalized, trimmed) {
        return amendment;
    }

    WorkflowSignal::SlotValue
}

/// Recognizes `change <field> to <value>` and `set <field> to <value>`.
/// The value keeps the original casing since slot validators canonicalize.
fn parse_amendment(normalized: &str, original: &str) -> Option<WorkflowSignal> {
    let rest_start = normalized
        .strip_prefix("change ")
        .map(|_| "change ".len())
        .or_else(|| normalized.strip_prefix("set ").map(|_| "set ".len()))?;

    let rest = &original[rest_start..];
    let rest_lower = &normalized[rest_start..];
    let split_at = rest_lower.find(" to ")?;

    let slot = rest[..split_at].trim();
    let value = rest[split_at + " to ".len()..].trim();
    if slot.is_empty() || value.is_empty() {
        return None;
    }

    Some(WorkflowSignal::Amend { slot: slot.to_string(), value: value.to_string() })
}

pub fn is_greeting(text: &str) -> bool {
    let normalized = text.trim().trim_end_matches(['!', '.']).to_ascii_lowercase();
    matches!(
        normalized.as_str(),
        "hi" | "hello" | "hey" | "good morning" | "good afternoon" | "good evening" | "yo"
    )
}

/// Which personal-data read the user asked for. Deterministic screen over
/// an utterance already classified as a personal-data query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersonalDataKind {
    Balance,
    History,
    Profile,
}

pub fn screen_personal_data(text: &str) -> PersonalDataKind {
    let normalized = text.to_ascii_lowercase();
    if normalized.contains("history") || normalized.contains("taken") || normalized.contains("past")
    {
        return PersonalDataKind::History;
    }
    if normalized.contains("profile")
        || normalized.contains("manager")
        || normalized.contains("department")
        || normalized.contains("designation")
        || normalized.contains("my details")
    {
        return PersonalDataKind::Profile;
    }
    PersonalDataKind::Balance
}

/// Which side of the approval intent the utterance asked for. `List` is
/// the default: a manager saying "show pending requests" wants the queue,
/// not an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApprovalAction {
    Approve,
    Reject,
    List,
}

pub fn screen_approval_action(text: &str) -> ApprovalAction {
    let normalized = text.to_ascii_lowercase();
    if normalized.contains("reject") || normalized.contains("decline") || normalized.contains("deny")
    {
        return ApprovalAction::Reject;
    }
    if normalized.contains("approve") || normalized.contains("accept") {
        return ApprovalAction::Approve;
    }
    ApprovalAction::List
}

/// Pulls a four-digit year out of an utterance, for history queries like
/// "leaves I took in 2024".
pub fn extract_year(text: &str) -> Option<i32> {
    text.split(|ch: char| !ch.is_ascii_digit())
        .filter(|token| token.len() == 4)
        .filter_map(|token| token.parse::<i32>().ok())
        .find(|year| (2000..=2100).contains(year))
}

/// Phrase-table classifier. Always available: it is the fallback when no
/// LLM is configured or the configured one misbehaves.
#[derive(Clone, Debug, Default)]
pub struct KeywordClassifier;

const POLICY_PHRASES: &[&str] = &[
    "policy",
    "policies",
    "rule",
    "rules",
    "allowed",
    "entitle",
    "eligib",
    "guideline",
    "handbook",
    "carry forward",
    "carry-forward",
    "encash",
    "notice period",
    "probation",
    "work from home",
    "wfh",
    "holiday list",
    "how does",
    "what is the",
    "can i claim",
];

const PERSONAL_PHRASES: &[&str] = &[
    "my balance",
    "leave balance",
    "balance",
    "my leaves",
    "leaves left",
    "leaves do i have",
    "remaining",
    "my profile",
    "my manager",
    "my details",
    "my department",
    "history",
    "have i taken",
];

const SUBMIT_PHRASES: &[&str] = &[
    "apply",
    "take leave",
    "take a leave",
    "request leave",
    "requesting leave",
    "need leave",
    "want leave",
    "want to take",
    "need to take",
    "book leave",
    "time off",
    "day off",
    "days off",
    "going on leave",
    "submit a leave",
];

const APPROVAL_PHRASES: &[&str] = &[
    "approve",
    "approval",
    "approvals",
    "reject",
    "decline",
    "deny",
    "pending request",
    "pending requests",
    "pending leave",
    "team's requests",
    "awaiting my",
];

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn score(&self, text: &str, prior: Option<Intent>) -> Classification {
        let normalized = text.to_ascii_lowercase();

        let hits = [
            (Intent::LeaveApproval, count_hits(&normalized, APPROVAL_PHRASES)),
            (Intent::LeaveSubmit, count_hits(&normalized, SUBMIT_PHRASES)),
            (Intent::PersonalDataQuery, count_hits(&normalized, PERSONAL_PHRASES)),
            (Intent::InformationalPolicy, count_hits(&normalized, POLICY_PHRASES)),
        ];

        let best = hits.iter().map(|(_, count)| *count).max().unwrap_or(0);
        if best == 0 {
            return Classification::new(Intent::Unknown, 0.0);
        }

        let tied: Vec<Intent> = hits
            .iter()
            .filter(|(_, count)| *count == best)
            .map(|(intent, _)| *intent)
            .collect();

        // A prior intent breaks ties; otherwise the listed precedence
        // (approval before submit before reads) decides.
        let intent = prior.filter(|prior| tied.contains(prior)).unwrap_or(tied[0]);

        let confidence = (0.35 + 0.2 * best as f32).min(0.95);
        Classification::new(intent, confidence)
    }
}

fn count_hits(normalized: &str, phrases: &[&str]) -> usize {
    phrases.iter().filter(|phrase| normalized.contains(*phrase)).count()
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(
        &self,
        utterance: &Utterance,
        prior: Option<Intent>,
    ) -> Result<Classification, OrchestrationError> {
        Ok(self.score(&utterance.text, prior))
    }
}

/// LLM-backed classifier with the keyword classifier as its safety net.
/// The model is asked for a single `LABEL confidence` line; anything it
/// returns beyond that contract is discarded.
pub struct LlmIntentClassifier<C> {
    client: C,
    fallback: KeywordClassifier,
}

impl<C> LlmIntentClassifier<C>
where
    C: LlmClient,
{
    pub fn new(client: C) -> Self {
        Self { client, fallback: KeywordClassifier::new() }
    }

    fn prompt(utterance: &Utterance, prior: Option<Intent>) -> String {
        let prior_line = prior
            .map(|intent| format!("Previous turn intent: {}\n", intent.label()))
            .unwrap_or_default();
        format!(
            "Classify this HR helpdesk message into exactly one label:\n\
             POLICY_QUERY - a question about HR policy or rules\n\
             PERSONAL_DATA - a question about the sender's own records\n\
             LEAVE_SUBMIT - the sender wants to apply for leave\n\
             LEAVE_APPROVAL - a manager acting on their team's leave requests\n\
             UNKNOWN - none of the above\n\
             {prior_line}Message: {text}\n\
             Reply with `LABEL confidence` on one line, confidence in [0,1].",
            text = utterance.text,
        )
    }
}

/// Parses `LABEL 0.82`. A missing or unparseable confidence is treated as
/// malformed rather than defaulted, so a rambling model answer cannot
/// smuggle in a high-confidence route.
fn parse_verdict(response: &str) -> Option<Classification> {
    let line = response.lines().find(|line| !line.trim().is_empty())?;
    let mut parts = line.split_whitespace();
    let label = parts.next()?;
    let confidence: f32 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(0.0..=1.0).contains(&confidence) {
        return None;
    }
    Some(Classification::new(Intent::from_label(label), confidence))
}

#[async_trait]
impl<C> IntentClassifier for LlmIntentClassifier<C>
where
    C: LlmClient,
{
    async fn classify(
        &self,
        utterance: &Utterance,
        prior: Option<Intent>,
    ) -> Result<Classification, OrchestrationError> {
        match self.client.complete(&Self::prompt(utterance, prior)).await {
            Ok(response) => match parse_verdict(&response) {
                Some(classification) => Ok(classification),
                None => {
                    warn!(event_name = "classifier.malformed_verdict", response = %response.trim());
                    self.fallback.classify(utterance, prior).await
                }
            },
            Err(error) => {
                warn!(event_name = "classifier.llm_unavailable", error = %error);
                self.fallback.classify(utterance, prior).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use hrdesk_core::{Intent, SenderIdentity, Utterance};

    use super::{
        extract_year, is_greeting, parse_verdict, screen_approval_action, screen_personal_data,
        screen_workflow_utterance, ApprovalAction, IntentClassifier, KeywordClassifier,
        LlmIntentClassifier, PersonalDataKind, WorkflowSignal,
    };
    use crate::llm::LlmClient;

    fn utterance(text: &str) -> Utterance {
        let sender = SenderIdentity {
            user_id: "U-1".to_string(),
            email: "priya.sharma@acme.test".to_string(),
            display_name: "Priya Sharma".to_string(),
            is_manager: false,
        };
        Utterance::new(text, sender, "C-1")
    }

    #[tokio::test]
    async fn keyword_classifier_covers_the_canonical_phrasings() {
        let classifier = KeywordClassifier::new();
        let cases = [
            ("What is the carry forward policy for earned leave?", Intent::InformationalPolicy),
            ("How many sick leaves are we allowed per year?", Intent::InformationalPolicy),
            ("What's my leave balance?", Intent::PersonalDataQuery),
            ("Show my profile", Intent::PersonalDataQuery),
            ("How many leaves have I taken this year?", Intent::PersonalDataQuery),
            ("I want to apply for casual leave", Intent::LeaveSubmit),
            ("Need 2 days off next week", Intent::LeaveSubmit),
            ("Show pending requests from my team", Intent::LeaveApproval),
            ("Approve Rahul's leave", Intent::LeaveApproval),
        ];

        for (text, expected) in cases {
            let classification =
                classifier.classify(&utterance(text), None).await.expect("keyword path");
            assert_eq!(classification.intent, expected, "text: {text}");
            assert!(classification.confidence >= 0.35, "text: {text}");
        }
    }

    #[tokio::test]
    async fn no_phrase_hits_means_unknown_with_zero_confidence() {
        let classifier = KeywordClassifier::new();
        let classification =
            classifier.classify(&utterance("blorp snork fizzle"), None).await.expect("ok");
        assert_eq!(classification.intent, Intent::Unknown);
        assert!(classification.confidence.abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn prior_intent_breaks_ties_without_overriding_clear_signal() {
        let classifier = KeywordClassifier::new();

        // "leave balance" alone hits only the personal table; a submit
        // prior must not flip it.
        let classification = classifier
            .classify(&utterance("what's my leave balance"), Some(Intent::LeaveSubmit))
            .await
            .expect("ok");
        assert_eq!(classification.intent, Intent::PersonalDataQuery);
    }

    #[test]
    fn workflow_screen_recognizes_cancel_confirm_and_amend() {
        assert_eq!(screen_workflow_utterance("cancel"), WorkflowSignal::Cancel);
        assert_eq!(screen_workflow_utterance("Never mind"), WorkflowSignal::Cancel);
        assert_eq!(screen_workflow_utterance("confirm"), WorkflowSignal::Confirm);
        assert_eq!(screen_workflow_utterance("try again"), WorkflowSignal::Confirm);
        assert_eq!(
            screen_workflow_utterance("change end date to 2025-06-20"),
            WorkflowSignal::Amend { slot: "end date".to_string(), value: "2025-06-20".to_string() }
        );
        assert_eq!(screen_workflow_utterance("sick leave"), WorkflowSignal::SlotValue);
        // "to" inside a plain value must not be misread as an amendment.
        assert_eq!(screen_workflow_utterance("need to rest"), WorkflowSignal::SlotValue);
    }

    #[test]
    fn personal_data_screen_defaults_to_balance() {
        assert_eq!(screen_personal_data("what's my leave balance"), PersonalDataKind::Balance);
        assert_eq!(screen_personal_data("leaves I have taken in 2024"), PersonalDataKind::History);
        assert_eq!(screen_personal_data("who is my manager"), PersonalDataKind::Profile);
    }

    #[test]
    fn approval_screen_defaults_to_listing() {
        assert_eq!(screen_approval_action("show pending requests"), ApprovalAction::List);
        assert_eq!(screen_approval_action("approve the first one"), ApprovalAction::Approve);
        assert_eq!(screen_approval_action("decline Rahul's request"), ApprovalAction::Reject);
    }

    #[test]
    fn greeting_and_year_screens() {
        assert!(is_greeting("Hi!"));
        assert!(is_greeting("good morning"));
        assert!(!is_greeting("hi, I need leave tomorrow"));
        assert_eq!(extract_year("leaves I took in 2024"), Some(2024));
        assert_eq!(extract_year("my history please"), None);
    }

    #[test]
    fn verdict_parser_enforces_the_contract() {
        let verdict = parse_verdict("LEAVE_SUBMIT 0.91").expect("well-formed");
        assert_eq!(verdict.intent, Intent::LeaveSubmit);
        assert!((verdict.confidence - 0.91).abs() < f32::EPSILON);

        assert_eq!(parse_verdict("SOMETHING_ELSE 0.9").map(|v| v.intent), Some(Intent::Unknown));
        assert!(parse_verdict("LEAVE_SUBMIT").is_none());
        assert!(parse_verdict("LEAVE_SUBMIT 1.4").is_none());
        assert!(parse_verdict("I think it is LEAVE_SUBMIT 0.9 maybe").is_none());
        assert!(parse_verdict("").is_none());
    }

    struct ScriptedLlm(Result<&'static str, &'static str>);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            match &self.0 {
                Ok(response) => Ok((*response).to_string()),
                Err(message) => Err(anyhow!(*message)),
            }
        }
    }

    #[tokio::test]
    async fn llm_classifier_uses_the_model_verdict() {
        let classifier = LlmIntentClassifier::new(ScriptedLlm(Ok("PERSONAL_DATA 0.88")));
        let classification =
            classifier.classify(&utterance("balance please"), None).await.expect("ok");
        assert_eq!(classification.intent, Intent::PersonalDataQuery);
        assert!((classification.confidence - 0.88).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_keywords() {
        let classifier = LlmIntentClassifier::new(ScriptedLlm(Err("connection refused")));
        let classification = classifier
            .classify(&utterance("I want to apply for sick leave"), None)
            .await
            .expect("fallback should absorb the failure");
        assert_eq!(classification.intent, Intent::LeaveSubmit);
    }

    #[tokio::test]
    async fn malformed_verdict_falls_back_to_keywords() {
        let classifier =
            LlmIntentClassifier::new(ScriptedLlm(Ok("Sure! That looks like a leave request.")));
        let classification = classifier
            .classify(&utterance("apply for casual leave tomorrow"), None)
            .await
            .expect("fallback should absorb the malformed reply");
        assert_eq!(classification.intent, Intent::LeaveSubmit);
    }
}
