use std::sync::Arc;
use std::time::Duration;

use hrdesk_core::capability::names;
use hrdesk_core::config::AppConfig;
use hrdesk_core::workflow::{
    LEAVE_APPROVE_WORKFLOW, LEAVE_REJECT_WORKFLOW, LEAVE_SUBMIT_WORKFLOW,
};
use hrdesk_core::{
    CapabilityRegistry, ComposedResponse, Intent, OrchestrationError, ToolRequest, ToolResult,
    Utterance, WorkflowDefinition, WorkflowTable,
};
use tracing::{info, warn};

use crate::classifier::{
    extract_year, is_greeting, screen_approval_action, screen_personal_data,
    screen_workflow_utterance, ApprovalAction, IntentClassifier, PersonalDataKind,
};
use crate::composer::{compose, ComposeInput};
use crate::slots::{SlotFillOutcome, SlotFillingEngine};
use crate::state::{ActiveWorkflow, ConversationState, DialogStateStore};

/// Where a turn is in the pipeline, for structured logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Received,
    Classified,
    WorkflowAdvanced,
    CapabilityInvoked,
    Composed,
    Failed,
}

impl TurnPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::WorkflowAdvanced => "workflow_advanced",
            Self::CapabilityInvoked => "capability_invoked",
            Self::Composed => "composed",
            Self::Failed => "failed",
        }
    }
}

/// Exponential backoff for retryable reads. Terminal calls never retry.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: u32,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(self.factor.saturating_pow(attempt))
    }
}

/// Per-turn orchestrator. Holds no per-conversation state of its own;
/// everything mutable lives behind the dialog state store.
pub struct Router {
    classifier: Arc<dyn IntentClassifier>,
    store: Arc<dyn DialogStateStore>,
    registry: Arc<CapabilityRegistry>,
    workflows: WorkflowTable,
    engine: SlotFillingEngine,
    confidence_threshold: f32,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl Router {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        store: Arc<dyn DialogStateStore>,
        registry: Arc<CapabilityRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self {
            classifier,
            store,
            registry,
            workflows: WorkflowTable::standard(),
            engine: SlotFillingEngine::new(),
            confidence_threshold: config.classifier.confidence_threshold,
            call_timeout: config.orchestrator.call_timeout(),
            retry: RetryPolicy {
                base: config.orchestrator.retry_base(),
                factor: config.orchestrator.retry_factor,
                max_retries: config.orchestrator.retry_max_attempts,
            },
        }
    }

    /// Handles one inbound utterance end to end. The per-conversation
    /// lease is held for the whole turn, so turns in one conversation are
    /// strictly sequential; a failure releases it like any other return.
    pub async fn handle_turn(&self, utterance: &Utterance) -> ComposedResponse {
        let _lease = self.store.lease(&utterance.conversation_id).await;
        self.log_phase(TurnPhase::Received, &utterance.conversation_id);

        match self.run_turn(utterance).await {
            Ok(response) => {
                self.log_phase(TurnPhase::Composed, &utterance.conversation_id);
                response
            }
            Err(error) => {
                warn!(
                    event_name = "router.turn_failed",
                    conversation_id = %utterance.conversation_id,
                    phase = TurnPhase::Failed.as_str(),
                    error = %error,
                );
                ComposedResponse::text(error.user_message())
            }
        }
    }

    async fn run_turn(&self, utterance: &Utterance) -> Result<ComposedResponse, OrchestrationError> {
        let mut state = self
            .store
            .get(&utterance.conversation_id)
            .await?
            .unwrap_or_else(|| ConversationState::new(&utterance.conversation_id));

        // An active workflow consumes the utterance directly; it is not
        // reclassified, so workflow answers like "tomorrow" never route.
        if let Some(active) = state.workflow.take() {
            return self.continue_workflow(utterance, state, active).await;
        }

        if is_greeting(&utterance.text) {
            return Ok(compose(ComposeInput::Greeting {
                first_name: utterance.sender.first_name(),
            }));
        }

        let classification = self
            .classifier
            .classify(utterance, None)
            .await?
            .with_threshold(self.confidence_threshold);
        info!(
            event_name = "router.classified",
            conversation_id = %utterance.conversation_id,
            phase = TurnPhase::Classified.as_str(),
            intent = classification.intent.label(),
            confidence = classification.confidence,
        );

        match classification.intent {
            Intent::Unknown => Ok(compose(ComposeInput::Clarification)),
            Intent::InformationalPolicy => self.dispatch_policy(utterance).await,
            Intent::PersonalDataQuery => self.dispatch_personal_data(utterance).await,
            Intent::LeaveSubmit => {
                self.start_workflow(utterance, state, LEAVE_SUBMIT_WORKFLOW).await
            }
            Intent::LeaveApproval => self.dispatch_approval(utterance, state).await,
        }
    }

    async fn dispatch_policy(
        &self,
        utterance: &Utterance,
    ) -> Result<ComposedResponse, OrchestrationError> {
        let request = ToolRequest::new(names::POLICY_SEARCH)
            .with_param("query", utterance.text.clone());
        let result = self.invoke_with_retry(&request, &utterance.conversation_id).await?;

        Ok(match result {
            ToolResult::Success(payload) => compose(ComposeInput::Policy { payload: &payload }),
            ToolResult::NotFound => compose(ComposeInput::NotFound {
                subject: "anything about that in the policy documents",
            }),
            ToolResult::ValidationError(message) => {
                compose(ComposeInput::InvalidRequest { message: &message })
            }
            ToolResult::Unavailable { .. } => compose(ComposeInput::Unavailable { state_kept: false }),
        })
    }

    async fn dispatch_personal_data(
        &self,
        utterance: &Utterance,
    ) -> Result<ComposedResponse, OrchestrationError> {
        let email = utterance.sender.email.clone();
        let kind = screen_personal_data(&utterance.text);
        let year = extract_year(&utterance.text);

        let request = match kind {
            PersonalDataKind::Balance => {
                ToolRequest::new(names::LEAVE_GET_BALANCE).with_param("email", email)
            }
            PersonalDataKind::History => {
                let request =
                    ToolRequest::new(names::LEAVE_GET_HISTORY).with_param("email", email);
                match year {
                    Some(year) => request.with_param("year", year),
                    None => request,
                }
            }
            PersonalDataKind::Profile => {
                ToolRequest::new(names::EMPLOYEE_GET_PROFILE).with_param("email", email)
            }
        };

        let result = self.invoke_with_retry(&request, &utterance.conversation_id).await?;
        Ok(match result {
            ToolResult::Success(payload) => match kind {
                PersonalDataKind::Balance => compose(ComposeInput::Balance {
                    payload: &payload,
                    first_name: utterance.sender.first_name(),
                }),
                PersonalDataKind::History => {
                    compose(ComposeInput::History { payload: &payload, year })
                }
                PersonalDataKind::Profile => compose(ComposeInput::Profile { payload: &payload }),
            },
            ToolResult::NotFound => compose(ComposeInput::NotFound { subject: "your records" }),
            ToolResult::ValidationError(message) => {
                compose(ComposeInput::InvalidRequest { message: &message })
            }
            ToolResult::Unavailable { .. } => compose(ComposeInput::Unavailable { state_kept: false }),
        })
    }

    async fn dispatch_approval(
        &self,
        utterance: &Utterance,
        state: ConversationState,
    ) -> Result<ComposedResponse, OrchestrationError> {
        if !utterance.sender.is_manager {
            return Ok(compose(ComposeInput::ManagerOnly));
        }

        match screen_approval_action(&utterance.text) {
            ApprovalAction::List => {
                let request = ToolRequest::new(names::LEAVE_LIST_PENDING_APPROVALS)
                    .with_param("manager_email", utterance.sender.email.clone());
                let result = self.invoke_with_retry(&request, &utterance.conversation_id).await?;
                Ok(match result {
                    ToolResult::Success(payload) => {
                        compose(ComposeInput::PendingApprovals { payload: &payload })
                    }
                    ToolResult::NotFound => {
                        compose(ComposeInput::NotFound { subject: "an approval queue for you" })
                    }
                    ToolResult::ValidationError(message) => {
                        compose(ComposeInput::InvalidRequest { message: &message })
                    }
                    ToolResult::Unavailable { .. } => {
                        compose(ComposeInput::Unavailable { state_kept: false })
                    }
                })
            }
            ApprovalAction::Approve => {
                self.start_workflow(utterance, state, LEAVE_APPROVE_WORKFLOW).await
            }
            ApprovalAction::Reject => {
                self.start_workflow(utterance, state, LEAVE_REJECT_WORKFLOW).await
            }
        }
    }

    async fn start_workflow(
        &self,
        utterance: &Utterance,
        mut state: ConversationState,
        workflow_name: &str,
    ) -> Result<ComposedResponse, OrchestrationError> {
        let definition = self.definition(workflow_name)?.clone();
        let (active, outcome) = self.engine.open(
            &definition,
            &utterance.text,
            utterance.received_at.date_naive(),
        );

        state.workflow = Some(active);
        state.turns = 1;
        self.log_workflow(&utterance.conversation_id, workflow_name, &outcome);

        match outcome {
            SlotFillOutcome::NeedsSlot { prompt, .. } => {
                self.save(state).await?;
                Ok(compose(ComposeInput::Prompt { prompt: &prompt, rejection: None }))
            }
            SlotFillOutcome::AwaitingConfirmation { summary } => {
                self.save(state).await?;
                Ok(compose(ComposeInput::Confirmation { summary: &summary }))
            }
            // `open` never yields these: nothing was confirmed or cancelled.
            SlotFillOutcome::Invalid { .. }
            | SlotFillOutcome::Ready { .. }
            | SlotFillOutcome::Cancelled => {
                Err(OrchestrationError::StateStore("workflow opened in impossible state".into()))
            }
        }
    }

    async fn continue_workflow(
        &self,
        utterance: &Utterance,
        mut state: ConversationState,
        mut active: ActiveWorkflow,
    ) -> Result<ComposedResponse, OrchestrationError> {
        let workflow_name = active.workflow.clone();
        let definition = self.definition(&workflow_name)?.clone();
        let signal = screen_workflow_utterance(&utterance.text);
        let outcome = self.engine.advance(
            &definition,
            &mut active,
            &utterance.text,
            &signal,
            utterance.received_at.date_naive(),
        );
        self.log_workflow(&utterance.conversation_id, definition.name, &outcome);

        match outcome {
            SlotFillOutcome::NeedsSlot { prompt, .. } => {
                state.workflow = Some(active);
                state.turns += 1;
                self.save(state).await?;
                Ok(compose(ComposeInput::Prompt { prompt: &prompt, rejection: None }))
            }
            SlotFillOutcome::Invalid { reason, prompt, .. } => {
                // A rejected value does not advance the turn counter.
                state.workflow = Some(active);
                self.save(state).await?;
                Ok(compose(ComposeInput::Prompt { prompt: &prompt, rejection: Some(&reason) }))
            }
            SlotFillOutcome::AwaitingConfirmation { summary } => {
                state.workflow = Some(active);
                state.turns += 1;
                self.save(state).await?;
                Ok(compose(ComposeInput::Confirmation { summary: &summary }))
            }
            SlotFillOutcome::Cancelled => {
                self.store.clear(&utterance.conversation_id).await?;
                Ok(compose(ComposeInput::Cancelled { title: definition.title }))
            }
            SlotFillOutcome::Ready { params } => {
                self.finalize_workflow(utterance, state, active, &definition, params).await
            }
        }
    }

    /// Fires the terminal capability call. Exactly one attempt: a timeout
    /// or outage keeps the confirmed workflow in the store so the user can
    /// say `try again`, but this code never re-sends on its own.
    async fn finalize_workflow(
        &self,
        utterance: &Utterance,
        mut state: ConversationState,
        mut active: ActiveWorkflow,
        definition: &WorkflowDefinition,
        params: std::collections::BTreeMap<String, String>,
    ) -> Result<ComposedResponse, OrchestrationError> {
        let mut request = ToolRequest::new(definition.capability)
            .with_param(definition.identity_param, utterance.sender.email.clone());
        for (name, value) in params {
            request = request.with_param(name, value);
        }

        let result = self.invoke_once(&request, &utterance.conversation_id).await?;

        // State is written only after the call has returned, so a turn
        // cancelled mid-call leaves the confirmed workflow intact rather
        // than recording an outcome that may not have happened.
        match result {
            ToolResult::Success(payload) => {
                state.workflow = None;
                state.turns = 0;
                self.save(state).await?;
                Ok(match definition.name {
                    LEAVE_APPROVE_WORKFLOW => compose(ComposeInput::Approved { payload: &payload }),
                    LEAVE_REJECT_WORKFLOW => compose(ComposeInput::Rejected { payload: &payload }),
                    _ => compose(ComposeInput::Submitted { payload: &payload }),
                })
            }
            ToolResult::ValidationError(message) => {
                // The backend refused the whole request (e.g. insufficient
                // balance). Keep the workflow so the user can amend a slot
                // or cancel.
                active.awaiting_confirmation = true;
                state.workflow = Some(active);
                self.save(state).await?;
                Ok(compose(ComposeInput::InvalidRequest { message: &message }))
            }
            ToolResult::NotFound => {
                // Stale or mistyped request id: drop it and re-ask.
                if let Some(slot) = definition.slot("request_id") {
                    active.slots.remove(slot.name);
                    active.awaiting_confirmation = false;
                    state.workflow = Some(active);
                    self.save(state).await?;
                    return Ok(compose(ComposeInput::Prompt {
                        prompt: slot.prompt,
                        rejection: Some("I couldn't find that request - it may already be decided."),
                    }));
                }
                state.workflow = None;
                self.save(state).await?;
                Ok(compose(ComposeInput::NotFound { subject: "that request" }))
            }
            ToolResult::Unavailable { .. } => {
                active.awaiting_confirmation = true;
                state.workflow = Some(active);
                self.save(state).await?;
                Ok(compose(ComposeInput::Unavailable { state_kept: true }))
            }
        }
    }

    /// Read-path invoke: bounded retries with exponential backoff, only
    /// for results that declare themselves retryable.
    async fn invoke_with_retry(
        &self,
        request: &ToolRequest,
        conversation_id: &str,
    ) -> Result<ToolResult, OrchestrationError> {
        let mut attempt = 0;
        loop {
            let result = self.invoke_once(request, conversation_id).await?;
            if result.is_retryable() && attempt < self.retry.max_retries {
                let delay = self.retry.delay(attempt);
                info!(
                    event_name = "router.retry",
                    conversation_id = %conversation_id,
                    capability = %request.capability,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }
            return Ok(result);
        }
    }

    async fn invoke_once(
        &self,
        request: &ToolRequest,
        conversation_id: &str,
    ) -> Result<ToolResult, OrchestrationError> {
        let outcome = tokio::time::timeout(self.call_timeout, self.registry.invoke(request)).await;
        let result = match outcome {
            Ok(result) => result?,
            Err(_elapsed) => {
                warn!(
                    event_name = "router.capability_timeout",
                    conversation_id = %conversation_id,
                    capability = %request.capability,
                );
                ToolResult::Unavailable { retryable: true }
            }
        };
        info!(
            event_name = "router.capability_invoked",
            conversation_id = %conversation_id,
            phase = TurnPhase::CapabilityInvoked.as_str(),
            capability = %request.capability,
        );
        Ok(result)
    }

    fn definition(&self, name: &str) -> Result<&WorkflowDefinition, OrchestrationError> {
        self.workflows
            .get(name)
            .ok_or_else(|| OrchestrationError::UnknownWorkflow(name.to_string()))
    }

    async fn save(&self, mut state: ConversationState) -> Result<(), OrchestrationError> {
        state.touch();
        self.store.put(state).await
    }

    fn log_phase(&self, phase: TurnPhase, conversation_id: &str) {
        info!(
            event_name = "router.turn_phase",
            conversation_id = %conversation_id,
            phase = phase.as_str(),
        );
    }

    fn log_workflow(&self, conversation_id: &str, workflow: &str, outcome: &SlotFillOutcome) {
        let outcome_label = match outcome {
            SlotFillOutcome::NeedsSlot { slot, .. } => format!("needs_slot:{slot}"),
            SlotFillOutcome::Invalid { slot, .. } => format!("invalid:{slot}"),
            SlotFillOutcome::AwaitingConfirmation { .. } => "awaiting_confirmation".to_string(),
            SlotFillOutcome::Ready { .. } => "ready".to_string(),
            SlotFillOutcome::Cancelled => "cancelled".to_string(),
        };
        info!(
            event_name = "router.workflow_advanced",
            conversation_id = %conversation_id,
            phase = TurnPhase::WorkflowAdvanced.as_str(),
            workflow = %workflow,
            outcome = %outcome_label,
        );
    }
}
