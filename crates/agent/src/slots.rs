use std::collections::BTreeMap;

use chrono::NaiveDate;
use hrdesk_core::workflow::{dates, validate};
use hrdesk_core::WorkflowDefinition;
use uuid::Uuid;

use crate::classifier::WorkflowSignal;
use crate::state::ActiveWorkflow;

/// What the conversation needs next, after one utterance has been applied
/// to an active workflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotFillOutcome {
    /// Ask for the named slot. One question per turn, in declared order.
    NeedsSlot { slot: String, prompt: String },
    /// The value was rejected; re-ask the same slot with the reason.
    Invalid { slot: String, reason: String, prompt: String },
    /// All slots are filled; echo the summary and wait for `confirm`.
    AwaitingConfirmation { summary: String },
    /// Confirmed. The canonical parameter set is ready for the terminal
    /// capability call.
    Ready { params: BTreeMap<String, String> },
    Cancelled,
}

/// Drives a workflow through its slots. Stateless: all progress lives in
/// the `ActiveWorkflow` carried by the dialog state store.
#[derive(Clone, Debug, Default)]
pub struct SlotFillingEngine;

impl SlotFillingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Starts a workflow from its opening utterance, harvesting any slot
    /// values already present ("sick leave tomorrow" fills two slots).
    /// Prefilled values go through the same validators as answers; a value
    /// that fails validation is simply not prefilled.
    pub fn open(
        &self,
        definition: &WorkflowDefinition,
        text: &str,
        today: NaiveDate,
    ) -> (ActiveWorkflow, SlotFillOutcome) {
        let mut active = ActiveWorkflow::new(definition.name);

        if let Some(slot) = definition.slot("leave_type") {
            if let Some(mention) = extract_leave_type(text) {
                if let Ok(canonical) = slot.validator.validate(&mention, &active.slots, today) {
                    active.slots.insert(slot.name.to_string(), canonical);
                }
            }
        }

        let mentioned_dates = scan_dates(text, today);
        if let Some(first) = mentioned_dates.first() {
            if let Some(slot) = definition.slot("start_date") {
                if let Ok(canonical) = slot.validator.validate(first, &active.slots, today) {
                    active.slots.insert(slot.name.to_string(), canonical);
                }
            }
        }
        if let Some(second) = mentioned_dates.get(1) {
            if let Some(slot) = definition.slot("end_date") {
                if let Ok(canonical) = slot.validator.validate(second, &active.slots, today) {
                    active.slots.insert(slot.name.to_string(), canonical);
                }
            }
        }

        if let Some(slot) = definition.slot("request_id") {
            if let Some(id) = extract_request_id(text) {
                active.slots.insert(slot.name.to_string(), id);
            }
        }

        let outcome = self.next_question(definition, &mut active);
        (active, outcome)
    }

    /// Applies one in-workflow utterance. The caller has already screened
    /// the text into a `WorkflowSignal`.
    pub fn advance(
        &self,
        definition: &WorkflowDefinition,
        active: &mut ActiveWorkflow,
        text: &str,
        signal: &WorkflowSignal,
        today: NaiveDate,
    ) -> SlotFillOutcome {
        match signal {
            WorkflowSignal::Cancel => SlotFillOutcome::Cancelled,
            WorkflowSignal::Confirm if active.awaiting_confirmation => {
                SlotFillOutcome::Ready { params: active.slots.clone() }
            }
            WorkflowSignal::Amend { slot, value } => self.amend(definition, active, slot, value, today),
            _ if active.awaiting_confirmation => {
                // Anything unrecognized while the summary is outstanding
                // just repeats the summary; confirmation must be explicit.
                SlotFillOutcome::AwaitingConfirmation { summary: summarize(definition, active) }
            }
            _ => self.fill_current(definition, active, text, today),
        }
    }

    fn fill_current(
        &self,
        definition: &WorkflowDefinition,
        active: &mut ActiveWorkflow,
        text: &str,
        today: NaiveDate,
    ) -> SlotFillOutcome {
        let Some(slot) = definition.first_unfilled(&active.slots) else {
            active.awaiting_confirmation = true;
            return SlotFillOutcome::AwaitingConfirmation { summary: summarize(definition, active) };
        };

        match slot.validator.validate(text, &active.slots, today) {
            Ok(canonical) => {
                active.slots.insert(slot.name.to_string(), canonical);
                self.next_question(definition, active)
            }
            Err(reason) => SlotFillOutcome::Invalid {
                slot: slot.name.to_string(),
                reason,
                prompt: slot.prompt.to_string(),
            },
        }
    }

    fn amend(
        &self,
        definition: &WorkflowDefinition,
        active: &mut ActiveWorkflow,
        spoken: &str,
        value: &str,
        today: NaiveDate,
    ) -> SlotFillOutcome {
        let Some(slot) = definition.slot_by_loose_name(spoken) else {
            let fields = definition
                .slots
                .iter()
                .map(|slot| slot.label)
                .collect::<Vec<_>>()
                .join(", ");
            return SlotFillOutcome::Invalid {
                slot: spoken.to_string(),
                reason: format!("There's no `{spoken}` field here."),
                prompt: format!("Fields you can change: {fields}."),
            };
        };

        match slot.validator.validate(value, &active.slots, today) {
            Ok(canonical) => {
                active.slots.insert(slot.name.to_string(), canonical);
                self.next_question(definition, active)
            }
            Err(reason) => SlotFillOutcome::Invalid {
                slot: slot.name.to_string(),
                reason,
                prompt: slot.prompt.to_string(),
            },
        }
    }

    fn next_question(
        &self,
        definition: &WorkflowDefinition,
        active: &mut ActiveWorkflow,
    ) -> SlotFillOutcome {
        match definition.first_unfilled(&active.slots) {
            Some(slot) => {
                active.awaiting_confirmation = false;
                SlotFillOutcome::NeedsSlot {
                    slot: slot.name.to_string(),
                    prompt: slot.prompt.to_string(),
                }
            }
            None => {
                active.awaiting_confirmation = true;
                SlotFillOutcome::AwaitingConfirmation { summary: summarize(definition, active) }
            }
        }
    }
}

fn summarize(definition: &WorkflowDefinition, active: &ActiveWorkflow) -> String {
    let mut lines = vec![format!("Here's the {} I have:", definition.title)];
    for slot in &definition.slots {
        if let Some(value) = active.slots.get(slot.name) {
            lines.push(format!("- {}: {}", slot.label, value));
        }
    }
    lines.push(
        "Reply `confirm` to go ahead, `cancel` to discard, or `change <field> to <value>`."
            .to_string(),
    );
    lines.join("\n")
}

/// Finds a leave-type mention anywhere in free text, checking bigrams
/// before single words so "sick leave" wins over a stray "leave".
fn extract_leave_type(text: &str) -> Option<String> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|token| token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric()).to_string())
        .filter(|token| !token.is_empty())
        .collect();

    for window in tokens.windows(2) {
        let bigram = format!("{} {}", window[0], window[1]);
        if let Some(code) = validate::canonical_leave_type(&bigram) {
            return Some(code);
        }
    }
    tokens.into_iter().find_map(|token| validate::canonical_leave_type(&token))
}

/// Collects date expressions in text order: ISO dates, `today`,
/// `tomorrow`, `day after tomorrow`, and (optionally `next`-prefixed)
/// weekday names. Returned as the original expressions so the slot
/// validators resolve them.
fn scan_dates(text: &str, today: NaiveDate) -> Vec<String> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|token| {
            token
                .trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != '-')
                .to_ascii_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect();

    let mut found = Vec::new();
    let mut index = 0;
    while index < tokens.len() {
        let trigram_matches = index + 2 < tokens.len()
            && tokens[index] == "day"
            && tokens[index + 1] == "after"
            && tokens[index + 2] == "tomorrow";
        if trigram_matches {
            found.push("day after tomorrow".to_string());
            index += 3;
            continue;
        }

        if tokens[index] == "next" && index + 1 < tokens.len() {
            let bigram = format!("next {}", tokens[index + 1]);
            if dates::resolve(&bigram, today).is_some() {
                found.push(bigram);
                index += 2;
                continue;
            }
        }

        if dates::resolve(&tokens[index], today).is_some() {
            found.push(tokens[index].clone());
        }
        index += 1;
    }
    found
}

fn extract_request_id(text: &str) -> Option<String> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|ch: char| !ch.is_ascii_alphanumeric() && ch != '-'))
        .find_map(|token| Uuid::parse_str(token).ok())
        .map(|id| id.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use hrdesk_core::workflow::LEAVE_SUBMIT_WORKFLOW;
    use hrdesk_core::WorkflowTable;

    use super::{scan_dates, SlotFillOutcome, SlotFillingEngine};
    use crate::classifier::WorkflowSignal;

    fn today() -> NaiveDate {
        // A Wednesday.
        NaiveDate::from_ymd_opt(2025, 6, 11).expect("valid date")
    }

    fn submit_definition() -> hrdesk_core::WorkflowDefinition {
        WorkflowTable::standard().get(LEAVE_SUBMIT_WORKFLOW).expect("defined").clone()
    }

    #[test]
    fn opening_utterance_prefills_recognized_slots() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();

        let (active, outcome) =
            engine.open(&definition, "I need sick leave tomorrow", today());

        assert_eq!(active.slots.get("leave_type").map(String::as_str), Some("SL"));
        assert_eq!(active.slots.get("start_date").map(String::as_str), Some("2025-06-12"));
        // end_date is asked next because only one date was mentioned.
        assert!(matches!(outcome, SlotFillOutcome::NeedsSlot { slot, .. } if slot == "end_date"));
    }

    #[test]
    fn two_dates_fill_start_and_end() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();

        let (active, outcome) = engine.open(
            &definition,
            "casual leave from 2025-06-16 to 2025-06-18 please",
            today(),
        );

        assert_eq!(active.slots.get("start_date").map(String::as_str), Some("2025-06-16"));
        assert_eq!(active.slots.get("end_date").map(String::as_str), Some("2025-06-18"));
        assert!(matches!(outcome, SlotFillOutcome::NeedsSlot { slot, .. } if slot == "reason"));
    }

    #[test]
    fn bare_opening_asks_the_first_slot() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();

        let (active, outcome) = engine.open(&definition, "I want to apply for leave", today());
        assert!(active.slots.is_empty());
        assert!(matches!(outcome, SlotFillOutcome::NeedsSlot { slot, .. } if slot == "leave_type"));
    }

    #[test]
    fn invalid_answer_reasks_the_same_slot() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();
        let (mut active, _) = engine.open(&definition, "I want to apply for leave", today());

        let outcome = engine.advance(
            &definition,
            &mut active,
            "sabbatical",
            &WorkflowSignal::SlotValue,
            today(),
        );
        assert!(matches!(&outcome, SlotFillOutcome::Invalid { slot, .. } if slot == "leave_type"));
        assert!(active.slots.is_empty());

        let outcome = engine.advance(
            &definition,
            &mut active,
            "casual",
            &WorkflowSignal::SlotValue,
            today(),
        );
        assert!(matches!(outcome, SlotFillOutcome::NeedsSlot { slot, .. } if slot == "start_date"));
    }

    #[test]
    fn completing_the_last_slot_requests_confirmation() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();
        let (mut active, _) =
            engine.open(&definition, "sick leave from tomorrow to friday", today());

        let outcome = engine.advance(
            &definition,
            &mut active,
            "fever",
            &WorkflowSignal::SlotValue,
            today(),
        );
        let SlotFillOutcome::AwaitingConfirmation { summary } = outcome else {
            panic!("expected confirmation, got {outcome:?}");
        };
        assert!(active.awaiting_confirmation);
        assert!(summary.contains("- leave type: SL"));
        assert!(summary.contains("- start date: 2025-06-12"));
        assert!(summary.contains("- end date: 2025-06-13"));
        assert!(summary.contains("confirm"));
    }

    #[test]
    fn confirm_only_yields_ready_after_the_summary() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();
        let (mut active, _) = engine.open(&definition, "apply for leave", today());

        // Confirm before the summary is just an (invalid) slot answer.
        let outcome = engine.advance(
            &definition,
            &mut active,
            "confirm",
            &WorkflowSignal::Confirm,
            today(),
        );
        assert!(matches!(outcome, SlotFillOutcome::Invalid { .. }));

        for answer in ["sick", "tomorrow", "tomorrow", "fever"] {
            engine.advance(&definition, &mut active, answer, &WorkflowSignal::SlotValue, today());
        }
        assert!(active.awaiting_confirmation);

        let outcome = engine.advance(
            &definition,
            &mut active,
            "confirm",
            &WorkflowSignal::Confirm,
            today(),
        );
        let SlotFillOutcome::Ready { params } = outcome else {
            panic!("expected ready, got {outcome:?}");
        };
        assert_eq!(params.get("leave_type").map(String::as_str), Some("SL"));
        assert_eq!(params.get("reason").map(String::as_str), Some("fever"));
    }

    #[test]
    fn amendment_revalidates_and_resummarizes() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();
        let (mut active, _) =
            engine.open(&definition, "sick leave from 2025-06-16 to 2025-06-17", today());
        engine.advance(&definition, &mut active, "fever", &WorkflowSignal::SlotValue, today());
        assert!(active.awaiting_confirmation);

        let outcome = engine.advance(
            &definition,
            &mut active,
            "change end date to 2025-06-18",
            &WorkflowSignal::Amend {
                slot: "end date".to_string(),
                value: "2025-06-18".to_string(),
            },
            today(),
        );
        assert!(matches!(&outcome, SlotFillOutcome::AwaitingConfirmation { summary }
            if summary.contains("- end date: 2025-06-18")));

        // An amendment that violates cross-slot ordering is rejected and
        // the stored value is untouched.
        let outcome = engine.advance(
            &definition,
            &mut active,
            "change end date to 2025-06-10",
            &WorkflowSignal::Amend {
                slot: "end date".to_string(),
                value: "2025-06-10".to_string(),
            },
            today(),
        );
        assert!(matches!(outcome, SlotFillOutcome::Invalid { .. }));
        assert_eq!(active.slots.get("end_date").map(String::as_str), Some("2025-06-18"));
    }

    #[test]
    fn unknown_amendment_field_lists_the_real_fields() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();
        let (mut active, _) = engine.open(&definition, "apply for leave", today());

        let outcome = engine.advance(
            &definition,
            &mut active,
            "change budget to 5",
            &WorkflowSignal::Amend { slot: "budget".to_string(), value: "5".to_string() },
            today(),
        );
        let SlotFillOutcome::Invalid { reason, prompt, .. } = outcome else {
            panic!("expected invalid");
        };
        assert!(reason.contains("budget"));
        assert!(prompt.contains("leave type"));
    }

    #[test]
    fn cancel_wins_at_any_point() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();
        let (mut active, _) = engine.open(&definition, "sick leave tomorrow", today());

        let outcome = engine.advance(
            &definition,
            &mut active,
            "cancel",
            &WorkflowSignal::Cancel,
            today(),
        );
        assert_eq!(outcome, SlotFillOutcome::Cancelled);
    }

    #[test]
    fn unrecognized_reply_while_awaiting_confirmation_repeats_summary() {
        let engine = SlotFillingEngine::new();
        let definition = submit_definition();
        let (mut active, _) =
            engine.open(&definition, "sick leave from tomorrow to friday", today());
        engine.advance(&definition, &mut active, "fever", &WorkflowSignal::SlotValue, today());

        let outcome = engine.advance(
            &definition,
            &mut active,
            "hmm let me think",
            &WorkflowSignal::SlotValue,
            today(),
        );
        assert!(matches!(outcome, SlotFillOutcome::AwaitingConfirmation { .. }));
        assert!(active.awaiting_confirmation);
    }

    #[test]
    fn date_scan_orders_expressions_and_handles_compounds() {
        assert_eq!(
            scan_dates("from 2025-06-16 to 2025-06-18", today()),
            vec!["2025-06-16".to_string(), "2025-06-18".to_string()]
        );
        assert_eq!(
            scan_dates("day after tomorrow until next friday", today()),
            vec!["day after tomorrow".to_string(), "next friday".to_string()]
        );
        assert!(scan_dates("no dates here", today()).is_empty());
    }
}
