pub mod dates;
pub mod validate;

use std::collections::BTreeMap;

pub use validate::SlotValidator;

use crate::capability::names;

pub const LEAVE_SUBMIT_WORKFLOW: &str = "leave_submit";
pub const LEAVE_APPROVE_WORKFLOW: &str = "leave_approve";
pub const LEAVE_REJECT_WORKFLOW: &str = "leave_reject";

/// A named parameter required to complete a transactional workflow.
#[derive(Clone, Debug)]
pub struct SlotSpec {
    pub name: &'static str,
    /// Human-readable name used in confirmation summaries and amendments.
    pub label: &'static str,
    pub prompt: &'static str,
    pub validator: SlotValidator,
}

/// Static descriptor for one transactional workflow: required slots in
/// declared fill order, plus the terminal capability call signature.
/// Immutable, built once at startup, shared read-only process-wide.
#[derive(Clone, Debug)]
pub struct WorkflowDefinition {
    pub name: &'static str,
    pub title: &'static str,
    pub slots: Vec<SlotSpec>,
    pub capability: &'static str,
    /// Parameter name the sender's identity is passed under.
    pub identity_param: &'static str,
}

impl WorkflowDefinition {
    pub fn slot(&self, name: &str) -> Option<&SlotSpec> {
        self.slots.iter().find(|slot| slot.name == name)
    }

    /// Matches a user-spelled field name against a slot, tolerating spaces
    /// and hyphens ("end date", "end-date", "end_date").
    pub fn slot_by_loose_name(&self, spoken: &str) -> Option<&SlotSpec> {
        let normalized: String = spoken
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|ch| if ch == ' ' || ch == '-' { '_' } else { ch })
            .collect();
        self.slots
            .iter()
            .find(|slot| slot.name == normalized || slot.label.to_ascii_lowercase() == spoken.trim().to_ascii_lowercase())
    }

    /// The first required slot, in declared order, without a value yet.
    pub fn first_unfilled<'a>(&'a self, filled: &BTreeMap<String, String>) -> Option<&'a SlotSpec> {
        self.slots.iter().find(|slot| !filled.contains_key(slot.name))
    }

    pub fn is_complete(&self, filled: &BTreeMap<String, String>) -> bool {
        self.first_unfilled(filled).is_none()
    }
}

/// All workflow definitions, loaded at startup.
#[derive(Clone, Debug)]
pub struct WorkflowTable {
    workflows: Vec<WorkflowDefinition>,
}

impl WorkflowTable {
    pub fn standard() -> Self {
        Self { workflows: vec![leave_submit(), leave_approve(), leave_reject()] }
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|workflow| workflow.name == name)
    }

    pub fn definitions(&self) -> &[WorkflowDefinition] {
        &self.workflows
    }
}

impl Default for WorkflowTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn leave_submit() -> WorkflowDefinition {
    WorkflowDefinition {
        name: LEAVE_SUBMIT_WORKFLOW,
        title: "leave request",
        slots: vec![
            SlotSpec {
                name: "leave_type",
                label: "leave type",
                prompt: "Which type of leave? (CL casual, SL sick, EL earned, PL paternity, ML maternity)",
                validator: SlotValidator::LeaveType,
            },
            SlotSpec {
                name: "start_date",
                label: "start date",
                prompt: "When should the leave start? (YYYY-MM-DD, `today`, or `tomorrow`)",
                validator: SlotValidator::Date { allow_past: false },
            },
            SlotSpec {
                name: "end_date",
                label: "end date",
                prompt: "When should the leave end? (YYYY-MM-DD, or the same date for a single day)",
                validator: SlotValidator::DateOnOrAfter { other_slot: "start_date" },
            },
            SlotSpec {
                name: "reason",
                label: "reason",
                prompt: "What's the reason for the leave?",
                validator: SlotValidator::Text { min_len: 3 },
            },
        ],
        capability: names::LEAVE_SUBMIT,
        identity_param: "email",
    }
}

fn leave_approve() -> WorkflowDefinition {
    WorkflowDefinition {
        name: LEAVE_APPROVE_WORKFLOW,
        title: "leave approval",
        slots: vec![SlotSpec {
            name: "request_id",
            label: "request id",
            prompt: "Which request should I approve? (paste the request id)",
            validator: SlotValidator::RequestId,
        }],
        capability: names::LEAVE_APPROVE,
        identity_param: "manager_email",
    }
}

fn leave_reject() -> WorkflowDefinition {
    WorkflowDefinition {
        name: LEAVE_REJECT_WORKFLOW,
        title: "leave rejection",
        slots: vec![
            SlotSpec {
                name: "request_id",
                label: "request id",
                prompt: "Which request should I reject? (paste the request id)",
                validator: SlotValidator::RequestId,
            },
            SlotSpec {
                name: "reason",
                label: "reason",
                prompt: "What's the reason for rejecting it?",
                validator: SlotValidator::Text { min_len: 3 },
            },
        ],
        capability: names::LEAVE_REJECT,
        identity_param: "manager_email",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{WorkflowTable, LEAVE_REJECT_WORKFLOW, LEAVE_SUBMIT_WORKFLOW};

    #[test]
    fn standard_table_contains_all_workflows() {
        let table = WorkflowTable::standard();
        assert_eq!(table.definitions().len(), 3);
        assert!(table.get(LEAVE_SUBMIT_WORKFLOW).is_some());
        assert!(table.get("leave_transfer").is_none());
    }

    #[test]
    fn first_unfilled_follows_declared_order() {
        let table = WorkflowTable::standard();
        let workflow = table.get(LEAVE_SUBMIT_WORKFLOW).expect("defined");

        let mut filled = BTreeMap::new();
        assert_eq!(workflow.first_unfilled(&filled).map(|slot| slot.name), Some("leave_type"));

        // Filling a later slot does not change which slot is asked first.
        filled.insert("end_date".to_string(), "2025-06-20".to_string());
        assert_eq!(workflow.first_unfilled(&filled).map(|slot| slot.name), Some("leave_type"));

        filled.insert("leave_type".to_string(), "SL".to_string());
        assert_eq!(workflow.first_unfilled(&filled).map(|slot| slot.name), Some("start_date"));
    }

    #[test]
    fn is_complete_requires_every_slot() {
        let table = WorkflowTable::standard();
        let workflow = table.get(LEAVE_REJECT_WORKFLOW).expect("defined");

        let mut filled = BTreeMap::new();
        filled.insert("request_id".to_string(), "0f81d9c0-9efd-4e4a-8f2b-4e6b2f1a9d11".to_string());
        assert!(!workflow.is_complete(&filled));

        filled.insert("reason".to_string(), "team is at capacity that week".to_string());
        assert!(workflow.is_complete(&filled));
    }

    #[test]
    fn loose_slot_names_match_spoken_fields() {
        let table = WorkflowTable::standard();
        let workflow = table.get(LEAVE_SUBMIT_WORKFLOW).expect("defined");

        assert_eq!(workflow.slot_by_loose_name("end date").map(|slot| slot.name), Some("end_date"));
        assert_eq!(workflow.slot_by_loose_name("End-Date").map(|slot| slot.name), Some("end_date"));
        assert!(workflow.slot_by_loose_name("budget").is_none());
    }
}
