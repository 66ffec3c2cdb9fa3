use hrdesk_core::{ComposedResponse, Table};
use serde_json::Value;

/// Structured material for one reply. The composer is the only place that
/// turns capability payloads into user-facing text; the router never
/// formats anything itself.
#[derive(Clone, Debug)]
pub enum ComposeInput<'a> {
    /// Policy passages. The only variant that carries provenance.
    Policy { payload: &'a Value },
    Balance { payload: &'a Value, first_name: &'a str },
    History { payload: &'a Value, year: Option<i32> },
    Profile { payload: &'a Value },
    PendingApprovals { payload: &'a Value },
    /// Ask the user for a slot value, optionally after a rejection.
    Prompt { prompt: &'a str, rejection: Option<&'a str> },
    Confirmation { summary: &'a str },
    Submitted { payload: &'a Value },
    Approved { payload: &'a Value },
    Rejected { payload: &'a Value },
    Cancelled { title: &'a str },
    NotFound { subject: &'a str },
    InvalidRequest { message: &'a str },
    /// A backend was unreachable. `state_kept` distinguishes a terminal
    /// call (workflow retained, user may retry) from a read.
    Unavailable { state_kept: bool },
    Greeting { first_name: &'a str },
    Clarification,
    /// A non-manager asked for the approval queue or a decision.
    ManagerOnly,
}

pub fn compose(input: ComposeInput<'_>) -> ComposedResponse {
    match input {
        ComposeInput::Policy { payload } => compose_policy(payload),
        ComposeInput::Balance { payload, first_name } => compose_balance(payload, first_name),
        ComposeInput::History { payload, year } => compose_history(payload, year),
        ComposeInput::Profile { payload } => compose_profile(payload),
        ComposeInput::PendingApprovals { payload } => compose_pending(payload),
        ComposeInput::Prompt { prompt, rejection } => match rejection {
            Some(reason) => ComposedResponse::text(format!("{reason} {prompt}")),
            None => ComposedResponse::text(prompt),
        },
        ComposeInput::Confirmation { summary } => ComposedResponse::text(summary),
        ComposeInput::Submitted { payload } => compose_submitted(payload),
        ComposeInput::Approved { payload } => compose_decision(payload, "approved"),
        ComposeInput::Rejected { payload } => compose_decision(payload, "rejected"),
        ComposeInput::Cancelled { title } => ComposedResponse::text(format!(
            "Okay, I've discarded the {title}. Nothing was submitted."
        )),
        ComposeInput::NotFound { subject } => {
            ComposedResponse::text(format!("I couldn't find {subject}."))
        }
        ComposeInput::InvalidRequest { message } => {
            ComposedResponse::text(format!("That didn't go through: {message}"))
        }
        ComposeInput::Unavailable { state_kept } => {
            let text = if state_kept {
                "The leave system is unavailable right now, so nothing was submitted. \
                 Your request is saved - say `try again` in a moment, or `cancel` to drop it."
            } else {
                "That system is unavailable right now. Please try again in a moment."
            };
            ComposedResponse::text(text)
        }
        ComposeInput::Greeting { first_name } => ComposedResponse::text(format!(
            "Hi {first_name}! I can answer policy questions, look up your leave balance, \
             history, or profile, file a leave request, and handle pending approvals."
        )),
        ComposeInput::Clarification => ComposedResponse::text(
            "I didn't quite catch that. I can answer HR policy questions, show your leave \
             balance or history, or file a leave request - which would you like?",
        ),
        ComposeInput::ManagerOnly => ComposedResponse::text(
            "Approvals are only available to managers. I can still help with your own \
             leave - balance, history, or a new request.",
        ),
    }
}

fn compose_policy(payload: &Value) -> ComposedResponse {
    let passages = payload.get("passages").and_then(Value::as_array);
    let Some(passages) = passages.filter(|passages| !passages.is_empty()) else {
        return ComposedResponse::text(
            "I couldn't find anything in the policy documents about that.",
        );
    };

    let text = passages
        .iter()
        .filter_map(|passage| passage.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut sources: Vec<&str> = passages
        .iter()
        .filter_map(|passage| passage.get("source").and_then(Value::as_str))
        .collect();
    sources.dedup();

    let response = ComposedResponse::text(text);
    if sources.is_empty() {
        response
    } else {
        response.with_provenance(format!("Source: {}", sources.join(", ")))
    }
}

fn compose_balance(payload: &Value, first_name: &str) -> ComposedResponse {
    let Some(balances) = payload.get("balances").and_then(Value::as_array) else {
        return ComposedResponse::text("I couldn't read your balance right now.");
    };

    let mut table = Table::new(["type", "entitled", "used", "pending", "available"]);
    for balance in balances {
        table.push_row([
            field_str(balance, "leave_type"),
            field_num(balance, "entitled"),
            field_num(balance, "used"),
            field_num(balance, "pending"),
            field_num(balance, "available"),
        ]);
    }

    ComposedResponse::text(format!("Here's your leave balance, {first_name}:")).with_table(table)
}

fn compose_history(payload: &Value, year: Option<i32>) -> ComposedResponse {
    let Some(entries) = payload.get("requests").and_then(Value::as_array) else {
        return ComposedResponse::text("I couldn't read your leave history right now.");
    };

    let scope = year.map(|year| format!(" in {year}")).unwrap_or_default();
    if entries.is_empty() {
        return ComposedResponse::text(format!("You haven't taken any leave{scope}."));
    }

    let mut table = Table::new(["request", "type", "start", "end", "days", "status"]);
    for entry in entries {
        table.push_row([
            field_str(entry, "request_id"),
            field_str(entry, "leave_type"),
            field_str(entry, "start_date"),
            field_str(entry, "end_date"),
            field_num(entry, "days"),
            field_str(entry, "status"),
        ]);
    }

    ComposedResponse::text(format!("Your leave requests{scope}:")).with_table(table)
}

fn compose_profile(payload: &Value) -> ComposedResponse {
    let Some(profile) = payload.get("profile").and_then(Value::as_object) else {
        return ComposedResponse::text("I couldn't read your profile right now.");
    };

    // Stable field order, independent of payload key order.
    let fields = [
        ("name", "Name"),
        ("email", "Email"),
        ("department", "Department"),
        ("designation", "Designation"),
        ("manager", "Manager"),
        ("joined_on", "Joined"),
    ];

    let mut table = Table::new(["field", "value"]);
    for (key, label) in fields {
        if let Some(value) = profile.get(key).and_then(Value::as_str) {
            table.push_row([label.to_string(), value.to_string()]);
        }
    }

    ComposedResponse::text("Here's what I have on file:").with_table(table)
}

fn compose_pending(payload: &Value) -> ComposedResponse {
    let Some(entries) = payload.get("requests").and_then(Value::as_array) else {
        return ComposedResponse::text("I couldn't read the approval queue right now.");
    };
    if entries.is_empty() {
        return ComposedResponse::text("Nothing is waiting for your approval.");
    }

    let mut table = Table::new(["request", "employee", "type", "start", "end", "days", "reason"]);
    for entry in entries {
        table.push_row([
            field_str(entry, "request_id"),
            field_str(entry, "employee"),
            field_str(entry, "leave_type"),
            field_str(entry, "start_date"),
            field_str(entry, "end_date"),
            field_num(entry, "days"),
            field_str(entry, "reason"),
        ]);
    }

    let text = format!(
        "{} request(s) waiting for you. Say `approve <request id>` or `reject <request id>`.",
        entries.len()
    );
    ComposedResponse::text(text).with_table(table)
}

fn compose_submitted(payload: &Value) -> ComposedResponse {
    let request_id = payload.get("request_id").and_then(Value::as_str).unwrap_or("(unknown)");
    let leave_type = payload.get("leave_type").and_then(Value::as_str).unwrap_or("leave");
    let days = payload.get("days").and_then(Value::as_i64).unwrap_or(0);
    let noun = if days == 1 { "day" } else { "days" };

    ComposedResponse::text(format!(
        "Done - your {leave_type} request for {days} {noun} is submitted and pending approval. \
         Request id: {request_id}."
    ))
}

fn compose_decision(payload: &Value, verb: &str) -> ComposedResponse {
    let request_id = payload.get("request_id").and_then(Value::as_str).unwrap_or("(unknown)");
    let employee = payload.get("employee").and_then(Value::as_str);

    let text = match employee {
        Some(employee) => format!("Request {request_id} from {employee} is {verb}."),
        None => format!("Request {request_id} is {verb}."),
    };
    ComposedResponse::text(text)
}

fn field_str(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or("-").to_string()
}

fn field_num(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_i64).map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{compose, ComposeInput};

    #[test]
    fn policy_answers_carry_provenance() {
        let payload = json!({
            "passages": [
                { "text": "Casual leave cannot be carried forward.", "source": "leave-policy.md" },
                { "text": "Earned leave carries forward up to 30 days.", "source": "leave-policy.md" },
            ]
        });

        let response = compose(ComposeInput::Policy { payload: &payload });
        assert!(response.text.contains("carried forward"));
        assert_eq!(response.provenance.as_deref(), Some("Source: leave-policy.md"));
    }

    #[test]
    fn only_policy_answers_carry_provenance() {
        let payload = json!({ "balances": [] });
        let response = compose(ComposeInput::Balance { payload: &payload, first_name: "Priya" });
        assert_eq!(response.provenance, None);
    }

    #[test]
    fn empty_policy_results_say_so() {
        let payload = json!({ "passages": [] });
        let response = compose(ComposeInput::Policy { payload: &payload });
        assert!(response.text.contains("couldn't find"));
        assert_eq!(response.provenance, None);
    }

    #[test]
    fn balance_table_preserves_payload_order() {
        let payload = json!({
            "balances": [
                { "leave_type": "CL", "entitled": 12, "used": 5, "pending": 0, "available": 7 },
                { "leave_type": "SL", "entitled": 10, "used": 2, "pending": 1, "available": 7 },
            ]
        });

        let response = compose(ComposeInput::Balance { payload: &payload, first_name: "Priya" });
        let table = response.table.expect("tabular");
        assert_eq!(table.columns, vec!["type", "entitled", "used", "pending", "available"]);
        assert_eq!(table.rows[0][0], "CL");
        assert_eq!(table.rows[1][0], "SL");
        assert_eq!(table.rows[0][4], "7");
    }

    #[test]
    fn empty_history_is_a_sentence_not_an_empty_table() {
        let payload = json!({ "requests": [] });
        let response = compose(ComposeInput::History { payload: &payload, year: Some(2024) });
        assert!(response.table.is_none());
        assert!(response.text.contains("2024"));
    }

    #[test]
    fn pending_queue_counts_and_instructs() {
        let payload = json!({
            "requests": [
                { "request_id": "0f81d9c0-9efd-4e4a-8f2b-4e6b2f1a9d11", "employee": "Rahul Verma",
                  "leave_type": "CL", "start_date": "2025-06-16", "end_date": "2025-06-17",
                  "days": 2, "reason": "family function" },
            ]
        });

        let response = compose(ComposeInput::PendingApprovals { payload: &payload });
        assert!(response.text.starts_with("1 request(s)"));
        let table = response.table.expect("tabular");
        assert_eq!(table.rows[0][1], "Rahul Verma");
    }

    #[test]
    fn submission_ack_names_the_request_id() {
        let payload = json!({
            "request_id": "0f81d9c0-9efd-4e4a-8f2b-4e6b2f1a9d11",
            "leave_type": "SL",
            "days": 1,
            "status": "PENDING",
        });

        let response = compose(ComposeInput::Submitted { payload: &payload });
        assert!(response.text.contains("0f81d9c0"));
        assert!(response.text.contains("1 day"));
        assert!(response.text.contains("pending approval"));
    }

    #[test]
    fn unavailable_terminal_call_promises_kept_state() {
        let kept = compose(ComposeInput::Unavailable { state_kept: true });
        assert!(kept.text.contains("nothing was submitted"));
        assert!(kept.text.contains("try again"));

        let read = compose(ComposeInput::Unavailable { state_kept: false });
        assert!(!read.text.contains("saved"));
    }

    #[test]
    fn manager_gate_offers_self_service_alternatives() {
        let response = compose(ComposeInput::ManagerOnly);
        assert!(response.text.contains("managers"));
        assert!(response.text.contains("balance"));
        assert!(response.table.is_none());
        assert_eq!(response.provenance, None);
    }

    #[test]
    fn prompt_prepends_rejection_reason() {
        let response = compose(ComposeInput::Prompt {
            prompt: "Which type of leave?",
            rejection: Some("I don't recognize `sabbatical` as a leave type."),
        });
        assert!(response.text.starts_with("I don't recognize"));
        assert!(response.text.ends_with("Which type of leave?"));
    }
}
