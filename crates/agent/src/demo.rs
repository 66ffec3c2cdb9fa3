//! In-process capability fixtures: a small policy corpus and a mutable
//! leave desk. They back the CLI smoke command and the integration tests,
//! and double as the reference for each capability's payload shape.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use hrdesk_core::capability::names;
use hrdesk_core::{Capability, CapabilityDescriptor, CapabilityRegistry, ToolRequest, ToolResult};
use serde_json::{json, Value};
use uuid::Uuid;

/// Keyword-ranked passage search over a fixed corpus.
pub struct PolicySearchFixture {
    passages: Vec<PolicyPassage>,
}

struct PolicyPassage {
    text: &'static str,
    source: &'static str,
    keywords: &'static [&'static str],
}

impl PolicySearchFixture {
    pub fn standard() -> Self {
        Self {
            passages: vec![
                PolicyPassage {
                    text: "Earned leave (EL) accrues at 1.25 days per month and up to 30 days \
                           may be carried forward into the next calendar year.",
                    source: "leave-policy.md",
                    keywords: &["earned", "el", "carry", "forward", "accrue", "carried"],
                },
                PolicyPassage {
                    text: "Casual leave (CL) lapses at year end; it cannot be carried forward \
                           or encashed.",
                    source: "leave-policy.md",
                    keywords: &["casual", "cl", "lapse", "encash", "carry"],
                },
                PolicyPassage {
                    text: "Sick leave (SL) beyond 2 consecutive days requires a medical \
                           certificate submitted within a week of returning.",
                    source: "leave-policy.md",
                    keywords: &["sick", "sl", "certificate", "medical", "doctor"],
                },
                PolicyPassage {
                    text: "Employees may work from home up to 2 days per week with manager \
                           approval recorded in advance.",
                    source: "remote-work-policy.md",
                    keywords: &["work", "home", "wfh", "remote"],
                },
                PolicyPassage {
                    text: "The notice period is 60 days for all roles; accrued earned leave \
                           may be set off against it with HR approval.",
                    source: "exit-policy.md",
                    keywords: &["notice", "period", "resign", "exit"],
                },
            ],
        }
    }
}

#[async_trait]
impl Capability for PolicySearchFixture {
    fn name(&self) -> &str {
        names::POLICY_SEARCH
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::POLICY_SEARCH.to_string(),
            required_params: vec!["query".to_string()],
            result_schema: json!({ "passages": [{ "text": "string", "source": "string" }] }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        let Some(query) = request.str_param("query") else {
            return ToolResult::ValidationError("query must be a string".to_string());
        };
        let query = query.to_ascii_lowercase();

        let mut ranked: Vec<(usize, &PolicyPassage)> = self
            .passages
            .iter()
            .map(|passage| {
                let hits =
                    passage.keywords.iter().filter(|keyword| query.contains(*keyword)).count();
                (hits, passage)
            })
            .filter(|(hits, _)| *hits > 0)
            .collect();

        if ranked.is_empty() {
            return ToolResult::NotFound;
        }
        ranked.sort_by(|a, b| b.0.cmp(&a.0));

        let passages: Vec<Value> = ranked
            .into_iter()
            .take(2)
            .map(|(_, passage)| json!({ "text": passage.text, "source": passage.source }))
            .collect();
        ToolResult::Success(json!({ "passages": passages }))
    }
}

const LEAVE_TYPES: [&str; 5] = ["CL", "SL", "EL", "PL", "ML"];

#[derive(Clone, Debug)]
struct EmployeeRecord {
    email: &'static str,
    name: &'static str,
    department: &'static str,
    designation: &'static str,
    manager_email: Option<&'static str>,
    manager_name: Option<&'static str>,
    joined_on: &'static str,
}

#[derive(Clone, Copy, Debug)]
struct Balance {
    entitled: i64,
    used: i64,
    pending: i64,
}

impl Balance {
    fn available(&self) -> i64 {
        self.entitled - self.used - self.pending
    }
}

#[derive(Clone, Debug)]
struct LeaveRequest {
    request_id: String,
    email: String,
    employee: String,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    days: i64,
    reason: String,
    status: RequestStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }
}

/// Mutable backing store shared by the leave capabilities.
pub struct LeaveDeskData {
    employees: Vec<EmployeeRecord>,
    balances: Vec<(String, String, Balance)>,
    requests: Vec<LeaveRequest>,
}

impl LeaveDeskData {
    fn seeded() -> Self {
        let employees = vec![
            EmployeeRecord {
                email: "priya.sharma@acme.test",
                name: "Priya Sharma",
                department: "Platform Engineering",
                designation: "Senior Engineer",
                manager_email: Some("anil.menon@acme.test"),
                manager_name: Some("Anil Menon"),
                joined_on: "2021-03-15",
            },
            EmployeeRecord {
                email: "rahul.verma@acme.test",
                name: "Rahul Verma",
                department: "Platform Engineering",
                designation: "Engineer",
                manager_email: Some("anil.menon@acme.test"),
                manager_name: Some("Anil Menon"),
                joined_on: "2023-07-01",
            },
            EmployeeRecord {
                email: "anil.menon@acme.test",
                name: "Anil Menon",
                department: "Platform Engineering",
                designation: "Engineering Manager",
                manager_email: None,
                manager_name: None,
                joined_on: "2018-01-08",
            },
        ];

        let mut balances = Vec::new();
        for employee in &employees {
            for (leave_type, entitled) in
                [("CL", 12), ("SL", 10), ("EL", 15), ("PL", 5), ("ML", 0)]
            {
                balances.push((
                    employee.email.to_string(),
                    leave_type.to_string(),
                    Balance { entitled, used: 0, pending: 0 },
                ));
            }
        }

        let mut data = Self { employees, balances, requests: Vec::new() };

        // Priya has used some casual leave; one of Rahul's requests is
        // waiting on Anil.
        if let Some(balance) = data.balance_mut("priya.sharma@acme.test", "CL") {
            balance.used = 5;
        }
        if let Some(balance) = data.balance_mut("priya.sharma@acme.test", "SL") {
            balance.used = 2;
        }
        data.submit(
            "rahul.verma@acme.test",
            "CL",
            NaiveDate::from_ymd_opt(2099, 1, 12).unwrap_or_default(),
            NaiveDate::from_ymd_opt(2099, 1, 13).unwrap_or_default(),
            "family function",
        );
        data
    }

    fn employee(&self, email: &str) -> Option<&EmployeeRecord> {
        self.employees.iter().find(|employee| employee.email == email)
    }

    fn balance_mut(&mut self, email: &str, leave_type: &str) -> Option<&mut Balance> {
        self.balances
            .iter_mut()
            .find(|(e, t, _)| e == email && t == leave_type)
            .map(|(_, _, balance)| balance)
    }

    fn balance(&self, email: &str, leave_type: &str) -> Option<Balance> {
        self.balances
            .iter()
            .find(|(e, t, _)| e == email && t == leave_type)
            .map(|(_, _, balance)| *balance)
    }

    fn submit(
        &mut self,
        email: &str,
        leave_type: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: &str,
    ) -> Option<LeaveRequest> {
        let employee = self.employee(email)?.name.to_string();
        let days = end_date.signed_duration_since(start_date).num_days() + 1;

        let request = LeaveRequest {
            request_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            employee,
            leave_type: leave_type.to_string(),
            start_date,
            end_date,
            days,
            reason: reason.to_string(),
            status: RequestStatus::Pending,
        };
        if let Some(balance) = self.balance_mut(email, leave_type) {
            balance.pending += days;
        }
        self.requests.push(request.clone());
        Some(request)
    }
}

type SharedData = Arc<Mutex<LeaveDeskData>>;

fn lock(data: &SharedData) -> MutexGuard<'_, LeaveDeskData> {
    data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn request_json(request: &LeaveRequest) -> Value {
    json!({
        "request_id": request.request_id,
        "employee": request.employee,
        "leave_type": request.leave_type,
        "start_date": request.start_date.format("%Y-%m-%d").to_string(),
        "end_date": request.end_date.format("%Y-%m-%d").to_string(),
        "days": request.days,
        "reason": request.reason,
        "status": request.status.as_str(),
    })
}

pub struct EmployeeProfileFixture {
    data: SharedData,
}

#[async_trait]
impl Capability for EmployeeProfileFixture {
    fn name(&self) -> &str {
        names::EMPLOYEE_GET_PROFILE
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::EMPLOYEE_GET_PROFILE.to_string(),
            required_params: vec!["email".to_string()],
            result_schema: json!({ "profile": { "name": "string", "email": "string" } }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        let Some(email) = request.str_param("email") else {
            return ToolResult::ValidationError("email must be a string".to_string());
        };
        let data = lock(&self.data);
        let Some(employee) = data.employee(email) else {
            return ToolResult::NotFound;
        };

        ToolResult::Success(json!({
            "profile": {
                "name": employee.name,
                "email": employee.email,
                "department": employee.department,
                "designation": employee.designation,
                "manager": employee.manager_name,
                "joined_on": employee.joined_on,
            }
        }))
    }
}

pub struct LeaveBalanceFixture {
    data: SharedData,
}

#[async_trait]
impl Capability for LeaveBalanceFixture {
    fn name(&self) -> &str {
        names::LEAVE_GET_BALANCE
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::LEAVE_GET_BALANCE.to_string(),
            required_params: vec!["email".to_string()],
            result_schema: json!({
                "balances": [{
                    "leave_type": "string", "entitled": "int", "used": "int",
                    "pending": "int", "available": "int",
                }]
            }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        let Some(email) = request.str_param("email") else {
            return ToolResult::ValidationError("email must be a string".to_string());
        };
        let data = lock(&self.data);
        if data.employee(email).is_none() {
            return ToolResult::NotFound;
        }

        let balances: Vec<Value> = LEAVE_TYPES
            .iter()
            .filter_map(|leave_type| {
                data.balance(email, leave_type).map(|balance| {
                    json!({
                        "leave_type": leave_type,
                        "entitled": balance.entitled,
                        "used": balance.used,
                        "pending": balance.pending,
                        "available": balance.available(),
                    })
                })
            })
            .collect();
        ToolResult::Success(json!({ "balances": balances }))
    }
}

pub struct LeaveHistoryFixture {
    data: SharedData,
}

#[async_trait]
impl Capability for LeaveHistoryFixture {
    fn name(&self) -> &str {
        names::LEAVE_GET_HISTORY
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::LEAVE_GET_HISTORY.to_string(),
            required_params: vec!["email".to_string()],
            result_schema: json!({ "requests": [{ "request_id": "string", "status": "string" }] }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        let Some(email) = request.str_param("email") else {
            return ToolResult::ValidationError("email must be a string".to_string());
        };
        let year = request.param("year").and_then(Value::as_i64);

        let data = lock(&self.data);
        if data.employee(email).is_none() {
            return ToolResult::NotFound;
        }

        let requests: Vec<Value> = data
            .requests
            .iter()
            .filter(|entry| entry.email == email)
            .filter(|entry| year.map_or(true, |year| i64::from(entry.start_date.year()) == year))
            .map(request_json)
            .collect();
        ToolResult::Success(json!({ "requests": requests }))
    }
}

pub struct LeaveSubmitFixture {
    data: SharedData,
}

#[async_trait]
impl Capability for LeaveSubmitFixture {
    fn name(&self) -> &str {
        names::LEAVE_SUBMIT
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::LEAVE_SUBMIT.to_string(),
            required_params: vec![
                "email".to_string(),
                "leave_type".to_string(),
                "start_date".to_string(),
                "end_date".to_string(),
                "reason".to_string(),
            ],
            result_schema: json!({ "request_id": "string", "days": "int", "status": "string" }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        let params = match SubmitParams::from_request(request) {
            Ok(params) => params,
            Err(message) => return ToolResult::ValidationError(message),
        };

        let mut data = lock(&self.data);
        if data.employee(&params.email).is_none() {
            return ToolResult::NotFound;
        }

        // The backend revalidates everything the conversation layer
        // already checked; it is the system of record.
        if params.end_date < params.start_date {
            return ToolResult::ValidationError("end_date precedes start_date".to_string());
        }
        let days = params.end_date.signed_duration_since(params.start_date).num_days() + 1;
        let Some(balance) = data.balance(&params.email, &params.leave_type) else {
            return ToolResult::ValidationError(format!(
                "unknown leave type `{}`",
                params.leave_type
            ));
        };
        if balance.available() < days {
            return ToolResult::ValidationError(format!(
                "Insufficient {} balance: {} available, {} requested.",
                params.leave_type,
                balance.available(),
                days
            ));
        }

        match data.submit(
            &params.email,
            &params.leave_type,
            params.start_date,
            params.end_date,
            &params.reason,
        ) {
            Some(created) => ToolResult::Success(request_json(&created)),
            None => ToolResult::NotFound,
        }
    }
}

struct SubmitParams {
    email: String,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reason: String,
}

impl SubmitParams {
    fn from_request(request: &ToolRequest) -> Result<Self, String> {
        let text = |name: &str| {
            request
                .str_param(name)
                .map(str::to_string)
                .ok_or_else(|| format!("{name} must be a string"))
        };
        let date = |name: &str| {
            text(name).and_then(|value| {
                NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                    .map_err(|_| format!("{name} must be YYYY-MM-DD"))
            })
        };

        Ok(Self {
            email: text("email")?,
            leave_type: text("leave_type")?,
            start_date: date("start_date")?,
            end_date: date("end_date")?,
            reason: text("reason")?,
        })
    }
}

pub struct PendingApprovalsFixture {
    data: SharedData,
}

#[async_trait]
impl Capability for PendingApprovalsFixture {
    fn name(&self) -> &str {
        names::LEAVE_LIST_PENDING_APPROVALS
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::LEAVE_LIST_PENDING_APPROVALS.to_string(),
            required_params: vec!["manager_email".to_string()],
            result_schema: json!({ "requests": [{ "request_id": "string", "employee": "string" }] }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        let Some(manager_email) = request.str_param("manager_email") else {
            return ToolResult::ValidationError("manager_email must be a string".to_string());
        };
        let data = lock(&self.data);

        let requests: Vec<Value> = data
            .requests
            .iter()
            .filter(|entry| entry.status == RequestStatus::Pending)
            .filter(|entry| {
                data.employee(&entry.email)
                    .and_then(|employee| employee.manager_email)
                    .is_some_and(|email| email == manager_email)
            })
            .map(request_json)
            .collect();
        ToolResult::Success(json!({ "requests": requests }))
    }
}

/// Shared decision logic for approve/reject.
fn decide(
    data: &SharedData,
    request: &ToolRequest,
    approve: bool,
) -> ToolResult {
    let Some(manager_email) = request.str_param("manager_email") else {
        return ToolResult::ValidationError("manager_email must be a string".to_string());
    };
    let Some(request_id) = request.str_param("request_id") else {
        return ToolResult::ValidationError("request_id must be a string".to_string());
    };

    let mut data = lock(data);

    let Some(index) = data
        .requests
        .iter()
        .position(|entry| entry.request_id == request_id && entry.status == RequestStatus::Pending)
    else {
        return ToolResult::NotFound;
    };

    let managed = data
        .employee(&data.requests[index].email)
        .and_then(|employee| employee.manager_email)
        .is_some_and(|email| email == manager_email);
    if !managed {
        return ToolResult::ValidationError(
            "that request is not in your approval queue".to_string(),
        );
    }

    let (email, leave_type, days) = {
        let entry = &data.requests[index];
        (entry.email.clone(), entry.leave_type.clone(), entry.days)
    };
    if let Some(balance) = data.balance_mut(&email, &leave_type) {
        balance.pending -= days;
        if approve {
            balance.used += days;
        }
    }
    data.requests[index].status =
        if approve { RequestStatus::Approved } else { RequestStatus::Rejected };

    ToolResult::Success(request_json(&data.requests[index]))
}

pub struct LeaveApproveFixture {
    data: SharedData,
}

#[async_trait]
impl Capability for LeaveApproveFixture {
    fn name(&self) -> &str {
        names::LEAVE_APPROVE
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::LEAVE_APPROVE.to_string(),
            required_params: vec!["manager_email".to_string(), "request_id".to_string()],
            result_schema: json!({ "request_id": "string", "status": "string" }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        decide(&self.data, request, true)
    }
}

pub struct LeaveRejectFixture {
    data: SharedData,
}

#[async_trait]
impl Capability for LeaveRejectFixture {
    fn name(&self) -> &str {
        names::LEAVE_REJECT
    }

    fn describe(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: names::LEAVE_REJECT.to_string(),
            required_params: vec![
                "manager_email".to_string(),
                "request_id".to_string(),
                "reason".to_string(),
            ],
            result_schema: json!({ "request_id": "string", "status": "string" }),
        }
    }

    async fn invoke(&self, request: &ToolRequest) -> ToolResult {
        decide(&self.data, request, false)
    }
}

/// Registry with every capability backed by seeded in-process fixtures.
pub fn demo_registry() -> CapabilityRegistry {
    let data: SharedData = Arc::new(Mutex::new(LeaveDeskData::seeded()));

    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(PolicySearchFixture::standard()));
    registry.register(Arc::new(EmployeeProfileFixture { data: Arc::clone(&data) }));
    registry.register(Arc::new(LeaveBalanceFixture { data: Arc::clone(&data) }));
    registry.register(Arc::new(LeaveHistoryFixture { data: Arc::clone(&data) }));
    registry.register(Arc::new(LeaveSubmitFixture { data: Arc::clone(&data) }));
    registry.register(Arc::new(PendingApprovalsFixture { data: Arc::clone(&data) }));
    registry.register(Arc::new(LeaveApproveFixture { data: Arc::clone(&data) }));
    registry.register(Arc::new(LeaveRejectFixture { data }));
    registry
}
