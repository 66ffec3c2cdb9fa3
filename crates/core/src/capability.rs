use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::errors::CapabilityError;

/// Well-known capability names consumed by the router. The registry is not
/// limited to these; they exist so call sites never spell a name twice.
pub mod names {
    pub const POLICY_SEARCH: &str = "policy.search";
    pub const EMPLOYEE_GET_PROFILE: &str = "employee.get_profile";
    pub const LEAVE_GET_BALANCE: &str = "leave.get_balance";
    pub const LEAVE_GET_HISTORY: &str = "leave.get_history";
    pub const LEAVE_SUBMIT: &str = "leave.submit";
    pub const LEAVE_LIST_PENDING_APPROVALS: &str = "leave.list_pending_approvals";
    pub const LEAVE_APPROVE: &str = "leave.approve";
    pub const LEAVE_REJECT: &str = "leave.reject";

    pub const ALL: [&str; 8] = [
        POLICY_SEARCH,
        EMPLOYEE_GET_PROFILE,
        LEAVE_GET_BALANCE,
        LEAVE_GET_HISTORY,
        LEAVE_SUBMIT,
        LEAVE_LIST_PENDING_APPROVALS,
        LEAVE_APPROVE,
        LEAVE_REJECT,
    ];
}

/// A request to one named capability. Parameter order is stable so log
/// output and test snapshots are deterministic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolRequest {
    pub capability: String,
    pub params: BTreeMap<String, Value>,
}

impl ToolRequest {
    pub fn new(capability: impl Into<String>) -> Self {
        Self { capability: capability.into(), params: BTreeMap::new() }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }
}

/// Discriminated outcome of a capability call. The orchestrator never
/// inspects payload shape beyond what the capability's schema declares.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolResult {
    Success(Value),
    NotFound,
    ValidationError(String),
    Unavailable { retryable: bool },
}

impl ToolResult {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { retryable: true })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub required_params: Vec<String>,
    /// Informal shape of the success payload, for operators and tests.
    pub result_schema: Value,
}

/// A callable backend tool: retrieval or structured action. Implementations
/// live with the external collaborators; the orchestrator only sees this
/// contract. Transient infrastructure failure must come back as
/// `Unavailable`, never as a panic through this boundary.
#[async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;
    fn describe(&self) -> CapabilityDescriptor;
    async fn invoke(&self, request: &ToolRequest) -> ToolResult;
}

/// Name-indexed set of capabilities, shared read-only across conversations.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities.insert(capability.name().to_string(), capability);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Capability>, CapabilityError> {
        self.capabilities
            .get(name)
            .cloned()
            .ok_or_else(|| CapabilityError::Unknown(name.to_string()))
    }

    pub fn describe(&self, name: &str) -> Result<CapabilityDescriptor, CapabilityError> {
        Ok(self.get(name)?.describe())
    }

    /// Resolves the capability and dispatches the request. Missing required
    /// parameters are rejected here as a `ValidationError` so individual
    /// capabilities can assume a complete parameter set.
    pub async fn invoke(&self, request: &ToolRequest) -> Result<ToolResult, CapabilityError> {
        let capability = self.get(&request.capability)?;
        let descriptor = capability.describe();

        let missing: Vec<&str> = descriptor
            .required_params
            .iter()
            .filter(|param| !request.params.contains_key(param.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Ok(ToolResult::ValidationError(format!(
                "missing required parameters: {}",
                missing.join(", ")
            )));
        }

        Ok(capability.invoke(request).await)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::{Capability, CapabilityDescriptor, CapabilityRegistry, ToolRequest, ToolResult};
    use crate::errors::CapabilityError;

    struct EchoCapability;

    #[async_trait]
    impl Capability for EchoCapability {
        fn name(&self) -> &str {
            "test.echo"
        }

        fn describe(&self) -> CapabilityDescriptor {
            CapabilityDescriptor {
                name: "test.echo".to_string(),
                required_params: vec!["message".to_string()],
                result_schema: json!({ "echoed": "string" }),
            }
        }

        async fn invoke(&self, request: &ToolRequest) -> ToolResult {
            match request.str_param("message") {
                Some(message) => ToolResult::Success(json!({ "echoed": message })),
                None => ToolResult::ValidationError("message must be a string".to_string()),
            }
        }
    }

    fn registry() -> CapabilityRegistry {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability));
        registry
    }

    #[test]
    fn unknown_name_is_an_error() {
        let error = registry().get("test.missing").err().expect("should be unknown");
        assert_eq!(error, CapabilityError::Unknown("test.missing".to_string()));
    }

    #[tokio::test]
    async fn invoke_rejects_missing_required_params() {
        let result = registry()
            .invoke(&ToolRequest::new("test.echo"))
            .await
            .expect("capability is registered");
        assert!(
            matches!(result, ToolResult::ValidationError(reason) if reason.contains("message"))
        );
    }

    #[tokio::test]
    async fn invoke_dispatches_complete_requests() {
        let request = ToolRequest::new("test.echo").with_param("message", "hello");
        let result = registry().invoke(&request).await.expect("capability is registered");
        assert_eq!(result, ToolResult::Success(json!({ "echoed": "hello" })));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = registry();
        struct Second;
        #[async_trait]
        impl Capability for Second {
            fn name(&self) -> &str {
                "a.second"
            }
            fn describe(&self) -> CapabilityDescriptor {
                CapabilityDescriptor {
                    name: "a.second".to_string(),
                    required_params: Vec::new(),
                    result_schema: serde_json::Value::Null,
                }
            }
            async fn invoke(&self, _request: &ToolRequest) -> ToolResult {
                ToolResult::NotFound
            }
        }
        registry.register(Arc::new(Second));
        assert_eq!(registry.names(), vec!["a.second".to_string(), "test.echo".to_string()]);
    }

    #[test]
    fn only_retryable_unavailable_is_retryable() {
        assert!(ToolResult::Unavailable { retryable: true }.is_retryable());
        assert!(!ToolResult::Unavailable { retryable: false }.is_retryable());
        assert!(!ToolResult::NotFound.is_retryable());
    }
}
