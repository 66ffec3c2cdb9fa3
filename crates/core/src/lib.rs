//! Deterministic core for the HR helpdesk orchestrator.
//!
//! Everything in this crate is side-effect free and shared process-wide:
//!
//! - `capability` - the uniform invoke/describe contract every backend tool
//!   implements, plus the registry the router resolves names against
//! - `config` - layered configuration (file, env, programmatic overrides)
//! - `domain` - utterances, intents, and the composed response structure
//! - `errors` - typed error taxonomy for the orchestration layer
//! - `workflow` - immutable transactional workflow definitions with slot
//!   validators and relative-date resolution
//!
//! The orchestration logic itself (classifier, state store, slot filling,
//! router, composer) lives in `hrdesk-agent`.

pub mod capability;
pub mod config;
pub mod domain;
pub mod errors;
pub mod workflow;

pub use capability::{
    Capability, CapabilityDescriptor, CapabilityRegistry, ToolRequest, ToolResult,
};
pub use domain::intent::{Classification, Intent};
pub use domain::response::{ComposedResponse, Table};
pub use domain::utterance::{SenderIdentity, Utterance};
pub use errors::{CapabilityError, OrchestrationError};
pub use workflow::{SlotSpec, SlotValidator, WorkflowDefinition, WorkflowTable};
