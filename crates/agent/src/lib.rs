//! Conversation orchestration for the hrdesk HR helpdesk.
//!
//! This crate is the turn pipeline between a messaging surface and the
//! backend capabilities:
//!
//! 1. **Classification** (`classifier`) - map an utterance to one of the
//!    fixed HR intents, with an in-process keyword classifier and an
//!    optional LLM-backed one layered on top
//! 2. **Dialog state** (`state`) - per-conversation store with idle expiry
//!    and a per-conversation lease so turns never interleave
//! 3. **Slot filling** (`slots`) - drive a transactional workflow through
//!    its required parameters, one question per turn
//! 4. **Routing** (`router`) - the per-turn state machine: short-circuit
//!    active workflows, dispatch reads with bounded retries, fire terminal
//!    calls exactly once
//! 5. **Composition** (`composer`) - turn structured payloads into the
//!    final reply text and tables
//!
//! # Safety principle
//!
//! The LLM (when configured) is strictly a translator from text to an
//! intent label. Every decision with consequences - which capability runs,
//! with which validated parameters, after which confirmation - is made by
//! deterministic code in this crate.

pub mod classifier;
pub mod composer;
pub mod demo;
pub mod llm;
pub mod router;
pub mod runtime;
pub mod slots;
pub mod state;

pub use classifier::{IntentClassifier, KeywordClassifier, LlmIntentClassifier};
pub use router::{Router, TurnPhase};
pub use runtime::AgentRuntime;
pub use state::{ConversationState, DialogStateStore, InMemoryStateStore};
