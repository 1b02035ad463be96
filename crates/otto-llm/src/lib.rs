//! C8/C9/C10 - the three sequential LLM advisor stages (spec.md §4.8-§4.10)
//! plus the provider-agnostic [`client::LlmClient`] capability they share.
//! Every stage follows "propose, never execute": on any failure it falls
//! back to a deterministic, pre-validated output rather than propagating.

pub mod client;
pub mod error;
pub mod master_decision;
pub mod response_generator;
pub mod state_selector;

pub use client::{HttpLlmClient, LlmClient, NoLlmClient};
pub use error::{LlmError, LlmResult};
pub use master_decision::{decide, MasterDecisionInput};
pub use response_generator::{generate_responses, ResponseGeneratorInput};
pub use state_selector::{select_state, StateSelectorInput};
