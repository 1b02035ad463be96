//! Invariant checking and confidence gating for the three LLM advisor
//! outputs (spec.md §4.8-§4.10), generalized from `openibank-guard`'s
//! "validate every LLM proposal before it is trusted" shape: amount/budget
//! bound-checks there become confidence/index/state-alphabet bound-checks
//! here. Structural invariants that never depend on configuration already
//! live on the `otto_types::llm` constructors; what's here is exactly the
//! configuration-dependent business rules spec.md calls out.

pub mod error;
pub mod master_decision;
pub mod response_generator;
pub mod state_selector;

pub use error::{ValidateError, ValidateResult};
pub use master_decision::validate_final_state;
pub use response_generator::validate_response_count;
pub use state_selector::{apply_pre_check_clamp, validate_confidence_gate};
