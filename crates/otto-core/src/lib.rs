//! Otto Core - shared configuration, error taxonomy, correlation-id context,
//! canonical JSON and user-key derivation used by every pipeline stage.
//!
//! # Architectural invariants
//!
//! 1. No component reads `std::env` directly outside [`config::OrchestratorConfig::load`].
//! 2. `user-key` derivation is the only place a phone number is hashed for
//!    identity purposes; every other crate treats it as an opaque string.
//! 3. The correlation id is set once, at the HTTP edge, and read everywhere
//!    else through [`correlation::current_correlation_id`].

pub mod canonical;
pub mod config;
pub mod correlation;
pub mod error;
pub mod userkey;

pub use canonical::{canonical_json, chained_hash};
pub use config::{Environment, LlmThresholds, OrchestratorConfig, StoreBackend};
pub use correlation::{current_correlation_id, new_correlation_id, with_correlation_id};
pub use error::{OttoError, OttoResult};
pub use userkey::derive_user_key;
