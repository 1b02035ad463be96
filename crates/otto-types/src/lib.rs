//! Otto Types - Canonical domain types for the inbound conversation orchestrator
//!
//! This crate contains all foundational types with zero dependencies on other
//! otto crates. It defines the complete wire/domain type system for:
//!
//! - Normalized inbound messages (§3 NormalizedMessage)
//! - Session state and history (§3 Session)
//! - Audit records (§3 AuditEvent, DecisionAuditRecord)
//! - Dedupe entries (§3 DedupeEntry)
//! - LLM advisor input/output contracts (§4.8-§4.10)
//!
//! # Architectural invariants
//!
//! 1. A session holds at most one active intent plus two queued (max 3 total).
//! 2. Message history never exceeds `MAX_HISTORY_ENTRIES`; oldest is pruned first.
//! 3. Every terminal session save carries a valid `Outcome`.
//! 4. `accepted` on a state-selector output implies `confidence >= 0.7`.

pub mod audit;
pub mod dedupe;
pub mod error;
pub mod llm;
pub mod message;
pub mod session;

pub use audit::*;
pub use dedupe::*;
pub use error::*;
pub use llm::*;
pub use message::*;
pub use session::*;

/// Version of the otto-types schema.
pub const TYPES_VERSION: &str = "0.1.0";
