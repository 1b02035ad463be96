//! Otto Store - C3/C4 dedupe and session store capabilities.
//!
//! Three backend variants per capability (spec.md §9 "polymorphic stores"):
//! in-memory (dev only), Redis (distributed KV, native TTL), and a
//! Postgres-backed document table standing in for the spec's Firestore
//! reference (see DESIGN.md). The orchestrator holds these only through the
//! [`dedupe::DedupeStore`] / [`session::SessionStore`] trait objects built by
//! [`factory`]; it never names a concrete backend type.

pub mod dedupe;
pub mod error;
pub mod factory;
pub mod session;

pub use dedupe::{DedupeStore, MemoryDedupeStore, SharedDedupeStore};
pub use error::{StoreError, StoreResult};
pub use factory::{build_dedupe_store, build_session_store, StorePools};
pub use session::{MemorySessionStore, SessionStore, SharedSessionStore};
