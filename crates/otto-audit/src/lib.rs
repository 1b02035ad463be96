//! C12 - Audit Appender (spec.md §4.12).
//!
//! Two independent logs: the hash-chained [`user_log::UserAuditLog`] (one
//! chain per user-key, CAS append with bounded retry) and the best-effort
//! [`decision_log::DecisionAuditLog`] (append-only, keyed by correlation-id,
//! never fails the pipeline). Grounded on `openibank-audit`/
//! `openibank-db::repos::audit` (repository trait shape, Postgres backend
//! style) generalized from flat audit rows to a hash chain, and on the
//! original `RecordAuditEventUseCase` for the retry/CAS discipline.

pub mod decision_log;
pub mod error;
pub mod user_log;

pub use decision_log::{
    append_best_effort, DecisionAuditLog, MemoryDecisionAuditLog, PostgresDecisionAuditLog,
};
pub use error::{AuditError, AuditResult};
pub use user_log::{
    append_audit_event, verify_chain, AuditEventDraft, MemoryUserAuditLog, PostgresUserAuditLog,
    UserAuditLog,
};
