//! C13 - Pipeline Orchestrator (spec.md §4.13): wires every other `otto-*`
//! crate into the fixed inbound-message pipeline and exposes the one entry
//! point an HTTP handler needs, [`pipeline::Orchestrator::process_envelope`].

pub mod lease;
pub mod outbound;
pub mod pipeline;
pub mod summary;

pub use lease::SessionLeaseMap;
pub use outbound::{MpscOutboundQueue, OutboundJob, OutboundQueue, QueueError};
pub use pipeline::Orchestrator;
pub use summary::{WebhookResponse, WebhookSummary};
