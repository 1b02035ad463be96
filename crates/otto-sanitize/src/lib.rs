//! C11 - PII Sanitizer (spec.md §4.11).
//!
//! Deterministic regex-based masking applied (a) to outbound text before
//! audit and enqueue, and (b) to history snippets sent to LLMs. Grounded on
//! the original `sanitizer.py`'s `_PATTERNS` dict (compile once, substitute
//! specific-to-generic) and `openibank-guard`'s "compile patterns once,
//! validate before trust" convention for the `once_cell`/`regex` pairing.
//!
//! `sanitize` is idempotent: the mask tokens it emits (`[CPF]`, `[EMAIL]`,
//! ...) never themselves match one of the patterns, so re-sanitizing
//! already-sanitized text is a no-op.

use once_cell::sync::Lazy;
use otto_types::HistoryEntry;
use regex::Regex;

/// Default number of most-recent history entries fed to an LLM advisor
/// (spec.md §4.11 "truncates LLM history to the last N=5 messages").
pub const DEFAULT_HISTORY_TRUNCATION: usize = 5;

static CPF_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b").unwrap());

static CNPJ_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}\b").unwrap());

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap());

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\+?55\s*\(?\d{2}\)?\s*(?:9\d)?\d{3,4}-?\d{4}|\(?\d{2}\)?\s*(?:9\d)?\d{3,4}-?\d{4}|\b9\d{3,4}-?\d{4}\b",
    )
    .unwrap()
});

/// Mask CPF, CNPJ, email and Brazilian phone numbers in `text`, specific
/// patterns first so a CNPJ's digit run is not partially consumed by the
/// shorter CPF pattern (spec.md §4.11, original `sanitize_response_content`
/// ordering).
pub fn sanitize(text: &str) -> String {
    if text.is_empty() {
        return text.to_string();
    }
    let masked = CNPJ_PATTERN.replace_all(text, "[CNPJ]");
    let masked = CPF_PATTERN.replace_all(&masked, "[CPF]");
    let masked = EMAIL_PATTERN.replace_all(&masked, "[EMAIL]");
    let masked = PHONE_PATTERN.replace_all(&masked, "[PHONE]");
    masked.into_owned()
}

/// Take the most recent `n` history entries and sanitize their summaries,
/// for the truncated day-history view fed to LLM#1/#2/#3 (spec.md §4.11).
pub fn truncate_history(history: &[HistoryEntry], n: usize) -> Vec<HistoryEntry> {
    let start = history.len().saturating_sub(n);
    history[start..]
        .iter()
        .map(|entry| HistoryEntry {
            received_at: entry.received_at,
            message_id: entry.message_id.clone(),
            summary: entry.summary.as_deref().map(sanitize),
        })
        .collect()
}
