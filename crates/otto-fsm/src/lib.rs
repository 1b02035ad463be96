//! C7 - Conversation FSM (spec.md §4.7).
//!
//! `dispatch` is a pure function: no I/O, no shared state, total over its
//! input domain. Terminal states accept no events. A second, smaller
//! "LLM-facing view" alphabet is produced by [`to_llm_view`], folding the
//! richer internal alphabet down to the handful of states the LLM advisors
//! and the outward-facing session outcome actually need to reason about.

use std::fmt;

/// Internal conversation states (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Init,
    Identifying,
    UnderstandingIntent,
    Processing,
    GeneratingResponse,
    SelectingMessageType,
    AwaitingUser,
    Escalating,
    Completed,
    Failed,
    Spam,
}

impl State {
    pub const ALL: [State; 11] = [
        State::Init,
        State::Identifying,
        State::UnderstandingIntent,
        State::Processing,
        State::GeneratingResponse,
        State::SelectingMessageType,
        State::AwaitingUser,
        State::Escalating,
        State::Completed,
        State::Failed,
        State::Spam,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            State::Init => "INIT",
            State::Identifying => "IDENTIFYING",
            State::UnderstandingIntent => "UNDERSTANDING_INTENT",
            State::Processing => "PROCESSING",
            State::GeneratingResponse => "GENERATING_RESPONSE",
            State::SelectingMessageType => "SELECTING_MESSAGE_TYPE",
            State::AwaitingUser => "AWAITING_USER",
            State::Escalating => "ESCALATING",
            State::Completed => "COMPLETED",
            State::Failed => "FAILED",
            State::Spam => "SPAM",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        State::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    /// Terminal states accept no further events (spec.md §8 "from each
    /// terminal state, no transition exists for any event").
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Escalating | State::Completed | State::Failed | State::Spam)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    UserSentText,
    UserSentMedia,
    UserSelectedButton,
    UserSelectedListItem,
    EventDetected,
    ResponseGenerated,
    MessageTypeSelected,
    HumanHandoffReady,
    SelfServeComplete,
    ExternalRouteReady,
    SessionTimeout,
    InternalError,
}

impl Event {
    fn is_user_input(self) -> bool {
        matches!(
            self,
            Event::UserSentText
                | Event::UserSentMedia
                | Event::UserSelectedButton
                | Event::UserSelectedListItem
        )
    }
}

/// Downstream work a transition implies. Strings, not an enum, because the
/// orchestrator only ever matches on them by name when logging or branching
/// (spec.md §4.7).
pub type Action = &'static str;

#[derive(Debug, Clone)]
pub struct Transition {
    pub next_state: State,
    pub valid: bool,
    pub error: Option<&'static str>,
    pub actions: Vec<Action>,
}

impl Transition {
    fn rejected(current: State) -> Self {
        Self { next_state: current, valid: false, error: Some("no_transition"), actions: vec![] }
    }
}

/// Pure total dispatch over `(state, event)`.
pub fn dispatch(state: State, event: Event) -> Transition {
    if state.is_terminal() {
        return Transition::rejected(state);
    }

    // Session-level abort events are valid from any non-terminal state.
    if event == Event::SessionTimeout || event == Event::InternalError {
        return Transition {
            next_state: State::Failed,
            valid: true,
            error: None,
            actions: vec!["EMIT_OUTCOME", "PERSIST_SESSION"],
        };
    }

    match (state, event) {
        (State::Init, e) | (State::AwaitingUser, e) if e.is_user_input() => Transition {
            next_state: State::Identifying,
            valid: true,
            error: None,
            actions: vec!["DETECT_EVENT"],
        },

        (State::Identifying, Event::EventDetected) => Transition {
            next_state: State::UnderstandingIntent,
            valid: true,
            error: None,
            actions: vec!["CLASSIFY_INTENT"],
        },

        (State::UnderstandingIntent, Event::ResponseGenerated) => Transition {
            next_state: State::Processing,
            valid: true,
            error: None,
            actions: vec!["PREPARE_RESPONSE"],
        },

        (State::Processing, Event::MessageTypeSelected) => Transition {
            next_state: State::GeneratingResponse,
            valid: true,
            error: None,
            actions: vec!["PREPARE_RESPONSE"],
        },

        (State::GeneratingResponse, Event::MessageTypeSelected) => Transition {
            next_state: State::SelectingMessageType,
            valid: true,
            error: None,
            actions: vec!["SEND_MESSAGE"],
        },

        (State::SelectingMessageType, Event::HumanHandoffReady) => Transition {
            next_state: State::Escalating,
            valid: true,
            error: None,
            actions: vec!["EMIT_OUTCOME", "PERSIST_SESSION"],
        },
        (State::SelectingMessageType, Event::SelfServeComplete) => Transition {
            next_state: State::Completed,
            valid: true,
            error: None,
            actions: vec!["EMIT_OUTCOME", "PERSIST_SESSION"],
        },
        (State::SelectingMessageType, Event::ExternalRouteReady) => Transition {
            next_state: State::Completed,
            valid: true,
            error: None,
            actions: vec!["EMIT_OUTCOME", "PERSIST_SESSION"],
        },
        (State::SelectingMessageType, Event::MessageTypeSelected) => Transition {
            next_state: State::AwaitingUser,
            valid: true,
            error: None,
            actions: vec!["SEND_MESSAGE", "PERSIST_SESSION"],
        },

        _ => Transition::rejected(state),
    }
}

/// Every event accepted from `state`, excluding the session-abort events
/// that are valid everywhere. Used to build the State Selector's
/// `possible-next-states` input (spec.md §4.8).
pub fn possible_next_states(state: State) -> Vec<State> {
    if state.is_terminal() {
        return vec![];
    }
    let candidate_events = [
        Event::UserSentText,
        Event::UserSentMedia,
        Event::UserSelectedButton,
        Event::UserSelectedListItem,
        Event::EventDetected,
        Event::ResponseGenerated,
        Event::MessageTypeSelected,
        Event::HumanHandoffReady,
        Event::SelfServeComplete,
        Event::ExternalRouteReady,
    ];
    let mut next = Vec::new();
    for event in candidate_events {
        let transition = dispatch(state, event);
        if transition.valid && !next.contains(&transition.next_state) {
            next.push(transition.next_state);
        }
    }
    next
}

/// The smaller, LLM-facing alphabet (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmView {
    Init,
    AwaitingUser,
    HandoffHuman,
    SelfServeInfo,
    RouteExternal,
    ScheduledFollowup,
    DuplicateOrSpam,
    FailedInternal,
}

impl LlmView {
    pub fn as_str(self) -> &'static str {
        match self {
            LlmView::Init => "INIT",
            LlmView::AwaitingUser => "AWAITING_USER",
            LlmView::HandoffHuman => "HANDOFF_HUMAN",
            LlmView::SelfServeInfo => "SELF_SERVE_INFO",
            LlmView::RouteExternal => "ROUTE_EXTERNAL",
            LlmView::ScheduledFollowup => "SCHEDULED_FOLLOWUP",
            LlmView::DuplicateOrSpam => "DUPLICATE_OR_SPAM",
            LlmView::FailedInternal => "FAILED_INTERNAL",
        }
    }
}

/// Collapse the internal alphabet onto the LLM-facing view. Unknown internal
/// states fold to `Init` with a structured log (spec.md §4.7
/// `fsm_state_mapping_fallback`).
pub fn to_llm_view(state: State) -> LlmView {
    match state {
        State::Init | State::Identifying | State::UnderstandingIntent | State::Processing
        | State::GeneratingResponse | State::SelectingMessageType => LlmView::Init,
        State::AwaitingUser => LlmView::AwaitingUser,
        State::Escalating => LlmView::HandoffHuman,
        State::Completed => LlmView::SelfServeInfo,
        State::Failed => LlmView::FailedInternal,
        State::Spam => LlmView::DuplicateOrSpam,
    }
}

/// Same as [`to_llm_view`] but for a raw string that may not be a known
/// state name at all (spec.md §4.5 `normalize-current-state` and §4.7
/// `fsm_state_mapping_fallback` share this fallback path).
pub fn llm_view_from_raw(raw: &str) -> LlmView {
    match State::from_str(raw) {
        Some(state) => to_llm_view(state),
        None => {
            tracing::warn!(raw_state = raw, "fsm_state_mapping_fallback");
            LlmView::Init
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_reject_every_event() {
        for state in [State::Escalating, State::Completed, State::Failed, State::Spam] {
            for event in [
                Event::UserSentText,
                Event::EventDetected,
                Event::ResponseGenerated,
                Event::MessageTypeSelected,
                Event::HumanHandoffReady,
                Event::SelfServeComplete,
                Event::ExternalRouteReady,
                Event::SessionTimeout,
                Event::InternalError,
            ] {
                let t = dispatch(state, event);
                assert!(!t.valid, "{state} should reject {event:?}");
            }
        }
    }

    #[test]
    fn happy_path_reaches_awaiting_user() {
        let t = dispatch(State::Init, Event::UserSentText);
        assert!(t.valid);
        assert_eq!(t.next_state, State::Identifying);

        let t = dispatch(State::SelectingMessageType, Event::MessageTypeSelected);
        assert!(t.valid);
        assert_eq!(t.next_state, State::AwaitingUser);
    }

    #[test]
    fn internal_error_is_valid_from_any_non_terminal_state() {
        let t = dispatch(State::Processing, Event::InternalError);
        assert!(t.valid);
        assert_eq!(t.next_state, State::Failed);
    }

    #[test]
    fn unknown_raw_state_folds_to_init_view() {
        assert_eq!(llm_view_from_raw("NOT_A_REAL_STATE"), LlmView::Init);
    }

    #[test]
    fn llm_view_covers_every_internal_state() {
        for state in State::ALL {
            let _ = to_llm_view(state);
        }
    }

    #[test]
    fn terminal_states_have_no_possible_next_states() {
        assert!(possible_next_states(State::Completed).is_empty());
    }

    #[test]
    fn init_can_reach_identifying() {
        let next = possible_next_states(State::Init);
        assert!(next.contains(&State::Identifying));
    }
}
