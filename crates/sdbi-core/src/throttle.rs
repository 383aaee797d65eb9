//! Throttle policy: decides whether a possible-exit signal becomes a trigger.

use crate::config::ExitIntentConfig;
use crate::session::SessionState;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Why a candidate trigger was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// A trigger was already accepted this page load.
    AlreadyTriggered,
    /// A popup is already displayed (or was displayed) this page load.
    PopupShown,
    /// The per-session trigger budget is exhausted.
    SessionBudgetExhausted,
    /// Too soon after the last accepted trigger.
    CooldownActive,
    /// The cross-visit "already shown" flag is set.
    PersistedFlagSet,
}

/// Outcome of evaluating the throttle policy for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    Accepted,
    Rejected(RejectReason),
}

impl ThrottleDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Evaluate whether a signal may become a trigger.
///
/// The session-window reset must happen before the budget check so that
/// long-lived tabs get a fresh trigger budget once the window elapses.
pub fn evaluate(
    state: &mut SessionState,
    config: &ExitIntentConfig,
    persisted_flag: bool,
    now: Instant,
) -> ThrottleDecision {
    if state.popup_shown {
        return ThrottleDecision::Rejected(RejectReason::PopupShown);
    }
    if state.exit_intent_triggered {
        return ThrottleDecision::Rejected(RejectReason::AlreadyTriggered);
    }

    if now.duration_since(state.session_start) > config.session_duration() {
        state.session_start = now;
        state.trigger_count = 0;
    }

    if state.trigger_count >= config.max_triggers_per_session {
        return ThrottleDecision::Rejected(RejectReason::SessionBudgetExhausted);
    }

    if let Some(last) = state.last_trigger {
        if now.duration_since(last) < config.trigger_cooldown() {
            return ThrottleDecision::Rejected(RejectReason::CooldownActive);
        }
    }

    if persisted_flag {
        return ThrottleDecision::Rejected(RejectReason::PersistedFlagSet);
    }

    ThrottleDecision::Accepted
}
