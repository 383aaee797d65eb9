//! Per-page-load session state for the exit-intent engine.

use std::time::Instant;

/// Mutable trigger-budget state, created once per page load.
///
/// Owned exclusively by the trigger dispatcher and passed into the throttle
/// policy by explicit reference; never exposed as a global.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Start of the current trigger-budget window.
    pub session_start: Instant,
    /// Accepted triggers inside the current window.
    pub trigger_count: u32,
    /// Timestamp of the last accepted trigger.
    pub last_trigger: Option<Instant>,
    /// Latches true on the first accepted trigger and never resets within a
    /// page load.
    pub exit_intent_triggered: bool,
    /// Latches true once a popup has been displayed.
    pub popup_shown: bool,
}

impl SessionState {
    pub fn new(now: Instant) -> Self {
        Self {
            session_start: now,
            trigger_count: 0,
            last_trigger: None,
            exit_intent_triggered: false,
            popup_shown: false,
        }
    }

    /// Record an accepted trigger.
    pub fn record_trigger(&mut self, now: Instant) {
        self.exit_intent_triggered = true;
        self.trigger_count += 1;
        self.last_trigger = Some(now);
    }
}
