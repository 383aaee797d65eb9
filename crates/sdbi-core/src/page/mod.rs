//! Abstract page events and exit-intent signals.
//!
//! The host embeds the engine by forwarding normalized browser happenings as
//! [`PageEvent`]s; the engine never touches a real DOM. Detected exit intent
//! is published as [`ExitSignal`]s on a broadcast bus.

mod bus;
mod detector;

pub use bus::{SignalBus, SignalSubscriber};
pub use detector::{
    spawn_time_trigger, InactivityMonitor, PageContext, Platform, SignalDetector,
};

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A normalized browser happening forwarded by the host page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// Pointer moved inside the viewport.
    PointerMove { x: i32, y: i32 },
    /// Pointer left the viewport at the given vertical position.
    PointerLeave { y: i32 },
    /// A key went down, with the active modifiers.
    KeyDown {
        key: String,
        ctrl: bool,
        meta: bool,
        alt: bool,
    },
    /// The document became hidden or visible again.
    VisibilityChange { hidden: bool },
    /// The window lost focus.
    WindowBlur,
    /// The page scrolled to the given depth (percent of document height).
    Scroll { percent: u8 },
    /// Generic user activity, used to reset the inactivity timer.
    Activity(ActivityKind),
    /// An anchor was clicked.
    AnchorClick { href: String },
    /// The page is being hidden for good (navigation or close).
    PageHide,
}

/// Kinds of user activity that count against the inactivity timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
}

/// Why an exit-intent signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Mouse,
    Keyboard,
    Escape,
    TabSwitch,
    FocusLoss,
    Scroll,
    Time,
    Inactivity,
    Click,
}

impl ExitReason {
    /// Reason tag for logging and filtering.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mouse => "mouse",
            Self::Keyboard => "keyboard",
            Self::Escape => "escape",
            Self::TabSwitch => "tab_switch",
            Self::FocusLoss => "focus_loss",
            Self::Scroll => "scroll",
            Self::Time => "time",
            Self::Inactivity => "inactivity",
            Self::Click => "click",
        }
    }
}

/// A possible-exit signal emitted by a signal source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitSignal {
    /// Why the source believes the visitor is leaving.
    pub reason: ExitReason,
    /// When the signal was detected.
    pub at: Instant,
}

impl ExitSignal {
    pub fn new(reason: ExitReason, at: Instant) -> Self {
        Self { reason, at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_tags() {
        assert_eq!(ExitReason::TabSwitch.as_str(), "tab_switch");
        assert_eq!(ExitReason::Click.as_str(), "click");

        let json = serde_json::to_string(&ExitReason::FocusLoss).unwrap();
        assert_eq!(json, r#""focus_loss""#);
    }
}
