//! Signal sources: normalization of page events into exit-intent signals.
//!
//! Each source applies its own minimum-elapsed-time gate before it may fire.
//! Detection is synchronous; only the inactivity and time-on-page sources run
//! as background timers.

use crate::config::ExitIntentConfig;
use crate::error::{SdbiError, SdbiResult};
use crate::page::{ExitReason, ExitSignal, PageEvent, SignalBus};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Host platform hint, used for the macOS-only keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    MacOs,
    #[default]
    Other,
}

impl Platform {
    pub fn is_mac(&self) -> bool {
        matches!(self, Self::MacOs)
    }
}

/// Immutable facts about the hosting page.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Full page URL, used for outbound-origin comparison.
    pub url: Url,
    /// Host platform hint.
    pub platform: Platform,
    /// When the page finished loading.
    pub loaded_at: Instant,
}

impl PageContext {
    pub fn new(url: &str, platform: Platform, loaded_at: Instant) -> SdbiResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| SdbiError::Configuration(format!("Invalid page URL {url}: {e}")))?;
        Ok(Self {
            url,
            platform,
            loaded_at,
        })
    }

    /// Page path, for dataset detection and exclusion checks.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// Window in which a repeated close-shortcut press counts as deliberate.
const DOUBLE_PRESS_WINDOW: Duration = Duration::from_secs(2);

/// Normalizes raw page events into tagged exit-intent signals.
///
/// Stateless apart from the per-source gates: the scroll source fires at most
/// once per page load, and the close-shortcut counter tracks repeated presses.
pub struct SignalDetector {
    config: ExitIntentConfig,
    page: PageContext,
    bus: SignalBus,
    /// Poked on any user activity; observed by the inactivity monitor.
    activity: Arc<Notify>,
    scroll_fired: bool,
    close_press_count: u32,
    last_close_press: Option<Instant>,
}

impl SignalDetector {
    pub fn new(config: ExitIntentConfig, page: PageContext, bus: SignalBus) -> Self {
        Self {
            config,
            page,
            bus,
            activity: Arc::new(Notify::new()),
            scroll_fired: false,
            close_press_count: 0,
            last_close_press: None,
        }
    }

    /// Handle to the activity notifier, for wiring up an [`InactivityMonitor`].
    pub fn activity_notify(&self) -> Arc<Notify> {
        self.activity.clone()
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// Process one page event.
    ///
    /// Emits at most one signal on the bus and returns its reason.
    pub fn handle_event(&mut self, event: &PageEvent, now: Instant) -> Option<ExitReason> {
        let reason = match event {
            PageEvent::PointerMove { y, .. } => {
                self.activity.notify_waiters();
                self.pointer_exit(*y)
            }
            PageEvent::PointerLeave { y } => self.pointer_exit(*y),
            PageEvent::KeyDown {
                key,
                ctrl,
                meta,
                alt,
            } => {
                self.activity.notify_waiters();
                self.keyboard_exit(key, *ctrl, *meta, *alt, now)
            }
            PageEvent::VisibilityChange { hidden } => {
                if *hidden
                    && self.config.enable_tab_switch
                    && self.elapsed_at_least(now, self.config.tab_switch_delay_ms)
                {
                    Some(ExitReason::TabSwitch)
                } else {
                    None
                }
            }
            PageEvent::WindowBlur => {
                if self.config.enable_focus_loss
                    && self.elapsed_at_least(now, self.config.focus_loss_delay_ms)
                {
                    Some(ExitReason::FocusLoss)
                } else {
                    None
                }
            }
            PageEvent::Scroll { percent } => {
                self.activity.notify_waiters();
                if self.config.enable_scroll_based
                    && !self.scroll_fired
                    && *percent >= self.config.scroll_trigger_percent
                {
                    self.scroll_fired = true;
                    Some(ExitReason::Scroll)
                } else {
                    None
                }
            }
            PageEvent::Activity(_) => {
                self.activity.notify_waiters();
                None
            }
            PageEvent::AnchorClick { href } => {
                self.activity.notify_waiters();
                if self.config.enable_outbound_click && self.is_outbound(href) {
                    Some(ExitReason::Click)
                } else {
                    None
                }
            }
            // Unload handling lives in the engine, not in signal detection.
            PageEvent::PageHide => None,
        };

        if let Some(reason) = reason {
            tracing::debug!(reason = reason.as_str(), "exit signal detected");
            self.bus.emit(ExitSignal::new(reason, now));
        }
        reason
    }

    fn pointer_exit(&self, y: i32) -> Option<ExitReason> {
        if y <= self.config.pointer_threshold as i32 {
            Some(ExitReason::Mouse)
        } else {
            None
        }
    }

    fn keyboard_exit(
        &mut self,
        key: &str,
        ctrl: bool,
        meta: bool,
        alt: bool,
        now: Instant,
    ) -> Option<ExitReason> {
        let cmd = if self.page.platform.is_mac() {
            meta
        } else {
            ctrl
        };

        if self.config.enable_keyboard_shortcuts {
            if cmd && matches!(key, "w" | "q" | "x") {
                return Some(ExitReason::Keyboard);
            }
            if alt && key == "F4" {
                return Some(ExitReason::Keyboard);
            }
            if self.page.platform.is_mac() && meta && matches!(key, "h" | "m") {
                return Some(ExitReason::Keyboard);
            }
        }

        if self.config.enable_escape_key
            && key == "Escape"
            && self.elapsed_at_least(now, self.config.escape_key_delay_ms)
        {
            return Some(ExitReason::Escape);
        }

        // Repeated close-shortcut presses count as deliberate even when the
        // immediate shortcut path is disabled.
        if cmd && key == "w" {
            match self.last_close_press {
                Some(last) if now.duration_since(last) < DOUBLE_PRESS_WINDOW => {
                    self.close_press_count += 1;
                }
                _ => self.close_press_count = 1,
            }
            self.last_close_press = Some(now);
            if self.close_press_count >= 2 {
                return Some(ExitReason::Keyboard);
            }
        }

        None
    }

    fn elapsed_at_least(&self, now: Instant, min_ms: u64) -> bool {
        now.duration_since(self.page.loaded_at) >= Duration::from_millis(min_ms)
    }

    /// Only cross-origin targets qualify as outbound.
    fn is_outbound(&self, href: &str) -> bool {
        match Url::parse(href) {
            Ok(target) => target.origin() != self.page.url.origin(),
            // Relative hrefs resolve against the page itself.
            Err(url::ParseError::RelativeUrlWithoutBase) => false,
            Err(_) => false,
        }
    }
}

/// Background timer that emits an `inactivity` signal when no user activity
/// arrives for the configured timeout.
///
/// After firing, the timer stays dormant until the next activity resets it.
pub struct InactivityMonitor;

impl InactivityMonitor {
    pub fn spawn(
        bus: SignalBus,
        activity: Arc<Notify>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = activity.notified() => continue,
                    _ = tokio::time::sleep(timeout) => {
                        bus.emit(ExitSignal::new(ExitReason::Inactivity, Instant::now()));
                        // Dormant until the visitor is active again.
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = activity.notified() => {}
                        }
                    }
                }
            }
        })
    }
}

/// One-shot timer for the optional time-on-page trigger.
pub fn spawn_time_trigger(
    bus: SignalBus,
    delay: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                bus.emit(ExitSignal::new(ExitReason::Time, Instant::now()));
            }
        }
    })
}
