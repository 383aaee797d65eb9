//! Exit-intent engine assembly.
//!
//! Wires the signal detector, broadcast bus, trigger dispatcher, and popup
//! presenter together, and owns the background timer tasks. The host feeds
//! page events in and provides the popup surface plus cookie and session
//! stores; everything else is internal.

use crate::config::ExitIntentConfig;
use crate::dispatch::{DispatchOutcome, TriggerDispatcher};
use crate::fetch::FormSource;
use crate::page::{
    spawn_time_trigger, ExitReason, InactivityMonitor, PageContext, PageEvent, SignalBus,
    SignalDetector,
};
use crate::presenter::{PopupPresenter, PopupSurface, PresenterState};
use crate::session::SessionState;
use crate::store::{record_exit_attempt, take_exit_attempt, CookieStore, SessionStore, ShownFlagStore};
use chrono::Utc;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Top-level exit-intent engine, one instance per page load.
pub struct ExitIntentEngine {
    config: ExitIntentConfig,
    detector: StdMutex<SignalDetector>,
    dispatcher: Arc<TriggerDispatcher>,
    presenter: Arc<Mutex<PopupPresenter>>,
    session_store: Arc<dyn SessionStore>,
    bus: SignalBus,
    activity: Arc<tokio::sync::Notify>,
    cancel: CancellationToken,
    tasks: StdMutex<Vec<tokio::task::JoinHandle<()>>>,
    dormant: bool,
}

impl ExitIntentEngine {
    pub fn new(
        config: ExitIntentConfig,
        page: PageContext,
        forms: Arc<dyn FormSource>,
        surface: Arc<dyn PopupSurface>,
        cookies: Arc<dyn CookieStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let dormant = config.is_excluded_path(page.path());
        let bus = SignalBus::new();

        let shown_flag = ShownFlagStore::new(
            cookies,
            config.cookie_name.clone(),
            config.cookie_expiry_days,
        );
        let presenter = Arc::new(Mutex::new(PopupPresenter::new(
            surface,
            shown_flag.clone(),
            config.fade_out(),
        )));
        let dispatcher = Arc::new(TriggerDispatcher::new(
            config.clone(),
            SessionState::new(Instant::now()),
            shown_flag,
            forms,
            presenter.clone(),
        ));

        let detector = SignalDetector::new(config.clone(), page, bus.clone());
        let activity = detector.activity_notify();

        Self {
            config,
            detector: StdMutex::new(detector),
            dispatcher,
            presenter,
            session_store,
            bus,
            activity,
            cancel: CancellationToken::new(),
            tasks: StdMutex::new(Vec::new()),
            dormant,
        }
    }

    /// Whether the engine stays inactive for this page.
    pub fn is_dormant(&self) -> bool {
        self.dormant
    }

    pub fn dispatcher(&self) -> &Arc<TriggerDispatcher> {
        &self.dispatcher
    }

    /// Close the visible popup (close button or backdrop dismiss).
    ///
    /// Runs the fade-out before the surface is detached. A no-op unless a
    /// popup is currently visible.
    pub async fn close_popup(&self) -> PresenterState {
        self.presenter.lock().await.close().await
    }

    /// Start the signal pump and the timer-based signal sources.
    pub fn start(&self) {
        if self.dormant {
            tracing::debug!("exit intent disabled on excluded page");
            return;
        }

        let mut tasks = self.tasks.lock().expect("task list lock poisoned");

        let mut subscriber = self.bus.subscribe();
        let dispatcher = self.dispatcher.clone();
        let cancel = self.cancel.clone();
        tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    signal = subscriber.recv() => match signal {
                        Some(signal) => {
                            dispatcher.on_signal(signal).await;
                        }
                        None => break,
                    },
                }
            }
        }));

        if self.config.enable_inactivity {
            tasks.push(InactivityMonitor::spawn(
                self.bus.clone(),
                self.activity.clone(),
                self.config.inactivity_timeout(),
                self.cancel.child_token(),
            ));
        }

        if self.config.enable_time_based {
            if let Some(ms) = self.config.time_on_page_ms {
                tasks.push(spawn_time_trigger(
                    self.bus.clone(),
                    Duration::from_millis(ms),
                    self.cancel.child_token(),
                ));
            }
        }
    }

    /// Run the attempted-exit-then-returned heuristic.
    ///
    /// Call once right after construction; the stored attempt is cleared
    /// regardless of outcome.
    pub async fn detect_return(&self) -> Option<DispatchOutcome> {
        if self.dormant || !self.config.enable_return_detection {
            return None;
        }

        let attempt = take_exit_attempt(&*self.session_store)?;
        let elapsed = Utc::now().signed_duration_since(attempt.at);
        if elapsed.num_milliseconds() < 0
            || elapsed.num_milliseconds() as u64 >= self.config.return_window_ms
        {
            return None;
        }

        tracing::debug!("visitor returned shortly after an attempted exit");
        Some(self.dispatcher.resume_after_return().await)
    }

    /// Feed one page event into the engine.
    pub async fn handle_event(&self, event: PageEvent) -> Option<ExitReason> {
        if self.dormant {
            return None;
        }

        if event == PageEvent::PageHide {
            // The page is actually leaving; record it so the next load can
            // detect a quick return. Only worth noting while nothing has
            // triggered yet.
            let session = self.dispatcher.session_state().await;
            if !session.exit_intent_triggered && !session.popup_shown {
                record_exit_attempt(&*self.session_store, Utc::now());
            }
            return None;
        }

        let mut detector = self.detector.lock().expect("detector lock poisoned");
        detector.handle_event(&event, Instant::now())
    }

    /// Stop all background tasks and cancel any pending display.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.dispatcher.cancel_pending().await;

        let tasks: Vec<_> = {
            let mut guard = self.tasks.lock().expect("task list lock poisoned");
            guard.drain(..).collect()
        };
        for task in tasks {
            let _ = task.await;
        }
    }
}
