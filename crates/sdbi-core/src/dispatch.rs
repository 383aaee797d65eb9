//! Trigger dispatcher: throttles signals and drives the display pipeline.
//!
//! On an accepted signal the dispatcher latches the session state, fetches
//! eligible forms, and schedules the popup after a fixed delay through a
//! cancellable handle. Cancellation and `popup_shown` are both re-checked
//! before the final surface mutation, so a stale fetch resolving late can
//! never raise a second popup.

use crate::config::ExitIntentConfig;
use crate::fetch::{fetch_forms_or_empty, FormSource, PopupForm};
use crate::page::ExitSignal;
use crate::presenter::{PopupPresenter, PresenterState};
use crate::session::SessionState;
use crate::store::ShownFlagStore;
use crate::throttle::{self, RejectReason, ThrottleDecision};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Outcome of dispatching one signal.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The throttle policy rejected the signal.
    Rejected(RejectReason),
    /// Accepted, but no eligible forms; the latch stays set and no retry
    /// happens for the rest of the page load.
    AcceptedNoForms,
    /// Accepted and a display is scheduled.
    Scheduled,
}

impl DispatchOutcome {
    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled)
    }
}

/// Cancellable handle for a scheduled popup display.
///
/// Resolves to `true` once the popup was actually presented.
pub struct DisplayHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<bool>,
}

impl DisplayHandle {
    /// Cancel the scheduled display. Safe to call at any point; once the
    /// popup is visible this has no effect.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the pipeline to finish; `true` if the popup was presented.
    pub async fn finished(self) -> bool {
        self.task.await.unwrap_or(false)
    }
}

/// Deduplicates concurrent signals, applies the throttle policy, and runs
/// the fetch-delay-display pipeline on acceptance.
pub struct TriggerDispatcher {
    config: ExitIntentConfig,
    session: Arc<Mutex<SessionState>>,
    shown_flag: ShownFlagStore,
    forms: Arc<dyn FormSource>,
    presenter: Arc<Mutex<PopupPresenter>>,
    pending: Mutex<Option<DisplayHandle>>,
}

impl TriggerDispatcher {
    pub fn new(
        config: ExitIntentConfig,
        session: SessionState,
        shown_flag: ShownFlagStore,
        forms: Arc<dyn FormSource>,
        presenter: Arc<Mutex<PopupPresenter>>,
    ) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(session)),
            shown_flag,
            forms,
            presenter,
            pending: Mutex::new(None),
        }
    }

    /// Snapshot of the current session state, for hosts and tests.
    pub async fn session_state(&self) -> SessionState {
        self.session.lock().await.clone()
    }

    /// Dispatch one possible-exit signal.
    pub async fn on_signal(&self, signal: ExitSignal) -> DispatchOutcome {
        let decision = {
            let mut session = self.session.lock().await;
            throttle::evaluate(
                &mut session,
                &self.config,
                self.shown_flag.is_set(),
                signal.at,
            )
        };

        match decision {
            ThrottleDecision::Rejected(reason) => {
                tracing::debug!(
                    reason = signal.reason.as_str(),
                    rejected = ?reason,
                    "exit signal throttled"
                );
                return DispatchOutcome::Rejected(reason);
            }
            ThrottleDecision::Accepted => {}
        }

        {
            let mut session = self.session.lock().await;
            session.record_trigger(signal.at);
        }
        tracing::info!(reason = signal.reason.as_str(), "exit intent triggered");

        let forms = fetch_forms_or_empty(&*self.forms).await;
        match forms.into_iter().next() {
            Some(form) => {
                self.schedule_display(form).await;
                DispatchOutcome::Scheduled
            }
            None => {
                tracing::debug!("no eligible exit intent forms");
                DispatchOutcome::AcceptedNoForms
            }
        }
    }

    /// Re-enter the display pipeline after an attempted-exit-then-returned
    /// detection. Bypasses the trigger budget but still honors the persisted
    /// flag and the single-popup latch.
    pub async fn resume_after_return(&self) -> DispatchOutcome {
        if self.shown_flag.is_set() {
            return DispatchOutcome::Rejected(RejectReason::PersistedFlagSet);
        }
        if self.session.lock().await.popup_shown {
            return DispatchOutcome::Rejected(RejectReason::PopupShown);
        }

        let forms = fetch_forms_or_empty(&*self.forms).await;
        match forms.into_iter().next() {
            Some(form) => {
                self.schedule_display(form).await;
                DispatchOutcome::Scheduled
            }
            None => DispatchOutcome::AcceptedNoForms,
        }
    }

    /// Take ownership of the pending display handle, if any.
    pub async fn take_pending(&self) -> Option<DisplayHandle> {
        self.pending.lock().await.take()
    }

    /// Cancel any pending display.
    pub async fn cancel_pending(&self) {
        if let Some(handle) = self.pending.lock().await.take() {
            handle.cancel();
        }
    }

    async fn schedule_display(&self, form: PopupForm) {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let delay = self.config.display_delay();
        let session = self.session.clone();
        let presenter = self.presenter.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return false,
                _ = tokio::time::sleep(delay) => {}
            }
            // Re-check before touching the document: a cancellation or an
            // earlier popup wins over a late-resolving pipeline.
            if token.is_cancelled() {
                return false;
            }
            let mut session = session.lock().await;
            if session.popup_shown {
                return false;
            }
            let mut presenter = presenter.lock().await;
            if presenter.show(&form) == PresenterState::Visible {
                session.popup_shown = true;
                true
            } else {
                false
            }
        });

        let mut pending = self.pending.lock().await;
        if let Some(previous) = pending.take() {
            previous.cancel();
        }
        *pending = Some(DisplayHandle { cancel, task });
    }
}
