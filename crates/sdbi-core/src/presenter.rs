//! Popup presenter: owns the modal's visual lifecycle.
//!
//! States run `Hidden -> Visible -> Closing -> Removed`. The persisted
//! "already shown" flag is written at the `Hidden -> Visible` transition, so
//! a reload or new tab within the expiry window will not show the popup
//! again. Mutual exclusion of visible popups is enforced by the dispatcher's
//! `popup_shown` check, not here.

use crate::fetch::PopupForm;
use crate::store::ShownFlagStore;
use std::sync::Arc;
use std::time::Duration;

/// Fallback body text when a form has no description.
pub const DEFAULT_BODY: &str = "Mohon isi form ini sebelum Anda meninggalkan halaman.";
/// Close-button label.
pub const CLOSE_LABEL: &str = "Tutup";
/// Open-in-new-tab label.
pub const OPEN_LABEL: &str = "Buka di Tab Baru";

/// Presenter lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenterState {
    Hidden,
    Visible,
    Closing,
    Removed,
}

/// Render-ready description of the popup, handed to the host surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupView {
    pub title: String,
    pub body: String,
    pub iframe_url: String,
    pub open_in_new_tab_url: String,
    pub close_label: &'static str,
    pub open_label: &'static str,
}

impl PopupView {
    pub fn from_form(form: &PopupForm) -> Self {
        Self {
            title: form.title.clone(),
            body: form
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_BODY.to_string()),
            iframe_url: form.form_url.clone(),
            open_in_new_tab_url: form.form_url.clone(),
            close_label: CLOSE_LABEL,
            open_label: OPEN_LABEL,
        }
    }
}

/// Host-provided modal surface.
///
/// `mount` attaches the rendered popup to the document; `unmount` detaches
/// it after the fade-out completes.
pub trait PopupSurface: Send + Sync {
    fn mount(&self, view: &PopupView);
    fn unmount(&self);
}

/// Drives one popup instance through its lifecycle.
pub struct PopupPresenter {
    state: PresenterState,
    surface: Arc<dyn PopupSurface>,
    shown_flag: ShownFlagStore,
    fade_out: Duration,
}

impl PopupPresenter {
    pub fn new(surface: Arc<dyn PopupSurface>, shown_flag: ShownFlagStore, fade_out: Duration) -> Self {
        Self {
            state: PresenterState::Hidden,
            surface,
            shown_flag,
            fade_out,
        }
    }

    pub fn state(&self) -> PresenterState {
        self.state
    }

    /// Display the popup. Only legal from `Hidden`; otherwise a no-op.
    ///
    /// Writes the persisted shown flag at this transition.
    pub fn show(&mut self, form: &PopupForm) -> PresenterState {
        if self.state != PresenterState::Hidden {
            return self.state;
        }

        let view = PopupView::from_form(form);
        self.surface.mount(&view);
        self.shown_flag.mark_shown();
        self.state = PresenterState::Visible;
        tracing::debug!(title = %form.title, "exit intent popup shown");
        self.state
    }

    /// Close the popup (close button or backdrop dismiss).
    ///
    /// Runs the fade-out, then detaches the surface. Only legal from
    /// `Visible`; otherwise a no-op.
    pub async fn close(&mut self) -> PresenterState {
        if self.state != PresenterState::Visible {
            return self.state;
        }

        self.state = PresenterState::Closing;
        tokio::time::sleep(self.fade_out).await;
        self.surface.unmount();
        self.state = PresenterState::Removed;
        self.state
    }
}
