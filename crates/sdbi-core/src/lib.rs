//! sdbi-core - Core library for sdbi-engage.
//!
//! This crate provides the exit-intent engine, usage tracking, and the
//! form-creation wizard for the SDBI data portal. The host embeds it by
//! forwarding normalized page events and providing small capability
//! implementations (popup surface, metrics sink, cookie and session stores);
//! the HTTP side lives in `sdbi-client`.
//!
//! # Example
//!
//! ```ignore
//! use sdbi_core::{EngineConfig, ExitIntentEngine, PageContext, Platform};
//!
//! let config = EngineConfig::default();
//! let page = PageContext::new(url, Platform::Other, Instant::now())?;
//! let engine = ExitIntentEngine::new(
//!     config.exit_intent, page, forms, surface, cookies, session_store,
//! );
//! engine.start();
//! engine.detect_return().await;
//!
//! // Forward page events as they happen
//! engine.handle_event(PageEvent::Scroll { percent: 85 }).await;
//! ```

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod page;
pub mod presenter;
pub mod session;
pub mod store;
pub mod throttle;
pub mod tracking;
pub mod wizard;

// Re-export commonly used types
pub use config::{ClientConfig, EngineConfig, ExitIntentConfig, TrackingConfig};
pub use dispatch::{DispatchOutcome, DisplayHandle, TriggerDispatcher};
pub use engine::ExitIntentEngine;
pub use error::{SdbiError, SdbiResult};
pub use fetch::{FormSource, PopupForm};
pub use page::{
    ActivityKind, ExitReason, ExitSignal, PageContext, PageEvent, Platform, SignalBus,
    SignalDetector,
};
pub use presenter::{PopupPresenter, PopupSurface, PopupView, PresenterState};
pub use session::SessionState;
pub use store::{CookieStore, MemoryCookieStore, MemorySessionStore, SessionStore, ShownFlagStore};
pub use throttle::{RejectReason, ThrottleDecision};
pub use tracking::{
    DownloadCounts, MetricsSink, TrackKind, TrackerHandle, TrackingBackend, UsageTracker,
    ViewCounts,
};
pub use wizard::{Category, FormDraft, FormStatus, UrlValidation, Wizard, WizardStep};
