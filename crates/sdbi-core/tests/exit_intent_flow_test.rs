//! Integration tests for the exit-intent pipeline.
//!
//! Drives the assembled engine through page events and verifies the
//! throttle, fetch, delay, and presenter stages end to end.

use async_trait::async_trait;
use sdbi_core::error::SdbiResult;
use sdbi_core::page::{PageContext, PageEvent, Platform};
use sdbi_core::presenter::{PopupSurface, PopupView};
use sdbi_core::store::{CookieStore, MemoryCookieStore, MemorySessionStore};
use sdbi_core::{ExitIntentConfig, ExitIntentEngine, ExitReason, FormSource, PopupForm};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Default)]
struct CountingSurface {
    mounts: AtomicUsize,
    unmounts: AtomicUsize,
    titles: Mutex<Vec<String>>,
}

impl PopupSurface for CountingSurface {
    fn mount(&self, view: &PopupView) {
        self.mounts.fetch_add(1, Ordering::SeqCst);
        self.titles.lock().unwrap().push(view.title.clone());
    }
    fn unmount(&self) {
        self.unmounts.fetch_add(1, Ordering::SeqCst);
    }
}

struct StaticForms(Vec<PopupForm>);

#[async_trait]
impl FormSource for StaticForms {
    async fn exit_intent_forms(&self) -> SdbiResult<Vec<PopupForm>> {
        Ok(self.0.clone())
    }
}

struct Fixture {
    engine: ExitIntentEngine,
    surface: Arc<CountingSurface>,
    cookies: Arc<MemoryCookieStore>,
}

fn fixture(forms: Vec<PopupForm>) -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let surface = Arc::new(CountingSurface::default());
    let cookies = Arc::new(MemoryCookieStore::new());
    let page = PageContext::new(
        "https://data.sdbi.example/dataset/curah-hujan-2024",
        Platform::Other,
        Instant::now(),
    )
    .unwrap();
    let engine = ExitIntentEngine::new(
        ExitIntentConfig::default(),
        page,
        Arc::new(StaticForms(forms)),
        surface.clone(),
        cookies.clone(),
        Arc::new(MemorySessionStore::new()),
    );
    Fixture {
        engine,
        surface,
        cookies,
    }
}

fn survey() -> PopupForm {
    PopupForm::new("Survei Kepuasan", "https://forms.google.com/abc")
        .with_description("Bantu kami meningkatkan layanan.")
}

/// Wait until the signal pump has produced a pending display.
async fn pending_display(engine: &ExitIntentEngine) -> Option<sdbi_core::DisplayHandle> {
    for _ in 0..20 {
        if let Some(handle) = engine.dispatcher().take_pending().await {
            return Some(handle);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    None
}

#[tokio::test(start_paused = true)]
async fn test_scroll_trigger_presents_first_form_and_sets_cookie() {
    let f = fixture(vec![survey()]);
    f.engine.start();

    let reason = f.engine.handle_event(PageEvent::Scroll { percent: 85 }).await;
    assert_eq!(reason, Some(ExitReason::Scroll));

    let handle = pending_display(&f.engine).await.expect("display scheduled");
    assert!(handle.finished().await);

    assert_eq!(f.surface.mounts.load(Ordering::SeqCst), 1);
    assert_eq!(f.surface.titles.lock().unwrap()[0], "Survei Kepuasan");
    assert_eq!(f.cookies.get("exit_intent_shown").as_deref(), Some("true"));

    let session = f.engine.dispatcher().session_state().await;
    assert!(session.popup_shown);

    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_no_second_popup_within_one_page_load() {
    let f = fixture(vec![survey()]);
    f.engine.start();

    f.engine.handle_event(PageEvent::Scroll { percent: 90 }).await;
    let handle = pending_display(&f.engine).await.expect("display scheduled");
    assert!(handle.finished().await);

    // Later signals from other sources must not raise a second popup
    f.engine
        .handle_event(PageEvent::KeyDown {
            key: "q".to_string(),
            ctrl: true,
            meta: false,
            alt: false,
        })
        .await;
    f.engine.handle_event(PageEvent::PointerLeave { y: 0 }).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(f.surface.mounts.load(Ordering::SeqCst), 1);
    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_form_list_latches_without_retry() {
    let f = fixture(vec![]);
    f.engine.start();

    f.engine.handle_event(PageEvent::PointerLeave { y: 0 }).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let session = f.engine.dispatcher().session_state().await;
    assert!(session.exit_intent_triggered);
    assert!(!session.popup_shown);
    assert_eq!(f.surface.mounts.load(Ordering::SeqCst), 0);

    // No retry on a later signal
    f.engine.handle_event(PageEvent::PointerLeave { y: 0 }).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(f.surface.mounts.load(Ordering::SeqCst), 0);

    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_persisted_cookie_blocks_popup() {
    let f = fixture(vec![survey()]);
    f.cookies.set("exit_intent_shown", "true", 1);
    f.engine.start();

    f.engine.handle_event(PageEvent::PointerLeave { y: 0 }).await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(f.surface.mounts.load(Ordering::SeqCst), 0);
    let session = f.engine.dispatcher().session_state().await;
    assert!(!session.exit_intent_triggered);

    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_user_close_detaches_popup() {
    use sdbi_core::PresenterState;

    let f = fixture(vec![survey()]);
    f.engine.start();

    f.engine.handle_event(PageEvent::Scroll { percent: 85 }).await;
    let handle = pending_display(&f.engine).await.expect("display scheduled");
    assert!(handle.finished().await);

    assert_eq!(f.engine.close_popup().await, PresenterState::Removed);
    assert_eq!(f.surface.unmounts.load(Ordering::SeqCst), 1);

    // Closing does not reopen the budget: the popup stays gone
    f.engine.handle_event(PageEvent::PointerLeave { y: 0 }).await;
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(f.surface.mounts.load(Ordering::SeqCst), 1);

    f.engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rapid_close_shortcuts_present_once() {
    let f = fixture(vec![survey()]);
    f.engine.start();

    let quit = PageEvent::KeyDown {
        key: "q".to_string(),
        ctrl: true,
        meta: false,
        alt: false,
    };
    f.engine.handle_event(quit.clone()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    f.engine.handle_event(quit).await;

    let handle = pending_display(&f.engine).await.expect("display scheduled");
    assert!(handle.finished().await);
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(f.surface.mounts.load(Ordering::SeqCst), 1);
    f.engine.shutdown().await;
}
