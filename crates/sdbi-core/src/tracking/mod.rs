//! Usage tracking: view/download beacons and periodic counter refresh.
//!
//! On a dataset page the tracker fires a page-view beacon, refreshes the
//! view/download counters shortly after, and keeps refreshing on a fixed
//! interval. The refresh loop is cancellable and skips ticks while the page
//! is hidden.

use crate::config::TrackingConfig;
use crate::error::SdbiResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// What a tracking beacon records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// A dataset page view.
    Page,
    /// A resource link click.
    Resource,
}

impl TrackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Resource => "resource",
        }
    }
}

/// Dataset view counters from the tracking summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCounts {
    pub total: u64,
    pub recent: u64,
}

/// Dataset download counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadCounts {
    pub total: u64,
    pub recent: u64,
    pub today: u64,
}

/// Backend operations the tracker needs; implemented by the portal client.
#[async_trait]
pub trait TrackingBackend: Send + Sync {
    /// Record a page view or resource click.
    async fn send_beacon(&self, url: &str, kind: TrackKind) -> SdbiResult<()>;
    /// Fetch view counters for a dataset.
    async fn view_counts(&self, dataset_id: &str) -> SdbiResult<ViewCounts>;
    /// Resolve a dataset id to its name.
    async fn dataset_name(&self, dataset_id: &str) -> SdbiResult<String>;
    /// Fetch download counters for a dataset name.
    async fn download_counts(&self, dataset_name: &str) -> SdbiResult<DownloadCounts>;
}

/// Host surface the refreshed counters are written to.
pub trait MetricsSink: Send + Sync {
    fn set_view_counts(&self, counts: &ViewCounts);
    fn set_download_counts(&self, counts: &DownloadCounts);
}

/// Extract the dataset id from a page path, if it is a dataset page.
pub fn dataset_id_from_path<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let (_, rest) = path.split_once(prefix)?;
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

/// Whether an anchor href points at a dataset resource.
pub fn is_resource_link(href: &str) -> bool {
    href.contains("/resource/")
}

/// Usage tracker for one page load.
pub struct UsageTracker {
    backend: Arc<dyn TrackingBackend>,
    sink: Arc<dyn MetricsSink>,
    config: TrackingConfig,
}

/// Control handle for a running tracker loop.
pub struct TrackerHandle {
    cancel: CancellationToken,
    hidden_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl TrackerHandle {
    /// Tell the refresh loop whether the page is currently hidden.
    pub fn set_hidden(&self, hidden: bool) {
        let _ = self.hidden_tx.send(hidden);
    }

    /// Stop the refresh loop.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

impl UsageTracker {
    pub fn new(
        backend: Arc<dyn TrackingBackend>,
        sink: Arc<dyn MetricsSink>,
        config: TrackingConfig,
    ) -> Self {
        Self {
            backend,
            sink,
            config,
        }
    }

    /// Begin tracking for the given page path.
    ///
    /// Returns `None` when the path is not a dataset page. Otherwise fires
    /// the page-view beacon and starts the counter-refresh loop.
    pub fn start(&self, page_path: &str) -> Option<TrackerHandle> {
        let dataset_id =
            dataset_id_from_path(page_path, &self.config.dataset_path_prefix)?.to_string();

        let backend = self.backend.clone();
        let sink = self.sink.clone();
        let config = self.config.clone();
        let page_path = page_path.to_string();
        let cancel = CancellationToken::new();
        let (hidden_tx, hidden_rx) = watch::channel(false);

        let loop_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            run_loop(backend, sink, config, page_path, dataset_id, hidden_rx, loop_cancel).await;
        });

        Some(TrackerHandle {
            cancel,
            hidden_tx,
            task,
        })
    }

    /// Record a resource-link click on a dataset page.
    ///
    /// Non-dataset pages and non-resource links are ignored.
    pub async fn track_resource_click(&self, page_path: &str, href: &str) {
        if dataset_id_from_path(page_path, &self.config.dataset_path_prefix).is_none()
            || !is_resource_link(href)
        {
            return;
        }

        tracing::debug!(href, "resource download tracked");
        if let Err(e) = self.backend.send_beacon(href, TrackKind::Resource).await {
            tracing::error!("Download tracking failed: {}", e);
        }
    }
}

async fn run_loop(
    backend: Arc<dyn TrackingBackend>,
    sink: Arc<dyn MetricsSink>,
    config: TrackingConfig,
    page_path: String,
    dataset_id: String,
    hidden_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    if let Err(e) = backend.send_beacon(&page_path, TrackKind::Page).await {
        tracing::error!("Auto-tracking failed: {}", e);
    }

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(config.initial_refresh_delay()) => {}
    }
    refresh(&*backend, &*sink, &dataset_id).await;

    let mut interval = tokio::time::interval(config.refresh_interval());
    // The first tick completes immediately; the initial refresh already ran.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if config.pause_when_hidden && *hidden_rx.borrow() {
                    continue;
                }
                refresh(&*backend, &*sink, &dataset_id).await;
            }
        }
    }
}

/// Refresh view and download counters, tolerating failure on either side.
async fn refresh(backend: &dyn TrackingBackend, sink: &dyn MetricsSink, dataset_id: &str) {
    let views = async {
        match backend.view_counts(dataset_id).await {
            Ok(counts) => sink.set_view_counts(&counts),
            Err(e) => tracing::error!("Failed to update view count: {}", e),
        }
    };
    let downloads = async {
        match backend.dataset_name(dataset_id).await {
            Ok(name) => match backend.download_counts(&name).await {
                Ok(counts) => sink.set_download_counts(&counts),
                Err(e) => tracing::error!("Failed to get download count: {}", e),
            },
            Err(e) => tracing::error!("Failed to get dataset info: {}", e),
        }
    };
    futures::future::join(views, downloads).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdbiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBackend {
        beacons: Mutex<Vec<(String, TrackKind)>>,
        view_calls: AtomicUsize,
        fail_views: bool,
    }

    #[async_trait]
    impl TrackingBackend for FakeBackend {
        async fn send_beacon(&self, url: &str, kind: TrackKind) -> SdbiResult<()> {
            self.beacons.lock().unwrap().push((url.to_string(), kind));
            Ok(())
        }

        async fn view_counts(&self, _dataset_id: &str) -> SdbiResult<ViewCounts> {
            self.view_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_views {
                return Err(SdbiError::api("tracking summary unavailable"));
            }
            Ok(ViewCounts {
                total: 120,
                recent: 7,
            })
        }

        async fn dataset_name(&self, dataset_id: &str) -> SdbiResult<String> {
            Ok(dataset_id.to_string())
        }

        async fn download_counts(&self, _dataset_name: &str) -> SdbiResult<DownloadCounts> {
            Ok(DownloadCounts {
                total: 42,
                recent: 3,
                today: 1,
            })
        }
    }

    #[derive(Default)]
    struct FakeSink {
        views: Mutex<Option<ViewCounts>>,
        downloads: Mutex<Option<DownloadCounts>>,
        refreshes: AtomicUsize,
    }

    impl MetricsSink for FakeSink {
        fn set_view_counts(&self, counts: &ViewCounts) {
            *self.views.lock().unwrap() = Some(*counts);
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }

        fn set_download_counts(&self, counts: &DownloadCounts) {
            *self.downloads.lock().unwrap() = Some(*counts);
        }
    }

    #[test]
    fn test_dataset_id_extraction() {
        assert_eq!(
            dataset_id_from_path("/dataset/curah-hujan-2024", "/dataset/"),
            Some("curah-hujan-2024")
        );
        assert_eq!(dataset_id_from_path("/dataset/", "/dataset/"), None);
        assert_eq!(dataset_id_from_path("/about", "/dataset/"), None);
    }

    #[test]
    fn test_resource_link_detection() {
        assert!(is_resource_link(
            "/dataset/curah-hujan/resource/abc-123/download/data.csv"
        ));
        assert!(!is_resource_link("/dataset/curah-hujan"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_view_beacon_and_initial_refresh() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(FakeSink::default());
        let tracker = UsageTracker::new(backend.clone(), sink.clone(), TrackingConfig::default());

        let handle = tracker.start("/dataset/curah-hujan").unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        {
            let beacons = backend.beacons.lock().unwrap();
            assert_eq!(
                beacons.as_slice(),
                &[("/dataset/curah-hujan".to_string(), TrackKind::Page)]
            );
        }
        assert_eq!(
            *sink.views.lock().unwrap(),
            Some(ViewCounts {
                total: 120,
                recent: 7
            })
        );
        assert_eq!(
            *sink.downloads.lock().unwrap(),
            Some(DownloadCounts {
                total: 42,
                recent: 3,
                today: 1
            })
        );

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_refresh_pauses_while_hidden() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(FakeSink::default());
        let tracker = UsageTracker::new(backend.clone(), sink.clone(), TrackingConfig::default());

        let handle = tracker.start("/dataset/curah-hujan").unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let after_initial = sink.refreshes.load(Ordering::SeqCst);
        assert_eq!(after_initial, 1);

        tokio::time::sleep(Duration::from_millis(30_100)).await;
        assert_eq!(sink.refreshes.load(Ordering::SeqCst), 2);

        handle.set_hidden(true);
        tokio::time::sleep(Duration::from_millis(90_000)).await;
        assert_eq!(sink.refreshes.load(Ordering::SeqCst), 2);

        handle.set_hidden(false);
        tokio::time::sleep(Duration::from_millis(30_100)).await;
        assert_eq!(sink.refreshes.load(Ordering::SeqCst), 3);

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_failure_does_not_block_downloads() {
        let backend = Arc::new(FakeBackend {
            fail_views: true,
            ..Default::default()
        });
        let sink = Arc::new(FakeSink::default());
        let tracker = UsageTracker::new(backend.clone(), sink.clone(), TrackingConfig::default());

        let handle = tracker.start("/dataset/curah-hujan").unwrap();
        tokio::time::sleep(Duration::from_millis(2_100)).await;

        assert!(sink.views.lock().unwrap().is_none());
        assert!(sink.downloads.lock().unwrap().is_some());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_non_dataset_page_not_tracked() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(FakeSink::default());
        let tracker = UsageTracker::new(backend.clone(), sink, TrackingConfig::default());

        assert!(tracker.start("/about").is_none());
        assert!(backend.beacons.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resource_click_filtering() {
        let backend = Arc::new(FakeBackend::default());
        let sink = Arc::new(FakeSink::default());
        let tracker = UsageTracker::new(backend.clone(), sink, TrackingConfig::default());

        tracker
            .track_resource_click("/dataset/curah-hujan", "/dataset/curah-hujan/resource/abc")
            .await;
        tracker
            .track_resource_click("/about", "/dataset/curah-hujan/resource/abc")
            .await;
        tracker
            .track_resource_click("/dataset/curah-hujan", "/dataset/other")
            .await;

        let beacons = backend.beacons.lock().unwrap();
        assert_eq!(beacons.len(), 1);
        assert_eq!(beacons[0].1, TrackKind::Resource);
    }
}
