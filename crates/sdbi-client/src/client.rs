//! Portal client implementation for the SDBI tracking and forms endpoints.

use sdbi_core::config::ClientConfig;
use sdbi_core::error::{SdbiError, SdbiResult};
use sdbi_core::fetch::{FormSource, PopupForm};
use sdbi_core::tracking::{DownloadCounts, TrackKind, TrackingBackend, ViewCounts};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the SDBI portal endpoints.
pub struct PortalClient {
    client: Client,
    config: ClientConfig,
}

/// Which tracking route accepted the beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackRoute {
    /// The portal's own tracking endpoint.
    Primary,
    /// The CKAN usertracking fallback.
    Fallback,
}

#[derive(Debug, Serialize)]
struct TrackRequest<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Deserialize)]
struct PackageShowResponse {
    success: bool,
    #[serde(default)]
    result: Option<PackageResult>,
}

/// Dataset fields returned by `package_show`.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageResult {
    pub name: String,
    #[serde(default)]
    pub tracking_summary: Option<TrackingSummary>,
}

/// View counters embedded in the `package_show` response.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrackingSummary {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub recent: u64,
}

#[derive(Debug, Deserialize)]
struct DownloadsResponse {
    #[serde(default)]
    total_downloads: u64,
    #[serde(default)]
    recent_downloads: u64,
    #[serde(default)]
    today_downloads: u64,
}

#[derive(Debug, Deserialize)]
struct ExitIntentFormsResponse {
    success: bool,
    #[serde(default)]
    forms: Vec<PopupForm>,
}

impl PortalClient {
    /// Create a new portal client for the given base URL.
    pub fn new(base_url: &str) -> SdbiResult<Self> {
        let config = ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        };
        Self::with_config(config)
    }

    /// Create a new portal client with full endpoint configuration.
    pub fn with_config(config: ClientConfig) -> SdbiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SdbiError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Record a page view or resource click.
    ///
    /// Tries the portal's tracking endpoint first; any failure falls back to
    /// the CKAN usertracking endpoint with form encoding.
    pub async fn track(&self, url: &str, kind: TrackKind) -> SdbiResult<TrackRoute> {
        let body = TrackRequest {
            url,
            kind: kind.as_str(),
        };

        let primary = self
            .client
            .post(self.url(&self.config.tracking_path))
            .header("X-Sdbi-Delivery", uuid::Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await;

        match primary {
            Ok(response) if response.status().is_success() => return Ok(TrackRoute::Primary),
            Ok(response) => {
                tracing::warn!(
                    status = %response.status(),
                    "Auto-tracking failed, falling back to usertracking"
                );
            }
            Err(e) => {
                tracing::warn!("Auto-tracking failed, falling back to usertracking: {}", e);
            }
        }

        let response = self
            .client
            .post(self.url(&self.config.tracking_fallback_path))
            .form(&[("url", url), ("type", kind.as_str())])
            .send()
            .await
            .map_err(|e| SdbiError::network("UserTracking fallback failed", e))?;

        if !response.status().is_success() {
            return Err(SdbiError::api(format!(
                "UserTracking fallback failed: {}",
                response.status()
            )));
        }

        Ok(TrackRoute::Fallback)
    }

    /// Fetch a dataset, optionally with its tracking summary.
    pub async fn package_show(
        &self,
        id: &str,
        include_tracking: bool,
    ) -> SdbiResult<PackageResult> {
        let mut body = serde_json::json!({ "id": id });
        if include_tracking {
            body["include_tracking"] = serde_json::json!(true);
        }

        let response = self
            .client
            .post(self.url(&self.config.package_show_path))
            .json(&body)
            .send()
            .await
            .map_err(|e| SdbiError::network("Failed to get dataset info", e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SdbiError::api(format!(
                "Failed to get dataset info: {status}"
            )));
        }

        let result: PackageShowResponse = response
            .json()
            .await
            .map_err(|e| SdbiError::parse(format!("Failed to parse package_show response: {e}")))?;

        if !result.success {
            return Err(SdbiError::api("package_show returned success=false"));
        }
        result
            .result
            .ok_or_else(|| SdbiError::parse("package_show response missing result"))
    }

    /// Fetch download counters for a dataset name.
    pub async fn downloads(&self, dataset_name: &str) -> SdbiResult<DownloadCounts> {
        let response = self
            .client
            .get(format!(
                "{}/{}",
                self.url(&self.config.downloads_path),
                dataset_name
            ))
            .send()
            .await
            .map_err(|e| SdbiError::network("Failed to get download count", e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SdbiError::api(format!(
                "Failed to get download count: {status}"
            )));
        }

        let counts: DownloadsResponse = response
            .json()
            .await
            .map_err(|e| SdbiError::parse(format!("Failed to parse downloads response: {e}")))?;

        Ok(DownloadCounts {
            total: counts.total_downloads,
            recent: counts.recent_downloads,
            today: counts.today_downloads,
        })
    }

    /// Fetch the forms eligible for the exit-intent popup.
    pub async fn exit_intent_forms(&self) -> SdbiResult<Vec<PopupForm>> {
        let response = self
            .client
            .get(self.url(&self.config.exit_intent_forms_path))
            .send()
            .await
            .map_err(|e| SdbiError::network("Failed to fetch exit intent forms", e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SdbiError::api(format!(
                "Failed to fetch exit intent forms: {status}"
            )));
        }

        let result: ExitIntentFormsResponse = response
            .json()
            .await
            .map_err(|e| SdbiError::parse(format!("Failed to parse forms response: {e}")))?;

        if !result.success {
            return Err(SdbiError::api("exit-intent forms returned success=false"));
        }
        Ok(result.forms)
    }

    /// Submit a new survey form registration.
    ///
    /// Takes the form-encoded pairs produced by the wizard's `submission`.
    pub async fn submit_form(&self, fields: &[(&'static str, String)]) -> SdbiResult<()> {
        let response = self
            .client
            .post(self.url(&self.config.form_create_path))
            .form(fields)
            .send()
            .await
            .map_err(|e| SdbiError::network("Failed to submit form", e))?;

        let status = response.status();
        // A successful save redirects to the form view page.
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(SdbiError::api(format!("Failed to submit form: {status}")))
        }
    }
}

#[async_trait]
impl FormSource for PortalClient {
    async fn exit_intent_forms(&self) -> SdbiResult<Vec<PopupForm>> {
        PortalClient::exit_intent_forms(self).await
    }
}

#[async_trait]
impl TrackingBackend for PortalClient {
    async fn send_beacon(&self, url: &str, kind: TrackKind) -> SdbiResult<()> {
        self.track(url, kind).await.map(|_| ())
    }

    async fn view_counts(&self, dataset_id: &str) -> SdbiResult<ViewCounts> {
        let package = self.package_show(dataset_id, true).await?;
        let summary = package
            .tracking_summary
            .ok_or_else(|| SdbiError::parse("package_show response missing tracking_summary"))?;
        Ok(ViewCounts {
            total: summary.total,
            recent: summary.recent,
        })
    }

    async fn dataset_name(&self, dataset_id: &str) -> SdbiResult<String> {
        Ok(self.package_show(dataset_id, false).await?.name)
    }

    async fn download_counts(&self, dataset_name: &str) -> SdbiResult<DownloadCounts> {
        self.downloads(dataset_name).await
    }
}
