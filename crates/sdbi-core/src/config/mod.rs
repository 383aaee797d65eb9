//! Configuration system for sdbi-engage.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the exit-intent engine.
///
/// Durations are kept as millisecond counts so config files mirror the
/// values the portal templates historically shipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitIntentConfig {
    /// Distance in pixels from the top edge below which pointer movement
    /// counts as an exit gesture.
    pub pointer_threshold: u32,
    /// Delay before the popup is shown after an accepted trigger.
    pub display_delay_ms: u64,
    /// Cookie used for the cross-visit "already shown" flag.
    pub cookie_name: String,
    /// Cookie expiry in days.
    pub cookie_expiry_days: u32,
    /// Length of one trigger-budget session window.
    pub session_duration_ms: u64,
    /// Maximum accepted triggers inside one session window.
    pub max_triggers_per_session: u32,
    /// Minimum spacing between two accepted triggers.
    pub trigger_cooldown_ms: u64,
    /// Minimum time on page before the Escape key may trigger.
    pub escape_key_delay_ms: u64,
    /// Minimum time on page before a tab switch may trigger.
    pub tab_switch_delay_ms: u64,
    /// Minimum time on page before focus loss may trigger.
    pub focus_loss_delay_ms: u64,
    /// Uninterrupted idle time that produces an inactivity signal.
    pub inactivity_timeout_ms: u64,
    /// Scroll depth (percent of document height) that produces a signal.
    pub scroll_trigger_percent: u8,
    /// Optional time-on-page trigger; `None` disables it.
    pub time_on_page_ms: Option<u64>,
    /// Window in which returning after a page-hide counts as an aborted exit.
    pub return_window_ms: u64,
    pub enable_keyboard_shortcuts: bool,
    pub enable_escape_key: bool,
    pub enable_tab_switch: bool,
    pub enable_focus_loss: bool,
    pub enable_scroll_based: bool,
    pub enable_inactivity: bool,
    pub enable_time_based: bool,
    pub enable_outbound_click: bool,
    pub enable_return_detection: bool,
    /// Path fragments on which the engine stays dormant.
    pub excluded_path_fragments: Vec<String>,
    /// Fade-out duration when the popup closes.
    pub fade_out_ms: u64,
}

impl Default for ExitIntentConfig {
    fn default() -> Self {
        Self {
            pointer_threshold: 10,
            display_delay_ms: 1_000,
            cookie_name: "exit_intent_shown".to_string(),
            cookie_expiry_days: 1,
            session_duration_ms: 30 * 60 * 1_000,
            max_triggers_per_session: 2,
            trigger_cooldown_ms: 30_000,
            escape_key_delay_ms: 5_000,
            tab_switch_delay_ms: 10_000,
            focus_loss_delay_ms: 15_000,
            inactivity_timeout_ms: 60_000,
            scroll_trigger_percent: 80,
            time_on_page_ms: None,
            return_window_ms: 5_000,
            enable_keyboard_shortcuts: true,
            enable_escape_key: true,
            enable_tab_switch: true,
            enable_focus_loss: true,
            enable_scroll_based: true,
            enable_inactivity: true,
            enable_time_based: false,
            enable_outbound_click: true,
            enable_return_detection: true,
            excluded_path_fragments: vec!["/google-forms".to_string(), "/admin".to_string()],
            fade_out_ms: 300,
        }
    }
}

impl ExitIntentConfig {
    pub fn display_delay(&self) -> Duration {
        Duration::from_millis(self.display_delay_ms)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::from_millis(self.session_duration_ms)
    }

    pub fn trigger_cooldown(&self) -> Duration {
        Duration::from_millis(self.trigger_cooldown_ms)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }

    pub fn fade_out(&self) -> Duration {
        Duration::from_millis(self.fade_out_ms)
    }

    /// Whether the engine should stay dormant for the given page path.
    pub fn is_excluded_path(&self, path: &str) -> bool {
        self.excluded_path_fragments
            .iter()
            .any(|fragment| path.contains(fragment.as_str()))
    }
}

/// Configuration for usage tracking and counter refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Interval between counter refreshes.
    pub refresh_interval_ms: u64,
    /// Delay between the page-view beacon and the first counter refresh.
    pub initial_refresh_delay_ms: u64,
    /// Skip refresh ticks while the page is hidden.
    pub pause_when_hidden: bool,
    /// Path prefix identifying dataset pages.
    pub dataset_path_prefix: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 30_000,
            initial_refresh_delay_ms: 2_000,
            pause_when_hidden: true,
            dataset_path_prefix: "/dataset/".to_string(),
        }
    }
}

impl TrackingConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn initial_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.initial_refresh_delay_ms)
    }
}

/// Configuration for the portal HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the portal, e.g. `https://data.sdbi.example`.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub tracking_path: String,
    pub tracking_fallback_path: String,
    pub package_show_path: String,
    pub downloads_path: String,
    pub exit_intent_forms_path: String,
    pub form_create_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
            tracking_path: "/sdbi/tracking".to_string(),
            tracking_fallback_path: "/_usertracking".to_string(),
            package_show_path: "/api/3/action/package_show".to_string(),
            downloads_path: "/sdbi/downloads".to_string(),
            exit_intent_forms_path: "/api/google-forms/exit-intent".to_string(),
            form_create_path: "/google-forms/create".to_string(),
        }
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Exit-intent engine configuration.
    pub exit_intent: ExitIntentConfig,
    /// Usage tracking configuration.
    pub tracking: TrackingConfig,
    /// Portal client configuration.
    pub client: ClientConfig,
}

impl EngineConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::SdbiResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| crate::error::SdbiError::Configuration(e.to_string())),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| crate::error::SdbiError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| crate::error::SdbiError::Configuration(e.to_string())),
            _ => Err(crate::error::SdbiError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("SDBI_BASE_URL") {
            config.client.base_url = base_url;
        }
        if let Ok(cookie) = std::env::var("SDBI_EXIT_INTENT_COOKIE") {
            config.exit_intent.cookie_name = cookie;
        }
        if let Ok(interval) = std::env::var("SDBI_REFRESH_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                config.tracking.refresh_interval_ms = ms;
            }
        }

        config
    }
}
