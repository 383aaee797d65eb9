//! Cookie and session-scoped persistence for the throttle's flags.
//!
//! Two deliberately separate scopes:
//! - cookies survive reloads and navigations until their expiry ("don't show
//!   again today"),
//! - session storage lives for the browsing session and carries the
//!   attempted-exit-then-returned heuristic across one reload.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Cross-visit cookie storage.
pub trait CookieStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str, expiry_days: u32);
}

/// Session-scoped string storage.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory cookie store honoring expiry, for hosts and tests without a
/// real cookie jar.
#[derive(Default)]
pub struct MemoryCookieStore {
    inner: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        let inner = self.inner.read().expect("cookie store lock poisoned");
        inner.get(name).and_then(|(value, expires_at)| {
            if Utc::now() < *expires_at {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    fn set(&self, name: &str, value: &str, expiry_days: u32) {
        let expires_at = Utc::now() + ChronoDuration::days(i64::from(expiry_days));
        let mut inner = self.inner.write().expect("cookie store lock poisoned");
        inner.insert(name.to_string(), (value.to_string(), expires_at));
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .expect("session store lock poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.inner
            .write()
            .expect("session store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.inner
            .write()
            .expect("session store lock poisoned")
            .remove(key);
    }
}

/// Binding of the "already shown" cookie to its configured name and expiry.
///
/// Read by the throttle policy on every candidate trigger; written by the
/// popup presenter on first display.
#[derive(Clone)]
pub struct ShownFlagStore {
    cookies: Arc<dyn CookieStore>,
    name: String,
    expiry_days: u32,
}

impl ShownFlagStore {
    pub fn new(cookies: Arc<dyn CookieStore>, name: impl Into<String>, expiry_days: u32) -> Self {
        Self {
            cookies,
            name: name.into(),
            expiry_days,
        }
    }

    pub fn is_set(&self) -> bool {
        self.cookies.get(&self.name).is_some()
    }

    pub fn mark_shown(&self) {
        self.cookies.set(&self.name, "true", self.expiry_days);
    }
}

/// Session-storage keys for the attempted-exit heuristic.
const EXIT_ATTEMPT_KEY: &str = "exit_intent_attempted";
const EXIT_ATTEMPT_TS_KEY: &str = "exit_intent_timestamp";

/// A best-effort record that the visitor tried to leave the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingExitAttempt {
    pub at: DateTime<Utc>,
}

/// Record an attempted exit at page-hide time.
pub fn record_exit_attempt(store: &dyn SessionStore, now: DateTime<Utc>) {
    store.set(EXIT_ATTEMPT_KEY, "true");
    store.set(EXIT_ATTEMPT_TS_KEY, &now.timestamp_millis().to_string());
}

/// Read the attempted-exit record, clearing it regardless of outcome.
pub fn take_exit_attempt(store: &dyn SessionStore) -> Option<PendingExitAttempt> {
    let attempted = store.get(EXIT_ATTEMPT_KEY);
    let timestamp = store.get(EXIT_ATTEMPT_TS_KEY);
    store.remove(EXIT_ATTEMPT_KEY);
    store.remove(EXIT_ATTEMPT_TS_KEY);

    if attempted.as_deref() != Some("true") {
        return None;
    }
    let millis: i64 = timestamp?.parse().ok()?;
    let at = DateTime::<Utc>::from_timestamp_millis(millis)?;
    Some(PendingExitAttempt { at })
}
