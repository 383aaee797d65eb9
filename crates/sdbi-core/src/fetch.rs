//! Popup content fetching seam.
//!
//! The engine only ever sees the [`FormSource`] trait; the HTTP
//! implementation lives in `sdbi-client`.

use crate::error::SdbiResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A survey form eligible for the exit-intent popup.
///
/// Fetched fresh on every accepted trigger; immutable for the duration of
/// one popup display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupForm {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub form_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl PopupForm {
    pub fn new(title: impl Into<String>, form_url: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            description: None,
            form_url: form_url.into(),
            category: None,
            status: None,
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Source of eligible popup forms.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FormSource: Send + Sync {
    /// Fetch the ordered list of forms eligible for the exit-intent popup.
    async fn exit_intent_forms(&self) -> SdbiResult<Vec<PopupForm>>;
}

/// Fetch forms, treating any failure as "zero eligible forms".
///
/// Failures are logged and never surfaced to the visitor.
pub async fn fetch_forms_or_empty(source: &dyn FormSource) -> Vec<PopupForm> {
    match source.exit_intent_forms().await {
        Ok(forms) => forms,
        Err(e) => {
            tracing::warn!("Error fetching exit intent forms: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdbiError;

    #[tokio::test]
    async fn test_failure_is_empty_list() {
        let mut source = MockFormSource::new();
        source
            .expect_exit_intent_forms()
            .returning(|| Err(SdbiError::api("forms endpoint returned 500")));

        let forms = fetch_forms_or_empty(&source).await;
        assert!(forms.is_empty());
    }

    #[tokio::test]
    async fn test_each_trigger_fetches_fresh() {
        let mut source = MockFormSource::new();
        source
            .expect_exit_intent_forms()
            .times(2)
            .returning(|| Ok(vec![PopupForm::new("Survei", "https://forms.google.com/abc")]));

        assert_eq!(fetch_forms_or_empty(&source).await.len(), 1);
        assert_eq!(fetch_forms_or_empty(&source).await.len(), 1);
    }

    #[test]
    fn test_form_deserializes_with_minimal_fields() {
        let form: PopupForm = serde_json::from_str(
            r#"{"title": "Survei Kepuasan", "form_url": "https://forms.google.com/abc"}"#,
        )
        .unwrap();
        assert_eq!(form.title, "Survei Kepuasan");
        assert!(form.description.is_none());
        assert!(form.id.is_none());
    }
}
