//! Multi-step wizard for registering external survey-form URLs.
//!
//! Three steps: form details, form URL, review. Moving forward validates the
//! current step; moving backward or jumping via the progress header never
//! does. Validation failures raise a dismissible alert that expires after a
//! fixed timeout.

use crate::error::{SdbiError, SdbiResult};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Accepted Google Forms URL shapes.
static GOOGLE_FORMS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://(forms\.google\.com|docs\.google\.com/forms)/.+")
        .expect("valid form URL regex")
});

/// How long a validation alert stays visible.
const ALERT_TIMEOUT_SECS: i64 = 5;

/// Wizard steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Details,
    FormUrl,
    Review,
}

impl WizardStep {
    /// 1-based step number shown in the progress header.
    pub fn number(&self) -> u8 {
        match self {
            Self::Details => 1,
            Self::FormUrl => 2,
            Self::Review => 3,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Details => Some(Self::FormUrl),
            Self::FormUrl => Some(Self::Review),
            Self::Review => None,
        }
    }

    pub fn prev(&self) -> Option<Self> {
        match self {
            Self::Details => None,
            Self::FormUrl => Some(Self::Details),
            Self::Review => Some(Self::FormUrl),
        }
    }
}

/// Survey form category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bencana,
    Kesiapsiagaan,
    Evakuasi,
    Rehabilitasi,
    #[default]
    Lainnya,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bencana => "bencana",
            Self::Kesiapsiagaan => "kesiapsiagaan",
            Self::Evakuasi => "evakuasi",
            Self::Rehabilitasi => "rehabilitasi",
            Self::Lainnya => "lainnya",
        }
    }

    /// Display name used in the review summary.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Bencana => "Bencana Alam",
            Self::Kesiapsiagaan => "Kesiapsiagaan",
            Self::Evakuasi => "Evakuasi",
            Self::Rehabilitasi => "Rehabilitasi",
            Self::Lainnya => "Lainnya",
        }
    }
}

/// Survey form publication status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    #[default]
    Active,
    Inactive,
    Draft,
}

impl FormStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Draft => "draft",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Active => "Aktif",
            Self::Inactive => "Tidak Aktif",
            Self::Draft => "Draft",
        }
    }
}

/// Live URL-field validation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlValidation {
    Empty,
    Valid,
    Invalid,
}

/// Validate a Google Forms URL as typed.
pub fn validate_form_url(url: &str) -> UrlValidation {
    let url = url.trim();
    if url.is_empty() {
        UrlValidation::Empty
    } else if GOOGLE_FORMS_RE.is_match(url) {
        UrlValidation::Valid
    } else {
        UrlValidation::Invalid
    }
}

/// The form being registered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    pub title: String,
    pub description: String,
    pub form_url: String,
    pub category: Category,
    pub status: FormStatus,
    pub exit_intent: bool,
}

/// Dismissible validation alert.
#[derive(Debug, Clone, PartialEq)]
pub struct WizardAlert {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

impl WizardAlert {
    fn new(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            expires_at: now + ChronoDuration::seconds(ALERT_TIMEOUT_SECS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Review-step summary with display names and fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    pub title: String,
    pub description: String,
    pub form_url: String,
    pub category: &'static str,
    pub status: &'static str,
    pub exit_intent: &'static str,
}

impl ReviewSummary {
    fn from_draft(draft: &FormDraft) -> Self {
        Self {
            title: draft.title.clone(),
            description: if draft.description.is_empty() {
                "Tidak ada deskripsi".to_string()
            } else {
                draft.description.clone()
            },
            form_url: draft.form_url.clone(),
            category: draft.category.display_name(),
            status: draft.status.display_name(),
            exit_intent: if draft.exit_intent { "Ya" } else { "Tidak" },
        }
    }
}

/// Client-side wizard state machine.
#[derive(Debug)]
pub struct Wizard {
    draft: FormDraft,
    step: WizardStep,
    alert: Option<WizardAlert>,
    review: Option<ReviewSummary>,
}

impl Default for Wizard {
    fn default() -> Self {
        Self::new()
    }
}

impl Wizard {
    pub fn new() -> Self {
        Self {
            draft: FormDraft::default(),
            step: WizardStep::Details,
            alert: None,
            review: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    /// Current alert, if any and not yet expired.
    pub fn alert(&self, now: DateTime<Utc>) -> Option<&WizardAlert> {
        self.alert.as_ref().filter(|a| !a.is_expired(now))
    }

    /// Review summary, built when the review step was last entered.
    pub fn review(&self) -> Option<&ReviewSummary> {
        self.review.as_ref()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn set_form_url(&mut self, url: impl Into<String>) {
        self.draft.form_url = url.into();
    }

    /// Live validation state of the URL field.
    pub fn url_validation(&self) -> UrlValidation {
        validate_form_url(&self.draft.form_url)
    }

    pub fn set_category(&mut self, category: Category) {
        self.draft.category = category;
    }

    pub fn set_status(&mut self, status: FormStatus) {
        self.draft.status = status;
    }

    pub fn set_exit_intent(&mut self, enabled: bool) {
        self.draft.exit_intent = enabled;
    }

    /// Advance to the next step after validating the current one.
    ///
    /// On validation failure the step does not change and an alert is raised.
    pub fn next(&mut self, now: DateTime<Utc>) -> WizardStep {
        let current = self.step();
        if let Err(message) = self.validate_step(current) {
            self.alert = Some(WizardAlert::new(message, now));
            return current;
        }

        if let Some(next) = current.next() {
            if next == WizardStep::Review {
                self.review = Some(ReviewSummary::from_draft(&self.draft));
            }
            self.step = next;
        }
        self.step()
    }

    /// Go back one step. Never validates.
    pub fn back(&mut self) -> WizardStep {
        if let Some(prev) = self.step().prev() {
            self.step = prev;
        }
        self.step()
    }

    /// Jump directly to a step via the progress header. Never validates.
    pub fn goto(&mut self, step: WizardStep) -> WizardStep {
        if step == WizardStep::Review {
            self.review = Some(ReviewSummary::from_draft(&self.draft));
        }
        self.step = step;
        self.step()
    }

    /// Drop any expired alert.
    pub fn clear_expired_alert(&mut self, now: DateTime<Utc>) {
        if self.alert.as_ref().is_some_and(|a| a.is_expired(now)) {
            self.alert = None;
        }
    }

    fn validate_step(&self, step: WizardStep) -> Result<(), &'static str> {
        match step {
            WizardStep::Details => {
                if self.draft.title.trim().is_empty() {
                    return Err("Judul form harus diisi");
                }
                Ok(())
            }
            WizardStep::FormUrl => match self.url_validation() {
                UrlValidation::Empty => Err("URL Google Form harus diisi"),
                UrlValidation::Invalid => Err("URL Google Form tidak valid"),
                UrlValidation::Valid => Ok(()),
            },
            WizardStep::Review => Ok(()),
        }
    }

    /// Form-encoded pairs for submission, validating the full draft.
    ///
    /// The exit-intent checkbox follows HTML semantics: the pair is present
    /// only when checked.
    pub fn submission(&self) -> SdbiResult<Vec<(&'static str, String)>> {
        if self.draft.title.trim().is_empty() {
            return Err(SdbiError::validation("Judul form harus diisi", "title"));
        }
        match self.url_validation() {
            UrlValidation::Empty => {
                return Err(SdbiError::validation("URL Google Form harus diisi", "form_url"))
            }
            UrlValidation::Invalid => {
                return Err(SdbiError::validation("URL Google Form tidak valid", "form_url"))
            }
            UrlValidation::Valid => {}
        }

        let mut pairs = vec![
            ("title", self.draft.title.trim().to_string()),
            ("description", self.draft.description.clone()),
            ("form_url", self.draft.form_url.trim().to_string()),
            ("category", self.draft.category.as_str().to_string()),
            ("status", self.draft.status.as_str().to_string()),
        ];
        if self.draft.exit_intent {
            pairs.push(("exit_intent", "on".to_string()));
        }
        Ok(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert_eq!(
            validate_form_url("https://forms.google.com/d/e/abc/viewform"),
            UrlValidation::Valid
        );
        assert_eq!(
            validate_form_url("https://docs.google.com/forms/d/e/abc/viewform"),
            UrlValidation::Valid
        );
        assert_eq!(validate_form_url(""), UrlValidation::Empty);
        assert_eq!(validate_form_url("   "), UrlValidation::Empty);
        assert_eq!(
            validate_form_url("http://forms.google.com/abc"),
            UrlValidation::Invalid
        );
        assert_eq!(
            validate_form_url("https://example.com/forms/abc"),
            UrlValidation::Invalid
        );
        assert_eq!(
            validate_form_url("https://docs.google.com/spreadsheets/abc"),
            UrlValidation::Invalid
        );
    }

    #[test]
    fn test_empty_title_blocks_step_one() {
        let mut wizard = Wizard::new();
        let now = Utc::now();

        assert_eq!(wizard.next(now), WizardStep::Details);
        let alert = wizard.alert(now).unwrap();
        assert_eq!(alert.message, "Judul form harus diisi");

        // Alert auto-expires after 5 seconds
        let later = now + ChronoDuration::seconds(6);
        assert!(wizard.alert(later).is_none());
        wizard.clear_expired_alert(later);
    }

    #[test]
    fn test_invalid_url_blocks_step_two() {
        let mut wizard = Wizard::new();
        let now = Utc::now();
        wizard.set_title("Survei Kepuasan Layanan");
        assert_eq!(wizard.next(now), WizardStep::FormUrl);

        assert_eq!(wizard.next(now), WizardStep::FormUrl);
        assert_eq!(
            wizard.alert(now).unwrap().message,
            "URL Google Form harus diisi"
        );

        wizard.set_form_url("https://example.com/form");
        assert_eq!(wizard.next(now), WizardStep::FormUrl);
        assert_eq!(
            wizard.alert(now).unwrap().message,
            "URL Google Form tidak valid"
        );
    }

    #[test]
    fn test_full_walkthrough_builds_review() {
        let mut wizard = Wizard::new();
        let now = Utc::now();

        wizard.set_title("Survei Kepuasan Layanan");
        wizard.set_form_url("https://forms.google.com/d/e/abc/viewform");
        wizard.set_category(Category::Kesiapsiagaan);
        wizard.set_status(FormStatus::Active);
        wizard.set_exit_intent(true);

        assert_eq!(wizard.next(now), WizardStep::FormUrl);
        assert_eq!(wizard.next(now), WizardStep::Review);

        let review = wizard.review().unwrap();
        assert_eq!(review.title, "Survei Kepuasan Layanan");
        assert_eq!(review.description, "Tidak ada deskripsi");
        assert_eq!(review.category, "Kesiapsiagaan");
        assert_eq!(review.status, "Aktif");
        assert_eq!(review.exit_intent, "Ya");
    }

    #[test]
    fn test_back_and_goto_never_validate() {
        let mut wizard = Wizard::new();

        assert_eq!(wizard.goto(WizardStep::Review), WizardStep::Review);
        assert_eq!(wizard.back(), WizardStep::FormUrl);
        assert_eq!(wizard.back(), WizardStep::Details);
        assert_eq!(wizard.back(), WizardStep::Details);
    }

    #[test]
    fn test_submission_pairs() {
        let mut wizard = Wizard::new();
        wizard.set_title("Survei Kepuasan Layanan");
        wizard.set_description("Masukan untuk portal data.");
        wizard.set_form_url("https://docs.google.com/forms/d/e/abc/viewform");
        wizard.set_category(Category::Bencana);
        wizard.set_status(FormStatus::Draft);
        wizard.set_exit_intent(true);

        let pairs = wizard.submission().unwrap();
        assert!(pairs.contains(&("title", "Survei Kepuasan Layanan".to_string())));
        assert!(pairs.contains(&("category", "bencana".to_string())));
        assert!(pairs.contains(&("status", "draft".to_string())));
        assert!(pairs.contains(&("exit_intent", "on".to_string())));
    }

    #[test]
    fn test_submission_omits_unchecked_exit_intent() {
        let mut wizard = Wizard::new();
        wizard.set_title("Survei");
        wizard.set_form_url("https://forms.google.com/abc");

        let pairs = wizard.submission().unwrap();
        assert!(!pairs.iter().any(|(k, _)| *k == "exit_intent"));
    }

    #[test]
    fn test_submission_rejects_invalid_draft() {
        let wizard = Wizard::new();
        let err = wizard.submission().unwrap_err();
        assert!(matches!(
            err,
            SdbiError::Validation { field: Some(ref f), .. } if f == "title"
        ));
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(WizardStep::Details.number(), 1);
        assert_eq!(WizardStep::FormUrl.number(), 2);
        assert_eq!(WizardStep::Review.number(), 3);
    }
}
