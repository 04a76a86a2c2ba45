//! User-profile form state
//!
//! Collects name, email, organization and EIN, validates them as they are
//! typed and gates submission. The EIN field is live-formatted: non-digits
//! are stripped and the `-` separator is inserted after the second digit.

use crate::error::{Error, Result};
use crate::store::{User, UserInput};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

static EIN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}-\d{7}$").expect("EIN pattern compiles"));

const EIN_DIGITS: usize = 9;

/// Whether `email` has the `local@domain.tld` shape.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Whether `ein` is exactly `NN-NNNNNNN`.
pub fn is_valid_ein(ein: &str) -> bool {
    EIN_PATTERN.is_match(ein)
}

/// Live-format raw EIN keystrokes.
///
/// Non-digits are dropped, input is capped at nine digits, and the separator
/// appears once a third digit is typed: `"12345"` becomes `"12-345"`.
pub fn format_ein(raw: &str) -> String {
    let digits: String = raw
        .chars()
        .filter(char::is_ascii_digit)
        .take(EIN_DIGITS)
        .collect();

    if digits.len() > 2 {
        let (prefix, rest) = digits.split_at(2);
        format!("{prefix}-{rest}")
    } else {
        digits
    }
}

/// Employer Identification Number, always `NN-NNNNNNN`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ein(String);

impl Ein {
    /// Parse an already formatted EIN.
    pub fn parse(value: &str) -> Result<Self> {
        if is_valid_ein(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::Validation(format!(
                "EIN '{value}' must be in the format XX-XXXXXXX"
            )))
        }
    }

    /// The formatted value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ein {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Ein> for String {
    fn from(ein: Ein) -> Self {
        ein.0
    }
}

impl fmt::Display for Ein {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a submit attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation errors, missing fields or an in-flight submission blocked the submit
    Blocked,
    /// The handler accepted the payload
    Submitted(User),
    /// The handler failed; the message is kept for display
    Failed(String),
}

/// Form state for the user profile
#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    name: String,
    email: String,
    organization: String,
    ein: String,
    email_error: Option<String>,
    ein_error: Option<String>,
    submit_error: Option<String>,
    submitting: bool,
}

impl ProfileForm {
    /// Empty form
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the display name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Update the email and re-validate it.
    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
        self.email_error = if self.email.is_empty() || is_valid_email(&self.email) {
            None
        } else {
            Some("Please enter a valid email address".to_string())
        };
    }

    /// Update the organization name.
    pub fn set_organization(&mut self, organization: impl Into<String>) {
        self.organization = organization.into();
    }

    /// Live-format and re-validate the EIN input.
    pub fn set_ein(&mut self, raw: &str) {
        self.ein = format_ein(raw);
        self.ein_error = if self.ein.is_empty() || is_valid_ein(&self.ein) {
            None
        } else {
            Some("EIN must be in the format XX-XXXXXXX".to_string())
        };
    }

    /// Current EIN as displayed in the input
    pub fn ein_input(&self) -> &str {
        &self.ein
    }

    /// Inline email error, if any
    pub fn email_error(&self) -> Option<&str> {
        self.email_error.as_deref()
    }

    /// Inline EIN error, if any
    pub fn ein_error(&self) -> Option<&str> {
        self.ein_error.as_deref()
    }

    /// Error reported back by the last submit handler
    pub fn submit_error(&self) -> Option<&str> {
        self.submit_error.as_deref()
    }

    /// Whether a submission is in flight
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Whether the submit button is enabled
    pub fn can_submit(&self) -> bool {
        !self.submitting
            && self.email_error.is_none()
            && self.ein_error.is_none()
            && !self.name.trim().is_empty()
            && !self.email.is_empty()
    }

    /// Mark the form as submitting and produce the payload, or `None` when blocked.
    pub fn begin_submit(&mut self) -> Option<UserInput> {
        // Re-run validation in case setters were bypassed by defaults.
        let email = self.email.clone();
        self.set_email(email);
        if self.email.is_empty() {
            self.email_error = Some("Email is required".to_string());
        }

        if !self.can_submit() {
            return None;
        }

        self.submitting = true;
        self.submit_error = None;

        let ein = if self.ein.is_empty() {
            None
        } else {
            Ein::parse(&self.ein).ok()
        };
        let organization = Some(self.organization.trim().to_string()).filter(|o| !o.is_empty());

        Some(UserInput {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            organization,
            ein,
        })
    }

    /// Clear the in-flight flag and record the handler's result.
    pub fn finish_submit(&mut self, result: Result<User>) -> SubmitOutcome {
        self.submitting = false;
        match result {
            Ok(user) => SubmitOutcome::Submitted(user),
            Err(err) => {
                let message = err.to_string();
                self.submit_error = Some(message.clone());
                SubmitOutcome::Failed(message)
            }
        }
    }

    /// Validate, forward the payload to `handler` and await it.
    pub async fn submit<F, Fut>(&mut self, handler: F) -> SubmitOutcome
    where
        F: FnOnce(UserInput) -> Fut,
        Fut: Future<Output = Result<User>>,
    {
        let Some(input) = self.begin_submit() else {
            return SubmitOutcome::Blocked;
        };
        let result = handler(input).await;
        self.finish_submit(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::cell::Cell;
    use uuid::Uuid;

    fn user_for(input: &UserInput) -> User {
        User {
            id: Uuid::new_v4(),
            email: input.email.clone(),
            name: input.name.clone(),
            organization: input.organization.clone(),
            ein: input.ein.clone(),
            app_ids: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("ops@charity.org"));
        assert!(is_valid_email("a.b+c@sub.example.co"));
        assert!(!is_valid_email("ops@charity"));
        assert!(!is_valid_email("ops charity@x.org"));
        assert!(!is_valid_email("@charity.org"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn ein_formatting_inserts_separator_and_caps_length() {
        assert_eq!(format_ein(""), "");
        assert_eq!(format_ein("1"), "1");
        assert_eq!(format_ein("12"), "12");
        assert_eq!(format_ein("123"), "12-3");
        assert_eq!(format_ein("12-3456789"), "12-3456789");
        assert_eq!(format_ein("12 345 6789 999"), "12-3456789");
        assert_eq!(format_ein("ab12cd3456789"), "12-3456789");
        assert_eq!(format_ein("no digits"), "");
    }

    #[test]
    fn formatted_ein_is_empty_or_complete_once_nine_digits_arrive() {
        for raw in ["", "123456789", "12-3456789", "x1x2x3x4x5x6x7x8x9x0"] {
            let formatted = format_ein(raw);
            assert!(formatted.is_empty() || is_valid_ein(&formatted), "{raw:?}");
        }
    }

    #[test]
    fn ein_type_rejects_partial_values() {
        assert!(Ein::parse("12-3456789").is_ok());
        assert!(Ein::parse("12-345").is_err());
        assert!(Ein::parse("123456789").is_err());
        let parsed: std::result::Result<Ein, _> = serde_json::from_str("\"12-34\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn partial_ein_is_an_inline_error() {
        let mut form = ProfileForm::new();
        form.set_ein("12345");
        assert_eq!(form.ein_input(), "12-345");
        assert!(form.ein_error().is_some());
        form.set_ein("123456789");
        assert!(form.ein_error().is_none());
        form.set_ein("");
        assert!(form.ein_error().is_none());
    }

    #[tokio::test]
    async fn invalid_email_blocks_without_calling_handler() {
        let mut form = ProfileForm::new();
        form.set_name("Food Bank");
        form.set_email("not-an-email");

        let called = Cell::new(false);
        let outcome = form
            .submit(|input| {
                called.set(true);
                let user = user_for(&input);
                async move { Ok(user) }
            })
            .await;

        assert_eq!(outcome, SubmitOutcome::Blocked);
        assert!(!called.get());
        assert!(form.email_error().is_some());
    }

    #[tokio::test]
    async fn empty_ein_is_forwarded_as_unset() {
        let mut form = ProfileForm::new();
        form.set_name("Food Bank");
        form.set_email("ops@foodbank.org");
        form.set_organization("   ");

        let outcome = form
            .submit(|input| {
                assert!(input.ein.is_none());
                assert!(input.organization.is_none());
                let user = user_for(&input);
                async move { Ok(user) }
            })
            .await;

        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
        assert!(!form.is_submitting());
    }

    #[test]
    fn second_submit_is_blocked_while_in_flight() {
        let mut form = ProfileForm::new();
        form.set_name("Food Bank");
        form.set_email("ops@foodbank.org");
        form.set_ein("12-3456789");

        let first = form.begin_submit().unwrap();
        assert_eq!(first.ein.as_ref().map(Ein::as_str), Some("12-3456789"));
        assert!(form.begin_submit().is_none());

        let outcome = form.finish_submit(Err(Error::Store("boom".to_string())));
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert_eq!(form.submit_error(), Some("Store error: boom"));
        assert!(form.begin_submit().is_some());
    }

    #[test]
    fn missing_name_blocks_submit() {
        let mut form = ProfileForm::new();
        form.set_email("ops@foodbank.org");
        assert!(form.begin_submit().is_none());
    }
}
