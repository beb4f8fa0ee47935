//! Receiver classification: email address, phone number, or neither.

use crate::error::{AppError, Result};
use crate::models::ChannelKind;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+[._]?[a-z0-9]+@\w+\.\w{2,3}$").expect("email pattern is valid")
});

/// Result of classifying a receiver string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverKind {
    Email,
    Sms,
    Unrecognized,
}

impl ReceiverKind {
    /// Channel that should carry the notification, if any
    pub fn channel(&self) -> Option<ChannelKind> {
        match self {
            ReceiverKind::Email => Some(ChannelKind::Email),
            ReceiverKind::Sms => Some(ChannelKind::Sms),
            ReceiverKind::Unrecognized => None,
        }
    }
}

/// Best-effort syntactic classifier
///
/// The email check runs first; the phone check only applies when it fails.
/// Phone numbers must carry the configured country code followed by the
/// national number: 10 digits, or 9 when the trunk `0` is dropped as in
/// international notation (`+593987654321`).
#[derive(Debug, Clone)]
pub struct ReceiverClassifier {
    phone_pattern: Regex,
}

impl ReceiverClassifier {
    pub fn new(country_code: &str) -> Result<Self> {
        if country_code.is_empty() {
            return Err(AppError::Configuration(
                "Phone country code cannot be empty".to_string(),
            ));
        }

        let phone_pattern = Regex::new(&format!(r"^{}\d{{9,10}}$", regex::escape(country_code)))
            .map_err(|e| AppError::Configuration(format!("Invalid phone pattern: {}", e)))?;

        Ok(Self { phone_pattern })
    }

    pub fn classify(&self, receiver: &str) -> ReceiverKind {
        let receiver = receiver.trim();

        if EMAIL_PATTERN.is_match(receiver) {
            ReceiverKind::Email
        } else if self.phone_pattern.is_match(receiver) {
            ReceiverKind::Sms
        } else {
            ReceiverKind::Unrecognized
        }
    }
}

impl Default for ReceiverClassifier {
    fn default() -> Self {
        Self::new("+593").expect("default country code is valid")
    }
}
