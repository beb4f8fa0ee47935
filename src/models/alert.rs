use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted weapon-detection alert
///
/// Immutable once stored: the dispatcher only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    /// Unique alert identifier, assigned at persistence time
    pub id: Uuid,

    /// Reference or URL of the uploaded image
    pub image_ref: String,

    /// Destination address, untyped until classified
    pub receiver: String,

    /// Free-text location, may be empty
    #[serde(default)]
    pub location: String,

    /// Owner of the alert
    pub user_id: String,

    /// Persistence timestamp
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new alert, stamping id and creation time
    pub fn new(
        image_ref: impl Into<String>,
        receiver: impl Into<String>,
        location: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_ref: image_ref.into(),
            receiver: receiver.into(),
            location: location.into(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn has_location(&self) -> bool {
        !self.location.trim().is_empty()
    }
}
