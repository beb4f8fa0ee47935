pub mod store;

pub use store::*;

use crate::error::Result;
use crate::models::Alert;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Trait for alert storage operations
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Save an alert
    async fn save_alert(&self, alert: &Alert) -> Result<()>;

    /// Get an alert by ID
    async fn get_alert(&self, id: &Uuid) -> Result<Option<Alert>>;

    /// List alerts with filtering, newest first
    async fn list_alerts(&self, filter: &AlertFilter, page: u32, page_size: u32)
        -> Result<Vec<Alert>>;

    /// Count alerts matching filter
    async fn count_alerts(&self, filter: &AlertFilter) -> Result<u64>;
}

/// Filter for querying alerts
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub user_id: Option<String>,
    /// Case-insensitive substring of the receiver
    pub receiver: Option<String>,
    /// Case-insensitive substring of the location
    pub location: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        let user_match = self
            .user_id
            .as_ref()
            .map_or(true, |user_id| &alert.user_id == user_id);

        let receiver_match = self
            .receiver
            .as_ref()
            .map_or(true, |needle| contains_ignore_case(&alert.receiver, needle));

        let location_match = self
            .location
            .as_ref()
            .map_or(true, |needle| contains_ignore_case(&alert.location, needle));

        let since_match = self.since.map_or(true, |since| alert.created_at >= since);
        let until_match = self.until.map_or(true, |until| alert.created_at <= until);

        user_match && receiver_match && location_match && since_match && until_match
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
