use crate::error::Result;
use crate::models::Alert;
use crate::state::{AlertFilter, AlertStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

/// In-memory alert store
#[derive(Clone)]
pub struct InMemoryAlertStore {
    alerts: Arc<DashMap<Uuid, Alert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self {
            alerts: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        self.alerts.insert(alert.id, alert.clone());
        tracing::debug!(alert_id = %alert.id, user_id = %alert.user_id, "Alert saved");
        Ok(())
    }

    async fn get_alert(&self, id: &Uuid) -> Result<Option<Alert>> {
        Ok(self.alerts.get(id).map(|entry| entry.clone()))
    }

    async fn list_alerts(
        &self,
        filter: &AlertFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        // Newest first; id breaks ties so pages are stable
        alerts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let start = page as usize * page_size as usize;

        Ok(alerts
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect())
    }

    async fn count_alerts(&self, filter: &AlertFilter) -> Result<u64> {
        let count = self
            .alerts
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count();

        Ok(count as u64)
    }
}
