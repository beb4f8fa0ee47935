pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::config::IngestionConfig;
use crate::notifications::Dispatcher;
use crate::state::AlertStore;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AlertStore>,
    pub dispatcher: Dispatcher,
    pub ingestion: IngestionConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn AlertStore>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher,
            ingestion: IngestionConfig::default(),
            started_at: Instant::now(),
        }
    }

    /// Override the ingestion limits
    pub fn with_ingestion(mut self, ingestion: IngestionConfig) -> Self {
        self.ingestion = ingestion;
        self
    }
}
