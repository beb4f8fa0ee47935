//! Weapon-detection alert notifier.
//!
//! Alerts are ingested over HTTP, persisted, and handed to a [`notifications::Dispatcher`]
//! that classifies the receiver and delivers an email or SMS in the background with
//! bounded retries.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod state;

pub use error::{AppError, Result};
