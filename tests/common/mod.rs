//! Shared helpers for integration tests

#![allow(dead_code)]

use alert_notifier::config::NotificationConfig;
use alert_notifier::models::{ChannelKind, Envelope};
use alert_notifier::notifications::{Delivery, DeliveryChannel, SendError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process channel that fails a fixed number of times and records what it sends
pub struct RecordingChannel {
    kind: ChannelKind,
    failures: u32,
    delay: Duration,
    calls: AtomicU32,
    sent: Mutex<Vec<Envelope>>,
}

impl RecordingChannel {
    pub fn new(kind: ChannelKind) -> Arc<Self> {
        Self::failing(kind, 0)
    }

    /// Fails the first `failures` calls with a provider error
    pub fn failing(kind: ChannelKind, failures: u32) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failures,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    /// Every call fails
    pub fn broken(kind: ChannelKind) -> Arc<Self> {
        Self::failing(kind, u32::MAX)
    }

    /// Succeeds after sleeping `delay` on every call
    pub fn slow(kind: ChannelKind, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            failures: 0,
            delay,
            calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Envelope> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    fn provider(&self) -> &str {
        "recording"
    }

    async fn send(&self, envelope: &Envelope) -> Result<Delivery, SendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if call <= self.failures {
            return Err(SendError::Provider {
                status: 503,
                message: format!("unavailable (call {})", call),
            });
        }

        self.sent.lock().push(envelope.clone());
        Ok(Delivery {
            provider_id: Some(format!("msg-{}", call)),
        })
    }
}

/// Notification policy with millisecond backoff
pub fn fast_config(max_retries: u32) -> NotificationConfig {
    NotificationConfig {
        max_retries,
        base_delay_ms: 5,
        ..Default::default()
    }
}

/// Parse Prometheus exposition output into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
