//! Prometheus metrics for alert ingestion and notification dispatch.
//!
//! All metrics live in a process-wide registry and are exported in text
//! format by the `/metrics` endpoint.
//!
//! ```no_run
//! use alert_notifier::metrics::NOTIFICATIONS_SENT_TOTAL;
//!
//! NOTIFICATIONS_SENT_TOTAL.with_label_values(&["email"]).inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
};

const NAMESPACE: &str = "alert_notifier";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Alerts persisted by the ingestion endpoint
    pub static ref ALERTS_INGESTED_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new("alerts_ingested_total", "Total number of alerts persisted")
            .namespace(NAMESPACE)
    ).expect("Failed to create ALERTS_INGESTED_TOTAL metric");

    /// Jobs accepted by the dispatcher
    ///
    /// Labels: channel
    pub static ref NOTIFICATIONS_SUBMITTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("notifications_submitted_total", "Total number of notification jobs accepted")
            .namespace(NAMESPACE),
        &["channel"]
    ).expect("Failed to create NOTIFICATIONS_SUBMITTED_TOTAL metric");

    /// Jobs that reached the Sent outcome
    ///
    /// Labels: channel
    pub static ref NOTIFICATIONS_SENT_TOTAL: CounterVec = CounterVec::new(
        Opts::new("notifications_sent_total", "Total number of notifications delivered")
            .namespace(NAMESPACE),
        &["channel"]
    ).expect("Failed to create NOTIFICATIONS_SENT_TOTAL metric");

    /// Jobs that exhausted their retries
    ///
    /// Labels: channel
    pub static ref NOTIFICATIONS_FAILED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("notifications_failed_total", "Total number of notifications that failed after all retries")
            .namespace(NAMESPACE),
        &["channel"]
    ).expect("Failed to create NOTIFICATIONS_FAILED_TOTAL metric");

    /// Individual provider calls
    ///
    /// Labels: channel, result (success, failure)
    pub static ref NOTIFICATION_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("notification_attempts_total", "Total number of provider send attempts")
            .namespace(NAMESPACE),
        &["channel", "result"]
    ).expect("Failed to create NOTIFICATION_ATTEMPTS_TOTAL metric");

    /// Submissions that did not produce a job
    ///
    /// Labels: reason
    pub static ref NOTIFICATIONS_REJECTED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("notifications_rejected_total", "Total number of submissions refused by the dispatcher")
            .namespace(NAMESPACE),
        &["reason"]
    ).expect("Failed to create NOTIFICATIONS_REJECTED_TOTAL metric");

    /// Provider call duration in seconds
    ///
    /// Labels: channel
    pub static ref NOTIFICATION_SEND_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "notification_send_duration_seconds",
            "Provider call duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["channel"]
    ).expect("Failed to create NOTIFICATION_SEND_DURATION_SECONDS metric");

    /// Jobs currently running or waiting to retry
    pub static ref NOTIFICATIONS_IN_FLIGHT: Gauge = Gauge::with_opts(
        Opts::new("notifications_in_flight", "Number of notification jobs in flight")
            .namespace(NAMESPACE)
    ).expect("Failed to create NOTIFICATIONS_IN_FLIGHT metric");
}

/// Register all metrics with the global registry
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(ALERTS_INGESTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATIONS_SUBMITTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATIONS_SENT_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATIONS_FAILED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATION_ATTEMPTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATIONS_REJECTED_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATION_SEND_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(NOTIFICATIONS_IN_FLIGHT.clone()))?;

    tracing::debug!("Prometheus metrics registered");
    Ok(())
}

/// Encode the registry in the Prometheus text exposition format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
