use crate::config::NotificationConfig;
use crate::error::{AppError, Result};
use crate::metrics::{
    NOTIFICATIONS_FAILED_TOTAL, NOTIFICATIONS_IN_FLIGHT, NOTIFICATIONS_REJECTED_TOTAL,
    NOTIFICATIONS_SENT_TOTAL, NOTIFICATIONS_SUBMITTED_TOTAL, NOTIFICATION_ATTEMPTS_TOTAL,
    NOTIFICATION_SEND_DURATION_SECONDS,
};
use crate::models::{
    Alert, ChannelKind, DispatchJob, DispatchOutcome, DispatchReport, Envelope, JobPayload,
    RejectReason, SkipReason, SubmitAck,
};
use crate::notifications::channel::{DeliveryChannel, DispatchError};
use crate::notifications::classifier::ReceiverClassifier;
use crate::notifications::composer::MessageComposer;
use crate::notifications::email::EmailSender;
use crate::notifications::sms::SmsSender;
use crate::notifications::stats::{DispatchStats, DispatchStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Bounded exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// `max_retries` counts total attempts; zero still allows one
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_retries.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait before the attempt following failed attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl From<&NotificationConfig> for RetryPolicy {
    fn from(config: &NotificationConfig) -> Self {
        Self::new(config.max_retries, config.base_delay())
    }
}

/// Asynchronous notification dispatcher
///
/// Cheap to clone; all clones share counters, channels and lifecycle. Every
/// accepted job runs on its own tokio task, so `submit` must be called from
/// within a runtime.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    classifier: ReceiverClassifier,
    composer: MessageComposer,
    channels: HashMap<ChannelKind, Arc<dyn DeliveryChannel>>,
    retry: RetryPolicy,
    permits: Option<Arc<Semaphore>>,
    max_queue_depth: Option<usize>,
    stats: DispatchStats,
    shutdown: CancellationToken,
    idle: Notify,
}

/// Builder for [`Dispatcher`]
pub struct DispatcherBuilder {
    config: NotificationConfig,
    channels: HashMap<ChannelKind, Arc<dyn DeliveryChannel>>,
}

impl DispatcherBuilder {
    /// Register a channel, replacing any previous one of the same kind
    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channels.insert(channel.kind(), channel);
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        self.config.validate().map_err(AppError::Configuration)?;

        let config = self.config;
        let classifier = ReceiverClassifier::new(&config.phone_country_code)?;
        let composer = MessageComposer::new(config.link_base_url.clone(), config.sms_max_chars);

        info!(
            email_enabled = self.channels.contains_key(&ChannelKind::Email),
            sms_enabled = self.channels.contains_key(&ChannelKind::Sms),
            max_attempts = config.max_retries.max(1),
            base_delay_ms = config.base_delay_ms,
            max_queue_depth = ?config.max_queue_depth,
            "Notification dispatcher initialized"
        );

        Ok(Dispatcher {
            inner: Arc::new(Inner {
                classifier,
                composer,
                channels: self.channels,
                retry: RetryPolicy::from(&config),
                permits: config
                    .max_queue_depth
                    .map(|depth| Arc::new(Semaphore::new(depth))),
                max_queue_depth: config.max_queue_depth,
                stats: DispatchStats::new(config.recent_outcomes),
                shutdown: CancellationToken::new(),
                idle: Notify::new(),
            }),
        })
    }
}

impl Dispatcher {
    pub fn builder(config: NotificationConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            channels: HashMap::new(),
        }
    }

    /// Build a dispatcher with the providers enabled in `config`
    ///
    /// Credentials are read from the environment variables the config names.
    /// A channel that is enabled but incompletely configured is left out with
    /// a warning; receivers of that kind are then skipped.
    pub fn from_config(config: &NotificationConfig) -> Result<Self> {
        let mut builder = Self::builder(config.clone());

        if config.email_enabled {
            if let (Some(server), Some(from)) =
                (config.smtp_server.as_ref(), config.email_from.as_ref())
            {
                let username = config
                    .smtp_username_env
                    .as_ref()
                    .and_then(|env_var| std::env::var(env_var).ok());

                let password = config
                    .smtp_password_env
                    .as_ref()
                    .and_then(|env_var| std::env::var(env_var).ok());

                builder = builder.with_channel(Arc::new(EmailSender::new(
                    server.clone(),
                    config.smtp_port,
                    username,
                    password,
                    from.clone(),
                    config.email_from_name.clone(),
                    config.smtp_use_tls,
                )?));
            } else {
                warn!("Email notifications enabled but SMTP server or from address not configured");
            }
        }

        if config.sms_enabled {
            let account_sid = config
                .sms_account_sid_env
                .as_ref()
                .and_then(|env_var| std::env::var(env_var).ok());

            let auth_token = config
                .sms_auth_token_env
                .as_ref()
                .and_then(|env_var| std::env::var(env_var).ok());

            match (account_sid, auth_token, config.sms_from_number.as_ref()) {
                (Some(sid), Some(token), Some(from)) => {
                    builder = builder.with_channel(Arc::new(SmsSender::new(
                        config.sms_api_base.clone(),
                        sid,
                        token,
                        from.clone(),
                        config.sms_timeout_secs,
                    )?));
                }
                _ => {
                    warn!("SMS notifications enabled but account credentials or sender number not configured");
                }
            }
        }

        builder.build()
    }

    /// Classify the alert's receiver and schedule one notification
    ///
    /// Returns as soon as the job is scheduled; no provider I/O happens on
    /// the caller's task.
    pub fn submit(&self, alert: impl Into<Arc<Alert>>) -> SubmitAck {
        let alert = alert.into();

        let kind = self.inner.classifier.classify(&alert.receiver);
        let channel = match kind.channel() {
            Some(channel) => channel,
            None => {
                self.inner.stats.record_unrecognized();
                info!(
                    alert_id = %alert.id,
                    receiver = %alert.receiver,
                    error = %DispatchError::ClassificationMiss,
                    "Skipping notification"
                );
                return SubmitAck::Skipped {
                    reason: SkipReason::UnrecognizedReceiver,
                };
            }
        };

        debug!(alert_id = %alert.id, ?kind, "Receiver classified");
        self.schedule(DispatchJob::for_alert(alert, channel))
    }

    /// Schedule a pre-composed message on an explicit channel
    pub fn submit_envelope(&self, channel: ChannelKind, envelope: Envelope) -> SubmitAck {
        self.schedule(DispatchJob::for_envelope(envelope, channel))
    }

    pub fn status(&self) -> DispatchStatus {
        self.inner.stats.snapshot()
    }

    /// Terminal outcomes of recent jobs, newest last
    pub fn recent_outcomes(&self) -> Vec<DispatchReport> {
        self.inner.stats.recent()
    }

    /// Wait until no job is in flight; `false` on timeout
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let inner = &self.inner;
        let drained = async {
            loop {
                let notified = inner.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if inner.stats.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, drained).await.is_ok()
    }

    /// Stop accepting jobs, abandon pending retries and drain
    ///
    /// Jobs in the middle of a provider call are allowed to finish within
    /// `grace`. Returns whether every job finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.inner.stats.stop_accepting();
        self.inner.shutdown.cancel();

        info!(
            in_flight = self.inner.stats.in_flight(),
            grace_secs = grace.as_secs(),
            "Notification dispatcher shutting down"
        );

        let drained = self.wait_idle(grace).await;
        if drained {
            info!("Notification dispatcher drained");
        } else {
            warn!(
                in_flight = self.inner.stats.in_flight(),
                "Notification dispatcher did not drain within grace period"
            );
        }
        drained
    }

    fn schedule(&self, job: DispatchJob) -> SubmitAck {
        let inner = &self.inner;
        let channel = job.channel;

        let Some(sender) = inner.channels.get(&channel).cloned() else {
            inner.stats.record_unavailable();
            warn!(
                job_id = %job.id,
                recipient = %job.recipient(),
                error = %DispatchError::ChannelUnavailable(channel),
                "Skipping notification"
            );
            return SubmitAck::Skipped {
                reason: SkipReason::ChannelUnavailable,
            };
        };

        if !inner.stats.is_accepting() || inner.shutdown.is_cancelled() {
            return self.reject(&job, DispatchError::ShutDown);
        }

        let permit = match &inner.permits {
            Some(semaphore) => match semaphore.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    let depth = inner.max_queue_depth.unwrap_or_default();
                    return self.reject(&job, DispatchError::QueueFull(depth));
                }
            },
            None => None,
        };

        inner.stats.record_accepted();
        NOTIFICATIONS_SUBMITTED_TOTAL
            .with_label_values(&[channel.as_ref()])
            .inc();
        NOTIFICATIONS_IN_FLIGHT.inc();

        let job_id = job.id;
        info!(
            job_id = %job_id,
            alert_id = ?job.alert_id(),
            channel = %channel,
            recipient = %job.recipient(),
            "Notification queued"
        );

        let guard = InFlightGuard {
            inner: self.inner.clone(),
            _permit: permit,
        };
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _guard = guard;
            inner.run(job, sender).await;
        });

        SubmitAck::Accepted { job_id, channel }
    }

    fn reject(&self, job: &DispatchJob, err: DispatchError) -> SubmitAck {
        let reason = err.reject_reason().unwrap_or(RejectReason::ShutDown);
        self.inner.stats.record_rejected();
        NOTIFICATIONS_REJECTED_TOTAL
            .with_label_values(&[&reason.to_string()])
            .inc();
        warn!(
            job_id = %job.id,
            alert_id = ?job.alert_id(),
            channel = %job.channel,
            error = %err,
            "Notification rejected"
        );
        SubmitAck::Rejected { reason }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("channels", &self.inner.channels.keys().collect::<Vec<_>>())
            .field("retry", &self.inner.retry)
            .field("status", &self.inner.stats.snapshot())
            .finish()
    }
}

impl Inner {
    async fn run(&self, mut job: DispatchJob, sender: Arc<dyn DeliveryChannel>) {
        let channel = job.channel.as_ref().to_string();
        let envelope = match &job.payload {
            JobPayload::Alert(alert) => self
                .composer
                .compose_for(alert, job.channel)
                .into_envelope(job.recipient()),
            JobPayload::Envelope(envelope) => envelope.clone(),
        };

        loop {
            let started = Instant::now();
            let result = sender.send(&envelope).await;
            NOTIFICATION_SEND_DURATION_SECONDS
                .with_label_values(&[&channel])
                .observe(started.elapsed().as_secs_f64());

            match result {
                Ok(delivery) => {
                    NOTIFICATION_ATTEMPTS_TOTAL
                        .with_label_values(&[&channel, "success"])
                        .inc();
                    NOTIFICATIONS_SENT_TOTAL.with_label_values(&[&channel]).inc();
                    job.outcome = DispatchOutcome::Sent;
                    job.last_error = None;

                    info!(
                        job_id = %job.id,
                        alert_id = ?job.alert_id(),
                        channel = %job.channel,
                        provider = sender.provider(),
                        provider_id = ?delivery.provider_id,
                        attempt = job.attempt,
                        "Notification sent successfully"
                    );
                    break;
                }
                Err(e) => {
                    NOTIFICATION_ATTEMPTS_TOTAL
                        .with_label_values(&[&channel, "failure"])
                        .inc();
                    let e = DispatchError::from(e);
                    job.last_error = Some(e.to_string());

                    if !e.is_retryable() || job.attempt >= self.retry.max_attempts() {
                        NOTIFICATIONS_FAILED_TOTAL.with_label_values(&[&channel]).inc();
                        job.outcome = DispatchOutcome::Failed;

                        error!(
                            job_id = %job.id,
                            alert_id = ?job.alert_id(),
                            channel = %job.channel,
                            recipient = %job.recipient(),
                            total_attempts = job.attempt,
                            retryable = e.is_retryable(),
                            error = %e,
                            "Notification failed"
                        );
                        break;
                    }

                    let delay = self.retry.delay_for(job.attempt);
                    warn!(
                        job_id = %job.id,
                        channel = %job.channel,
                        attempt = job.attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Notification attempt failed, retrying"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.shutdown.cancelled() => {
                            job.outcome = DispatchOutcome::Abandoned;
                            warn!(
                                job_id = %job.id,
                                alert_id = ?job.alert_id(),
                                channel = %job.channel,
                                attempts = job.attempt,
                                "Notification abandoned during shutdown"
                            );
                            break;
                        }
                    }

                    job.attempt += 1;
                }
            }
        }

        self.stats.record_outcome(job.report());
    }
}

/// Releases the in-flight slot exactly once, even if the job task panics
struct InFlightGuard {
    inner: Arc<Inner>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        NOTIFICATIONS_IN_FLIGHT.dec();
        if self.inner.stats.record_job_exit() == 0 {
            self.inner.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::channel::{Delivery, SendError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then succeeds
    struct FlakyChannel {
        kind: ChannelKind,
        failures: u32,
        calls: AtomicU32,
        sent: Mutex<Vec<Envelope>>,
    }

    impl FlakyChannel {
        fn new(kind: ChannelKind, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                kind,
                failures,
                calls: AtomicU32::new(0),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DeliveryChannel for FlakyChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn provider(&self) -> &str {
            "stub"
        }

        async fn send(&self, envelope: &Envelope) -> std::result::Result<Delivery, SendError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(SendError::Transport(format!("failure {}", call)));
            }
            self.sent.lock().push(envelope.clone());
            Ok(Delivery::default())
        }
    }

    /// Rejects every message before it reaches the provider
    struct InvalidRecipientChannel {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DeliveryChannel for InvalidRecipientChannel {
        fn kind(&self) -> ChannelKind {
            ChannelKind::Email
        }

        fn provider(&self) -> &str {
            "stub"
        }

        async fn send(&self, envelope: &Envelope) -> std::result::Result<Delivery, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SendError::InvalidMessage(format!(
                "Invalid recipient address '{}': Invalid email domain",
                envelope.to
            )))
        }
    }

    fn test_config() -> NotificationConfig {
        NotificationConfig {
            max_retries: 3,
            base_delay_ms: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_retry_policy_delays() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));

        assert_eq!(RetryPolicy::new(0, Duration::from_millis(5)).max_attempts(), 1);
        // saturates instead of overflowing
        let _ = policy.delay_for(u32::MAX);
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let config = NotificationConfig {
            base_delay_ms: 0,
            ..Default::default()
        };
        tokio_test::assert_err!(Dispatcher::builder(config).build());

        let config = NotificationConfig {
            phone_country_code: String::new(),
            ..Default::default()
        };
        tokio_test::assert_err!(Dispatcher::builder(config).build());

        tokio_test::assert_ok!(Dispatcher::builder(test_config()).build());
    }

    #[tokio::test]
    async fn test_from_config_without_providers() {
        let dispatcher = Dispatcher::from_config(&NotificationConfig::default()).unwrap();

        let ack = dispatcher.submit(Alert::new("media/a.jpg", "alice@example.com", "", "u"));
        assert_eq!(
            ack,
            SubmitAck::Skipped {
                reason: SkipReason::ChannelUnavailable
            }
        );
        assert_eq!(dispatcher.status().unavailable, 1);
        assert_eq!(dispatcher.status().queued, 0);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let email = FlakyChannel::new(ChannelKind::Email, 2);
        let dispatcher = Dispatcher::builder(test_config())
            .with_channel(email.clone())
            .build()
            .unwrap();

        let ack = dispatcher.submit(Alert::new("media/uploads/abc.jpg", "alice@example.com", "Quito", "u"));
        assert!(ack.is_accepted());
        assert!(dispatcher.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(email.calls(), 3);
        let status = dispatcher.status();
        assert_eq!(status.sent, 1);
        assert_eq!(status.failed, 0);
        assert_eq!(status.in_flight, 0);

        let sent = email.sent.lock();
        assert_eq!(sent[0].to, "alice@example.com");
        assert!(sent[0].text_body.contains("/alert/abc"));

        let recent = dispatcher.recent_outcomes();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].attempts, 3);
        assert_eq!(recent[0].outcome, DispatchOutcome::Sent);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let sms = FlakyChannel::new(ChannelKind::Sms, u32::MAX);
        let dispatcher = Dispatcher::builder(test_config())
            .with_channel(sms.clone())
            .build()
            .unwrap();

        let ack = dispatcher.submit(Alert::new("media/a.jpg", "+593987654321", "", "u"));
        assert!(matches!(ack, SubmitAck::Accepted { channel: ChannelKind::Sms, .. }));
        assert!(dispatcher.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(sms.calls(), 3);
        let status = dispatcher.status();
        assert_eq!(status.failed, 1);
        assert_eq!(status.sent, 0);
        let recent = dispatcher.recent_outcomes();
        assert_eq!(recent[0].error.as_deref(), Some("transport error: failure 3"));
    }

    #[tokio::test]
    async fn test_invalid_message_is_not_retried() {
        let email = Arc::new(InvalidRecipientChannel {
            calls: AtomicU32::new(0),
        });
        let config = NotificationConfig {
            max_retries: 5,
            base_delay_ms: 60_000,
            ..Default::default()
        };
        let dispatcher = Dispatcher::builder(config)
            .with_channel(email.clone())
            .build()
            .unwrap();

        let ack = dispatcher.submit(Alert::new("media/a.jpg", "ab@__.com", "", "u"));
        assert!(ack.is_accepted());
        // a retry would sit in a 60s backoff
        assert!(dispatcher.wait_idle(Duration::from_secs(5)).await);

        assert_eq!(email.calls.load(Ordering::SeqCst), 1);
        let status = dispatcher.status();
        assert_eq!(status.failed, 1);
        let recent = dispatcher.recent_outcomes();
        assert_eq!(recent[0].attempts, 1);
        assert_eq!(recent[0].outcome, DispatchOutcome::Failed);
        assert!(recent[0]
            .error
            .as_deref()
            .unwrap_or_default()
            .starts_with("invalid message"));
    }

    #[tokio::test]
    async fn test_unrecognized_receiver_is_skipped() {
        let email = FlakyChannel::new(ChannelKind::Email, 0);
        let dispatcher = Dispatcher::builder(test_config())
            .with_channel(email.clone())
            .build()
            .unwrap();

        let ack = dispatcher.submit(Alert::new("media/a.jpg", "not-a-contact", "", "u"));
        assert_eq!(
            ack,
            SubmitAck::Skipped {
                reason: SkipReason::UnrecognizedReceiver
            }
        );
        let status = dispatcher.status();
        assert_eq!(status.queued, 0);
        assert_eq!(status.unrecognized, 1);
        assert_eq!(email.calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_envelope() {
        let email = FlakyChannel::new(ChannelKind::Email, 0);
        let dispatcher = Dispatcher::builder(test_config())
            .with_channel(email.clone())
            .build()
            .unwrap();

        let envelope = Envelope {
            to: "ops@example.com".to_string(),
            subject: "Test".to_string(),
            text_body: "hello".to_string(),
            html_body: None,
        };
        let ack = dispatcher.submit_envelope(ChannelKind::Email, envelope.clone());
        assert!(ack.is_accepted());
        assert!(dispatcher.wait_idle(Duration::from_secs(5)).await);
        assert_eq!(email.sent.lock()[0], envelope);
        assert_eq!(dispatcher.recent_outcomes()[0].alert_id, None);
    }

    #[tokio::test]
    async fn test_rejects_after_shutdown() {
        let email = FlakyChannel::new(ChannelKind::Email, 0);
        let dispatcher = Dispatcher::builder(test_config())
            .with_channel(email)
            .build()
            .unwrap();

        assert!(dispatcher.shutdown(Duration::from_secs(1)).await);
        let ack = dispatcher.submit(Alert::new("media/a.jpg", "alice@example.com", "", "u"));
        assert_eq!(
            ack,
            SubmitAck::Rejected {
                reason: RejectReason::ShutDown
            }
        );
        let status = dispatcher.status();
        assert!(!status.accepting);
        assert_eq!(status.rejected, 1);
    }

    #[tokio::test]
    async fn test_wait_idle_with_nothing_in_flight() {
        let dispatcher = Dispatcher::builder(test_config()).build().unwrap();
        assert!(dispatcher.wait_idle(Duration::from_millis(10)).await);
    }
}
