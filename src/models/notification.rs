use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{AsRefStr, Display};
use uuid::Uuid;

use super::Alert;

/// Delivery mechanism chosen for a receiver
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Sms,
}

/// Lifecycle state of a dispatch job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchOutcome {
    Pending,
    Sent,
    Failed,
    /// Dropped by shutdown while waiting to retry
    Abandoned,
}

/// Provider-agnostic message ready to hand to a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
}

/// What a job sends: either derived from an alert or pre-composed
#[derive(Debug, Clone)]
pub enum JobPayload {
    Alert(Arc<Alert>),
    Envelope(Envelope),
}

/// Ephemeral state for one sequence of send attempts
///
/// Never persisted; dropped once the outcome is terminal.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub id: Uuid,
    pub payload: JobPayload,
    pub channel: ChannelKind,
    pub attempt: u32,
    pub outcome: DispatchOutcome,
    pub last_error: Option<String>,
}

impl DispatchJob {
    pub fn for_alert(alert: Arc<Alert>, channel: ChannelKind) -> Self {
        Self::new(JobPayload::Alert(alert), channel)
    }

    pub fn for_envelope(envelope: Envelope, channel: ChannelKind) -> Self {
        Self::new(JobPayload::Envelope(envelope), channel)
    }

    fn new(payload: JobPayload, channel: ChannelKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            channel,
            attempt: 1,
            outcome: DispatchOutcome::Pending,
            last_error: None,
        }
    }

    pub fn alert_id(&self) -> Option<Uuid> {
        match &self.payload {
            JobPayload::Alert(alert) => Some(alert.id),
            JobPayload::Envelope(_) => None,
        }
    }

    pub fn recipient(&self) -> &str {
        match &self.payload {
            JobPayload::Alert(alert) => alert.receiver.trim(),
            JobPayload::Envelope(envelope) => &envelope.to,
        }
    }

    /// Build the report recorded when the job reaches a terminal state
    pub fn report(&self) -> DispatchReport {
        DispatchReport {
            job_id: self.id,
            alert_id: self.alert_id(),
            channel: self.channel,
            outcome: self.outcome,
            attempts: self.attempt,
            error: self.last_error.clone(),
            finished_at: Utc::now(),
        }
    }
}

/// Terminal record of a job, kept in the recent-outcome log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub job_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<Uuid>,
    pub channel: ChannelKind,
    pub outcome: DispatchOutcome,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Why a submission did not produce a job
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    UnrecognizedReceiver,
    ChannelUnavailable,
}

/// Why a submission was refused
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectReason {
    QueueFull,
    ShutDown,
}

/// Immediate acknowledgement returned by `submit`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitAck {
    Accepted { job_id: Uuid, channel: ChannelKind },
    Skipped { reason: SkipReason },
    Rejected { reason: RejectReason },
}

impl SubmitAck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitAck::Accepted { .. })
    }

    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            SubmitAck::Accepted { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}
