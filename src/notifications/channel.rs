//! Delivery channel abstraction over provider APIs.

use crate::models::{ChannelKind, Envelope, RejectReason};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a provider call
///
/// Carries enough detail for operator logs; never surfaced to the user who
/// triggered the alert.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SendError {
    /// Provider answered with an error status
    #[error("provider rejected message ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Connection, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Message could not be built for this provider
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Errors of the dispatch subsystem
///
/// None of these propagate to the ingestion request; they are turned into
/// a `SubmitAck` or a log entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("receiver matches neither an email address nor a phone number")]
    ClassificationMiss,

    #[error("no {0} channel configured")]
    ChannelUnavailable(ChannelKind),

    #[error("dispatch queue is full ({0} jobs in flight)")]
    QueueFull(usize),

    #[error("dispatcher is shut down")]
    ShutDown,

    #[error(transparent)]
    Send(#[from] SendError),
}

impl DispatchError {
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            DispatchError::QueueFull(_) => Some(RejectReason::QueueFull),
            DispatchError::ShutDown => Some(RejectReason::ShutDown),
            _ => None,
        }
    }

    /// Whether another attempt could succeed
    ///
    /// A message the provider cannot even build fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::Send(SendError::Provider { .. } | SendError::Transport(_))
        )
    }
}

/// Provider acknowledgement of a successful send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delivery {
    /// Provider-side message id, when the API returns one
    pub provider_id: Option<String>,
}

/// One external provider
///
/// Exactly one provider call per `send`; retries belong to the dispatcher.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Channel this provider serves
    fn kind(&self) -> ChannelKind;

    /// Provider name for logs (e.g. "smtp", "twilio")
    fn provider(&self) -> &str;

    /// Send one message
    async fn send(&self, envelope: &Envelope) -> Result<Delivery, SendError>;
}

impl std::fmt::Debug for dyn DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryChannel")
            .field("kind", &self.kind())
            .field("provider", &self.provider())
            .finish()
    }
}
