use crate::error::{AppError, Result};
use crate::models::{ChannelKind, Envelope};
use crate::notifications::channel::{Delivery, DeliveryChannel, SendError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

/// SMS channel backed by a Twilio-compatible messaging API
#[derive(Clone)]
pub struct SmsSender {
    pub(crate) client: Client,
    pub(crate) api_base: String,
    pub(crate) account_sid: String,
    pub(crate) auth_token: String,
    pub(crate) from_number: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: Option<u32>,
    message: Option<String>,
}

impl SmsSender {
    /// Create a new SMS sender
    pub fn new(
        api_base: String,
        account_sid: String,
        auth_token: String,
        from_number: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        if account_sid.is_empty() || auth_token.is_empty() {
            return Err(AppError::Configuration(
                "SMS account SID and auth token are required".to_string(),
            ));
        }

        if from_number.is_empty() {
            return Err(AppError::Configuration(
                "SMS sender number cannot be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            from_number,
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

impl std::fmt::Debug for SmsSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsSender")
            .field("api_base", &self.api_base)
            .field("from_number", &self.from_number)
            .finish()
    }
}

#[async_trait]
impl DeliveryChannel for SmsSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn provider(&self) -> &str {
        "twilio"
    }

    async fn send(&self, envelope: &Envelope) -> std::result::Result<Delivery, SendError> {
        let params = [
            ("To", envelope.to.as_str()),
            ("From", self.from_number.as_str()),
            ("Body", envelope.text_body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| SendError::Transport(format!("Failed to reach SMS provider: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(ApiErrorResponse {
                    code: Some(code),
                    message: Some(message),
                }) => format!("{} (code {})", message, code),
                Ok(ApiErrorResponse {
                    message: Some(message),
                    ..
                }) => message,
                _ => body,
            };

            return Err(SendError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let resource: MessageResource = response.json().await.map_err(|e| {
            SendError::Transport(format!("Failed to parse SMS provider response: {}", e))
        })?;

        info!(
            to = %envelope.to,
            message_sid = ?resource.sid,
            provider_status = ?resource.status,
            "SMS accepted by provider"
        );

        Ok(Delivery {
            provider_id: resource.sid,
        })
    }
}
