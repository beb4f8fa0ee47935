use crate::error::{AppError, Result};
use crate::models::{ChannelKind, Envelope};
use crate::notifications::channel::{Delivery, DeliveryChannel, SendError};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// SMTP email channel
#[derive(Clone)]
pub struct EmailSender {
    smtp_server: String,
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailSender {
    /// Create a new email sender
    pub fn new(
        smtp_server: String,
        smtp_port: u16,
        smtp_username: Option<String>,
        smtp_password: Option<String>,
        from_email: String,
        from_name: Option<String>,
        use_tls: bool,
    ) -> Result<Self> {
        if smtp_server.is_empty() {
            return Err(AppError::Configuration(
                "SMTP server cannot be empty".to_string(),
            ));
        }

        if from_email.is_empty() {
            return Err(AppError::Configuration(
                "From email cannot be empty".to_string(),
            ));
        }

        let from_mailbox = match &from_name {
            Some(name) => format!("{} <{}>", name, from_email),
            None => from_email.clone(),
        };
        let from: Mailbox = from_mailbox
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid from address: {}", e)))?;

        let mut builder = if use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp_server)
                .map_err(|e| AppError::Configuration(format!("Invalid SMTP server: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp_server)
        };
        builder = builder.port(smtp_port);

        // Add authentication if provided
        if let (Some(user), Some(pass)) = (smtp_username, smtp_password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        debug!(smtp_server = %smtp_server, smtp_port, use_tls, "Email sender configured");

        Ok(Self {
            smtp_server,
            from,
            transport: builder.build(),
        })
    }

    /// Build a multipart message when an HTML body is present, plain text otherwise
    pub(crate) fn build_message(&self, envelope: &Envelope) -> std::result::Result<Message, SendError> {
        let to: Mailbox = envelope.to.parse().map_err(|e| {
            SendError::InvalidMessage(format!("Invalid recipient address '{}': {}", envelope.to, e))
        })?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(envelope.subject.clone());

        let message = match &envelope.html_body {
            Some(html) => builder.multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(envelope.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html.clone()),
                    ),
            ),
            None => builder
                .header(header::ContentType::TEXT_PLAIN)
                .body(envelope.text_body.clone()),
        };

        message.map_err(|e| SendError::InvalidMessage(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl DeliveryChannel for EmailSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn provider(&self) -> &str {
        "smtp"
    }

    async fn send(&self, envelope: &Envelope) -> std::result::Result<Delivery, SendError> {
        let message = self.build_message(envelope)?;

        let response = self.transport.send(message).await.map_err(|e| {
            match e.status().and_then(|code| code.to_string().parse::<u16>().ok()) {
                Some(status) => SendError::Provider {
                    status,
                    message: e.to_string(),
                },
                None => SendError::Transport(e.to_string()),
            }
        })?;

        let provider_id = response.message().next().map(|line| line.to_string());

        info!(
            smtp_server = %self.smtp_server,
            to = %envelope.to,
            code = %response.code(),
            "Email accepted by SMTP server"
        );

        Ok(Delivery { provider_id })
    }
}
