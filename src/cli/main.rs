use alert_notifier::config::Config;
use alert_notifier::models::{Alert, ChannelKind};
use alert_notifier::notifications::{MessageComposer, ReceiverClassifier};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;

#[derive(Parser)]
#[command(name = "alert-notifier-cli")]
#[command(about = "Weapon detection alert notifier CLI", long_about = None, version)]
struct Cli {
    #[arg(short, long, env = "ALERT_NOTIFIER_ENDPOINT", default_value = "http://localhost:10000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which channel a receiver would be notified on
    Classify {
        #[arg(value_name = "RECEIVER")]
        receiver: String,
    },

    /// Render the notification an alert would produce
    Preview {
        #[arg(value_name = "IMAGE_REF")]
        image_ref: String,

        #[arg(short, long, default_value = "")]
        location: String,

        /// Render the SMS variant
        #[arg(long)]
        sms: bool,
    },

    /// Submit an alert
    Submit {
        #[arg(short, long)]
        image_ref: String,

        #[arg(short, long)]
        receiver: String,

        #[arg(short, long, default_value = "")]
        location: String,

        #[arg(short, long)]
        user_id: String,
    },

    /// Show dispatcher counters
    Status,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Classify { receiver } => {
            let config = Config::load().context("Failed to load configuration")?;
            let classifier = ReceiverClassifier::new(&config.notifications.phone_country_code)?;
            let kind = classifier.classify(&receiver);

            println!("{}", serde_json::to_string_pretty(&json!({
                "receiver": receiver.trim(),
                "kind": kind,
                "channel": kind.channel(),
            }))?);
        }

        Commands::Preview {
            image_ref,
            location,
            sms,
        } => {
            let config = Config::load().context("Failed to load configuration")?;
            let composer = MessageComposer::new(
                config.notifications.link_base_url.clone(),
                config.notifications.sms_max_chars,
            );

            let alert = Alert::new(image_ref, "preview", location, "cli");
            let channel = if sms { ChannelKind::Sms } else { ChannelKind::Email };
            let message = composer.compose_for(&alert, channel);

            println!("Subject: {}", message.subject);
            println!("Link: {}", composer.alert_link(&alert));
            println!();
            println!("{}", message.text_body);
        }

        Commands::Submit {
            image_ref,
            receiver,
            location,
            user_id,
        } => {
            let response = Client::new()
                .post(format!("{}/v1/alerts", cli.endpoint))
                .json(&json!({
                    "image_ref": image_ref,
                    "receiver": receiver,
                    "location": location,
                    "user_id": user_id,
                }))
                .send()
                .await
                .context("Failed to reach alert notifier")?;

            print_response(response).await?;
        }

        Commands::Status => {
            let response = Client::new()
                .get(format!("{}/v1/notifications/status", cli.endpoint))
                .send()
                .await
                .context("Failed to reach alert notifier")?;

            print_response(response).await?;
        }

        Commands::Health => {
            let response = Client::new()
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await
                .context("Failed to reach alert notifier")?;

            print_response(response).await?;
        }
    }

    Ok(())
}

async fn print_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Server returned a non-JSON body")?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        bail!("request failed with status {}", status);
    }
    Ok(())
}
