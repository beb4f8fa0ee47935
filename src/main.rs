use alert_notifier::{
    api::{build_router, AppState},
    config::{Config, IngestionConfig, NotificationConfig, ObservabilityConfig, ServerConfig},
    notifications::Dispatcher,
    state::InMemoryAlertStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        default_config()
    });

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "alert_notifier={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting alert notifier v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = alert_notifier::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    let store = Arc::new(InMemoryAlertStore::new());

    // A dispatcher without providers still classifies and counts; it only skips delivery
    let dispatcher = match Dispatcher::from_config(&config.notifications) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            tracing::warn!("Notification provider initialization failed: {}", e);
            tracing::warn!("Continuing without notification providers");
            Dispatcher::builder(config.notifications.clone()).build()?
        }
    };

    let app_state = AppState::new(store, dispatcher.clone())
        .with_ingestion(config.ingestion.clone());
    let app = build_router(app_state);

    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   REST API: http://{}/v1/alerts", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutting down gracefully...");
    let grace = Duration::from_secs(config.server.shutdown_grace_secs);
    if !dispatcher.shutdown(grace).await {
        let status = dispatcher.status();
        tracing::warn!(
            in_flight = status.in_flight,
            "Exiting with notifications still in flight"
        );
    }

    Ok(())
}

fn default_config() -> Config {
    Config {
        server: ServerConfig {
            host: "0.0.0.0".to_string(),
            http_port: 10000,
            shutdown_grace_secs: 30,
        },
        observability: ObservabilityConfig {
            log_level: "info".to_string(),
            json_logs: false,
            prometheus_enabled: true,
        },
        ingestion: IngestionConfig::default(),
        notifications: NotificationConfig::default(),
    }
}
