use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics::ALERTS_INGESTED_TOTAL;
use crate::models::{Alert, DispatchReport, SubmitAck};
use crate::notifications::DispatchStatus;
use crate::state::AlertFilter;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let status = state.dispatcher.status();

    Ok(Json(HealthResponse {
        status: if status.accepting { "healthy" } else { "draining" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        notifications_in_flight: status.in_flight,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub notifications_in_flight: u64,
}

/// Persist an alert and schedule its notification
///
/// The response never waits on the provider: `dispatch` only says whether a
/// job was scheduled.
pub async fn submit_alert(
    State(state): State<AppState>,
    Json(request): Json<SubmitAlertRequest>,
) -> Result<(StatusCode, Json<SubmitAlertResponse>)> {
    request.validate()?;

    if request.receiver.chars().count() > state.ingestion.max_receiver_len {
        return Err(AppError::Validation(format!(
            "receiver exceeds {} characters",
            state.ingestion.max_receiver_len
        )));
    }
    if request.location.chars().count() > state.ingestion.max_location_len {
        return Err(AppError::Validation(format!(
            "location exceeds {} characters",
            state.ingestion.max_location_len
        )));
    }

    let alert = Arc::new(Alert::new(
        request.image_ref,
        request.receiver.trim(),
        request.location,
        request.user_id,
    ));

    state.store.save_alert(&alert).await?;
    ALERTS_INGESTED_TOTAL.inc();

    let dispatch = state.dispatcher.submit(alert.clone());

    tracing::info!(
        alert_id = %alert.id,
        user_id = %alert.user_id,
        dispatch = ?dispatch,
        "Alert ingested"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmitAlertResponse {
            alert: alert.as_ref().clone(),
            dispatch,
        }),
    ))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAlertRequest {
    #[validate(length(min = 1, max = 2048))]
    pub image_ref: String,
    #[validate(length(min = 1))]
    pub receiver: String,
    #[serde(default)]
    pub location: String,
    #[validate(length(min = 1, max = 128))]
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitAlertResponse {
    pub alert: Alert,
    pub dispatch: SubmitAck,
}

/// Get an alert by ID
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>> {
    let alert = state
        .store
        .get_alert(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))?;

    Ok(Json(alert))
}

/// List alerts
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<ListAlertsQuery>,
) -> Result<Json<ListAlertsResponse>> {
    if let (Some(since), Some(until)) = (params.since, params.until) {
        if since > until {
            return Err(AppError::Validation(
                "since must not be later than until".to_string(),
            ));
        }
    }

    let filter = AlertFilter {
        user_id: params.user_id,
        receiver: params.receiver,
        location: params.location,
        since: params.since,
        until: params.until,
    };

    let page = params.page.unwrap_or(0);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let alerts = state.store.list_alerts(&filter, page, page_size).await?;
    let total = state.store.count_alerts(&filter).await?;

    Ok(Json(ListAlertsResponse {
        alerts,
        total,
        page,
        page_size,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListAlertsQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub user_id: Option<String>,
    pub receiver: Option<String>,
    pub location: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAlertsResponse {
    pub alerts: Vec<Alert>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Dispatcher counters
pub async fn notification_status(State(state): State<AppState>) -> Json<DispatchStatus> {
    Json(state.dispatcher.status())
}

/// Recent terminal dispatch outcomes, newest first
pub async fn recent_outcomes(
    State(state): State<AppState>,
    Query(params): Query<RecentOutcomesQuery>,
) -> Json<Vec<DispatchReport>> {
    let mut reports = state.dispatcher.recent_outcomes();
    reports.reverse();
    if let Some(limit) = params.limit {
        reports.truncate(limit);
    }
    Json(reports)
}

#[derive(Debug, Deserialize)]
pub struct RecentOutcomesQuery {
    pub limit: Option<usize>,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
