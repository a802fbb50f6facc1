//! API Routes

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use crate::alert_dedup::AlertKind;
use crate::error::{Error, Result};
use crate::models::{CategoryResponse, ResetAlertRequest, ResetAlertResponse};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(super::home))
        .route("/healthz", get(super::health_check))
        // Category
        .route("/get_category", get(get_category))
        .route("/set_category", post(set_category))
        // Sensor data
        .route("/data", post(forward_data))
        // Alerts
        .route("/reset_alert", post(reset_alert))
        .with_state(state)
}

/// Parse a JSON body regardless of the declared content type
fn parse_json_body(body: &Bytes) -> Result<Value> {
    serde_json::from_slice(body)
        .map_err(|_| Error::Validation("Invalid or missing JSON".to_string()))
}

// ========================================
// Category Handlers
// ========================================

async fn get_category(State(state): State<AppState>) -> Result<Json<CategoryResponse>> {
    let category = state.router.get_category().await?;
    Ok(Json(category.into()))
}

async fn set_category(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CategoryResponse>> {
    let value = parse_json_body(&body)?;
    let raw = value
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let outcome = state.router.set_category(raw).await?;
    if !outcome.persisted {
        tracing::warn!(category = %outcome.category, "Category active in memory only");
    }

    Ok(Json(outcome.category.into()))
}

// ========================================
// Forwarding Handler
// ========================================

async fn forward_data(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let payload = match parse_json_body(&body)? {
        Value::Object(map) => map,
        _ => return Err(Error::Validation("Invalid or missing JSON".to_string())),
    };

    let outcome = state.router.forward(payload).await?;
    let status = StatusCode::from_u16(outcome.status).map_err(|_| {
        Error::Internal(format!("Model returned invalid status {}", outcome.status))
    })?;

    Ok((status, Json(outcome.body)).into_response())
}

// ========================================
// Alert Handlers
// ========================================

async fn reset_alert(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ResetAlertResponse>> {
    let req: ResetAlertRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResetAlertRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|_| Error::Validation("Invalid or missing JSON".to_string()))?
    };

    let kind = match req.kind.as_deref() {
        Some(raw) => raw.parse::<AlertKind>()?,
        None => AlertKind::Spoiled,
    };

    let (category, alert_state) = state
        .router
        .reset_alert(req.category.as_deref(), kind)
        .await?;

    Ok(Json(ResetAlertResponse {
        category: category.into(),
        kind,
        state: alert_state,
    }))
}
