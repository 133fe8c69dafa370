//! REST handlers and the router that ties them together.

use std::path::Path;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use climate_core::{RawValue, ReadingInput};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::error::{ApiError, ApiResult};
use crate::export::{self, JsonExport};
use crate::state::AppState;
use crate::ws;

/// Builds the application router. Without `public_dir` unmatched paths answer 404.
pub fn router(state: AppState, public_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/data", post(ingest))
        .route("/api/current", get(current))
        .route("/api/history", get(history))
        .route("/api/stats", get(stats))
        .route("/api/clear", post(clear))
        .route("/api/export/csv", get(export_csv))
        .route("/api/export/json", get(export_json))
        .route("/api/devices", get(devices))
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health))
        .with_state(state);

    let app = match public_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let input = parse_input(&headers, &body)?;
    let measurement = input.validate()?;
    let snapshot = state
        .run(move |monitor| Ok(monitor.ingest(measurement)?))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Data received successfully",
        "data": snapshot,
    })))
}

/// Decodes the ingestion body. Form posts come from the sensor firmware, everything
/// else is treated as JSON. An empty body fails validation, not decoding.
fn parse_input(headers: &HeaderMap, body: &[u8]) -> ApiResult<ReadingInput> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        let mut input = ReadingInput::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "temperature" => &mut input.temperature,
                "humidity" => &mut input.humidity,
                "heatIndex" | "heat_index" => &mut input.heat_index,
                _ => continue,
            };
            *slot = Some(RawValue::Text(value));
        }
        return Ok(input);
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReadingInput::default());
    }
    serde_json::from_slice(body).map_err(|err| ApiError::BadRequest(err.to_string()))
}

async fn current(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let snapshot = state
        .run(|monitor| Ok(monitor.backend().current_snapshot()?))
        .await?;
    Ok(Json(json!({
        "success": true,
        "data": snapshot.current,
        "stats": snapshot.stats,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

impl HistoryQuery {
    /// Unparseable or zero limits fall back to the backend default.
    fn limit(&self) -> Option<usize> {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
    }
}

async fn history(
    State(state): State<AppState>,
    query: Option<Query<HistoryQuery>>,
) -> ApiResult<Json<Value>> {
    // A query string that does not decode at all is treated like a missing limit.
    let limit = query.and_then(|Query(query)| query.limit());
    let data = state
        .run(move |monitor| Ok(monitor.backend().history(limit)?))
        .await?;
    Ok(Json(json!({
        "success": true,
        "count": data.len(),
        "data": data,
    })))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.run(|monitor| Ok(monitor.backend().stats()?)).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

async fn clear(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state.run(|monitor| Ok(monitor.clear()?)).await?;
    Ok(Json(json!({ "success": true, "message": "Data cleared" })))
}

/// Backends clamp the limit to what they retain.
const EXPORT_ALL: usize = usize::MAX;

async fn export_csv(State(state): State<AppState>) -> ApiResult<Response> {
    let data = state
        .run(|monitor| Ok(monitor.backend().history(Some(EXPORT_ALL))?))
        .await?;

    let disposition = format!("attachment; filename={}", export::CSV_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export::to_csv(&data),
    )
        .into_response())
}

async fn export_json(State(state): State<AppState>) -> ApiResult<Response> {
    let (stats, data) = state
        .run(|monitor| {
            let backend = monitor.backend();
            let stats = backend.stats()?;
            let data = backend.history(Some(EXPORT_ALL))?;
            Ok((stats, data))
        })
        .await?;

    let now = chrono::Utc::now().timestamp_millis();
    let body = serde_json::to_string_pretty(&JsonExport::new(now, &stats, &data))
        .map_err(|err| ApiError::internal(err.to_string()))?;
    let disposition = format!("attachment; filename={}", export::JSON_FILENAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn devices(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let devices = state
        .run(|monitor| Ok(monitor.backend().latest_per_device()?))
        .await?;
    Ok(Json(json!({ "success": true, "data": devices })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let monitor = state.monitor();
    Json(json!({
        "status": "ok",
        "backend": monitor.backend().name(),
        "device": monitor.backend().device_id(),
        "subscribers": monitor.distributor().len(),
    }))
}
