use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use climate_core::{ManualClock, MemoryBackend, ReadingBackend, StoreConfig};
use climate_live::Monitor;
use climate_redis::{RedisBackend, RedisOptions};
use climate_server::{router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app_with(backend: Arc<dyn ReadingBackend>) -> Router {
    let monitor = Arc::new(Monitor::new(backend));
    router(AppState::new(monitor, 8), None)
}

fn memory_app(capacity: usize) -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let backend = MemoryBackend::new(
        "esp32",
        StoreConfig::with_capacity(capacity),
        clock.clone(),
    )
    .unwrap();
    (app_with(Arc::new(backend)), clock)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn ingest_then_read_current() {
    let (app, _) = memory_app(100);

    let (status, body) = send_json(
        &app,
        post_json("/api/data", json!({"temperature": 24.5, "humidity": 40})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["current"]["status"], "active");
    assert_eq!(body["data"]["current"]["reading"]["heatIndex"], 24.5);
    assert_eq!(body["data"]["current"]["reading"]["sequenceId"], 1);

    let (status, body) = send_json(&app, get("/api/current")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reading"]["temperature"], 24.5);
    assert_eq!(body["stats"]["totalReadings"], 1);
    assert_eq!(body["stats"]["maxTemp"], 24.5);
}

#[tokio::test]
async fn missing_field_is_a_bad_request() {
    let (app, _) = memory_app(100);

    let (status, body) =
        send_json(&app, post_json("/api/data", json!({"temperature": 24.5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("humidity"));

    let (status, _) = send_json(&app, post_json("/api/data", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was recorded.
    let (_, body) = send_json(&app, get("/api/stats")).await;
    assert_eq!(body["stats"]["totalReadings"], 0);
    assert_eq!(body["stats"]["maxTemp"], -999.0);
}

#[tokio::test]
async fn form_encoded_readings_are_accepted() {
    let (app, _) = memory_app(100);
    let request = Request::builder()
        .method("POST")
        .uri("/api/data")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("temperature=19.5&humidity=61&heatIndex=19.1"))
        .unwrap();

    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["current"]["reading"]["humidity"], 61.0);
    assert_eq!(body["data"]["current"]["reading"]["heatIndex"], 19.1);
}

#[tokio::test]
async fn history_honours_limit_and_capacity() {
    let (app, clock) = memory_app(5);
    for i in 0..8 {
        clock.advance(std::time::Duration::from_secs(1));
        let (status, _) = send_json(
            &app,
            post_json("/api/data", json!({"temperature": 20 + i, "humidity": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send_json(&app, get("/api/history")).await;
    assert_eq!(body["count"], 5);
    let ids: Vec<u64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["sequenceId"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![4, 5, 6, 7, 8]);

    let (_, body) = send_json(&app, get("/api/history?limit=2")).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][1]["sequenceId"], 8);

    let (_, body) = send_json(&app, get("/api/history?limit=abc")).await;
    assert_eq!(body["count"], 5);

    let (status, body) = send_json(&app, get("/api/history?limit=1&limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 5);
}

#[tokio::test]
async fn current_while_waiting() {
    let (app, _) = memory_app(100);
    let (status, body) = send_json(&app, get("/api/current")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "waiting");
    assert_eq!(body["data"]["reading"], Value::Null);
    assert_eq!(body["stats"]["minTemp"], 999.0);
}

#[tokio::test]
async fn clear_keeps_current_reading() {
    let (app, _) = memory_app(100);
    send_json(
        &app,
        post_json("/api/data", json!({"temperature": 30, "humidity": 70})),
    )
    .await;

    let (status, body) = send_json(&app, post_json("/api/clear", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Data cleared");

    let (_, body) = send_json(&app, get("/api/current")).await;
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["reading"]["temperature"], 30.0);
    assert_eq!(body["stats"]["totalReadings"], 0);

    let (_, body) = send_json(&app, get("/api/history")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn csv_export() {
    let (app, _) = memory_app(100);
    send_json(
        &app,
        post_json("/api/data", json!({"temperature": 25, "humidity": 40})),
    )
    .await;

    let response = app.clone().oneshot(get("/api/export/csv")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(headers[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("airquality_data.csv"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Timestamp,Temperature (°C),Humidity (%),Heat Index (°C)");
    assert_eq!(lines[1], "1970-01-01T00:00:01.000Z,25,40,25");
    assert_eq!(lines.len(), 2);
}

#[tokio::test]
async fn json_export() {
    let (app, _) = memory_app(100);
    send_json(
        &app,
        post_json("/api/data", json!({"temperature": 20, "humidity": 40})),
    )
    .await;
    send_json(
        &app,
        post_json("/api/data", json!({"temperature": 30, "humidity": 60})),
    )
    .await;

    let response = app.clone().oneshot(get("/api/export/json")).await.unwrap();
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("airquality_data.json"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["exportDate"].as_str().unwrap().ends_with('Z'));
    assert_eq!(body["stats"]["avgTemp"], 25.0);
    assert_eq!(body["stats"]["avgHum"], 50.0);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn health_and_devices() {
    let (app, _) = memory_app(100);

    let (status, body) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
    assert_eq!(body["subscribers"], 0);

    let (_, body) = send_json(&app, get("/api/devices")).await;
    assert_eq!(body["data"][0]["deviceId"], "esp32");
    assert_eq!(body["data"][0]["current"]["status"], "waiting");
}

#[tokio::test]
async fn unconfigured_redis_answers_503() {
    let backend = RedisBackend::unconfigured(RedisOptions::default(), "no REDIS_URL");
    let app = app_with(Arc::new(backend));

    let (status, body) = send_json(&app, get("/api/current")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);

    let (status, _) = send_json(
        &app,
        post_json("/api/data", json!({"temperature": 20, "humidity": 40})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Validation runs before the backend is touched.
    let (status, _) = send_json(&app, post_json("/api/data", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (app, _) = memory_app(100);
    let (status, _) = send(&app, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
