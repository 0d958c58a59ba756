use super::AppState;
use crate::ingest::{IngestOutcome, Origin, StatsSnapshot};
use crate::telemetry::{RawPayload, Reading};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::error;

/// GET /
pub async fn banner() -> &'static str {
    "datacompass is running"
}

/// GET /health - Liveness only; does not touch the store or the broker.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// GET /raw - Raw payload buffer, most recent first.
pub async fn raw_snapshot(State(state): State<AppState>) -> Json<Vec<RawPayload>> {
    Json(state.coordinator.buffer().snapshot().await)
}

/// GET /raw/filtered - Latest stored readings, newest timestamp first.
pub async fn recent_readings(State(state): State<AppState>) -> Response {
    match state.coordinator.store().recent(state.recent_limit).await {
        Ok(readings) => Json::<Vec<Reading>>(readings).into_response(),
        Err(e) => {
            error!(error = %e, "failed to fetch recent readings");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch filtered data",
            )
                .into_response()
        }
    }
}

/// POST /mqtt/raw - Same pipeline as a broker message.
///
/// 200 once the reading is stored, 400 when the payload does not decode, 500
/// when the store refuses it. The broadcast is never awaited.
pub async fn ingest_raw(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match state
        .coordinator
        .process(RawPayload::new(body), Origin::Http)
        .await
    {
        IngestOutcome::Persisted(_) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Data saved successfully" })),
        )
            .into_response(),
        IngestOutcome::Rejected(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": e.to_string() })),
        )
            .into_response(),
        IngestOutcome::PersistFailed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "error": "Failed to save filtered data" })),
        )
            .into_response(),
    }
}

/// GET /stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.coordinator.stats())
}

#[cfg(test)]
mod tests {
    use super::super::{router, AppState};
    use crate::broadcast::LogBroadcaster;
    use crate::ingest::IngestCoordinator;
    use crate::persistence::{
        InMemoryReadingStore, MockReadingStore, ReadingStore, StoreError,
    };
    use crate::telemetry::{RawPayload, RawRingBuffer, Reading};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const VALID_DATA: &str = r#"{"T":24.1,"RH":51,"GM":3,"CO2":415,"Vol":4,"Tm":27}"#;

    fn app_with_store(store: Arc<dyn ReadingStore>) -> (Router, Arc<IngestCoordinator>) {
        let coordinator = Arc::new(IngestCoordinator::new(
            Arc::new(RawRingBuffer::default()),
            store,
            Arc::new(LogBroadcaster),
        ));
        let state = AppState {
            coordinator: Arc::clone(&coordinator),
            recent_limit: 15,
        };
        (router(state), coordinator)
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

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn reading_at(secs: i64, temperature: f64) -> Reading {
        Reading {
            temperature,
            humidity: 50.0,
            gm: 1.0,
            co2: 400.0,
            vol: 3.0,
            tm: 20.0,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_banner_and_health() {
        let (app, _) = app_with_store(Arc::new(InMemoryReadingStore::new()));

        let response = app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"datacompass is running");

        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn test_ingest_valid_payload_returns_ok() {
        let store = Arc::new(InMemoryReadingStore::new());
        let (app, coordinator) = app_with_store(store.clone());

        let response = app
            .oneshot(post_json(
                "/mqtt/raw",
                json!({ "data": VALID_DATA, "radio": r#"{"time":1700000000.25}"# }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "success": true, "message": "Data saved successfully" })
        );
        coordinator.drain().await;

        let stored = store.recent(1).await.unwrap();
        assert_eq!(stored[0].temperature, 24.1);
        assert_eq!(stored[0].timestamp.timestamp_millis(), 1_700_000_000_250);
    }

    #[tokio::test]
    async fn test_ingest_invalid_payload_returns_bad_request() {
        let store = Arc::new(InMemoryReadingStore::new());
        let (app, coordinator) = app_with_store(store.clone());

        let response = app
            .oneshot(post_json(
                "/mqtt/raw",
                json!({ "data": VALID_DATA, "radio": "not json" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].as_str().unwrap().contains("radio"));
        assert!(store.is_empty().await);
        assert_eq!(coordinator.buffer().len().await, 1);
    }

    #[tokio::test]
    async fn test_ingest_store_failure_returns_server_error() {
        let mut store = MockReadingStore::new();
        store
            .expect_append()
            .times(1)
            .returning(|_| Err(StoreError::Query("disk full".into())));
        let (app, _) = app_with_store(Arc::new(store));

        let response = app
            .oneshot(post_json(
                "/mqtt/raw",
                json!({ "data": VALID_DATA, "radio": r#"{"time":1700000000}"# }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            json!({ "success": false, "error": "Failed to save filtered data" })
        );
    }

    #[tokio::test]
    async fn test_ingest_non_json_body_never_reaches_pipeline() {
        let (app, coordinator) = app_with_store(Arc::new(InMemoryReadingStore::new()));

        let request = Request::builder()
            .method("POST")
            .uri("/mqtt/raw")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
        assert!(coordinator.buffer().is_empty().await);
        assert_eq!(coordinator.stats().received, 0);
    }

    #[tokio::test]
    async fn test_raw_returns_most_recent_first() {
        let (app, coordinator) = app_with_store(Arc::new(InMemoryReadingStore::new()));
        for n in 0..3 {
            coordinator
                .buffer()
                .push(RawPayload::new(json!({ "seq": n })))
                .await;
        }

        let response = app.oneshot(get("/raw")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{ "seq": 2 }, { "seq": 1 }, { "seq": 0 }])
        );
    }

    #[tokio::test]
    async fn test_filtered_returns_recent_readings_by_timestamp() {
        let store = Arc::new(InMemoryReadingStore::new());
        for (secs, temperature) in [(200, 2.0), (100, 1.0), (300, 3.0)] {
            store.append(&reading_at(secs, temperature)).await.unwrap();
        }
        let (app, _) = app_with_store(store);

        let response = app.oneshot(get("/raw/filtered")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let temperatures: Vec<f64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["temperature"].as_f64().unwrap())
            .collect();
        assert_eq!(temperatures, vec![3.0, 2.0, 1.0]);
        assert_eq!(body[0]["timestamp"], json!("1970-01-01T00:05:00.000Z"));
    }

    #[tokio::test]
    async fn test_filtered_asks_store_for_configured_limit() {
        let mut store = MockReadingStore::new();
        store
            .expect_recent()
            .withf(|limit: &usize| *limit == 15)
            .times(1)
            .returning(|_| Ok(vec![]));
        let (app, _) = app_with_store(Arc::new(store));

        let response = app.oneshot(get("/raw/filtered")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn test_filtered_store_failure_returns_server_error() {
        let mut store = MockReadingStore::new();
        store
            .expect_recent()
            .returning(|_| Err(StoreError::Pool("connection refused".into())));
        let (app, _) = app_with_store(Arc::new(store));

        let response = app.oneshot(get("/raw/filtered")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"Failed to fetch filtered data");
    }

    #[tokio::test]
    async fn test_stats_reflect_processed_payloads() {
        let (app, coordinator) = app_with_store(Arc::new(InMemoryReadingStore::new()));

        let _ = app
            .clone()
            .oneshot(post_json(
                "/mqtt/raw",
                json!({ "data": VALID_DATA, "radio": r#"{"time":1700000000}"# }),
            ))
            .await
            .unwrap();
        let _ = app
            .clone()
            .oneshot(post_json("/mqtt/raw", json!({ "radio": "{}" })))
            .await
            .unwrap();
        coordinator.drain().await;

        let response = app.oneshot(get("/stats")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["received"], json!(2));
        assert_eq!(body["rejected"], json!(1));
        assert_eq!(body["persisted"], json!(1));
        assert_eq!(body["broadcast"], json!(1));
    }
}
