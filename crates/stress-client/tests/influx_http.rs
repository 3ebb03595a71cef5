//! HTTP transport tests against a local stand-in InfluxDB server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use stress_client::{Client, InfluxClient, InfluxConfig, InfluxV2Config, SUCCESS_STATUS};
use tokio::net::TcpListener;

#[derive(Debug, Clone, Default)]
struct Recorded {
    writes: Vec<(HashMap<String, String>, Option<String>, Option<String>, Vec<u8>)>,
    queries: Vec<String>,
    created_buckets: Vec<serde_json::Value>,
    deleted_buckets: Vec<String>,
}

#[derive(Clone)]
struct ServerState {
    healthy: bool,
    recorded: Arc<Mutex<Recorded>>,
}

async fn health(State(state): State<ServerState>) -> Response {
    if state.healthy {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting").into_response()
    }
}

async fn write(
    State(state): State<ServerState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let rejected = body.windows(3).any(|w| w == b"bad");
    state.recorded.lock().unwrap().writes.push((
        params,
        header("content-encoding"),
        header("authorization"),
        body.to_vec(),
    ));
    if rejected {
        (StatusCode::BAD_REQUEST, r#"{"error":"unable to parse"}"#).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn query(State(state): State<ServerState>, Form(form): Form<HashMap<String, String>>) -> Response {
    let q = form.get("q").cloned().unwrap_or_default();
    state.recorded.lock().unwrap().queries.push(q);
    (StatusCode::OK, r#"{"results":[]}"#).into_response()
}

async fn create_bucket(State(state): State<ServerState>, Json(payload): Json<serde_json::Value>) -> Response {
    let exists = payload["name"] == "existing";
    state.recorded.lock().unwrap().created_buckets.push(payload);
    if exists {
        (StatusCode::UNPROCESSABLE_ENTITY, r#"{"code":"conflict"}"#).into_response()
    } else {
        StatusCode::CREATED.into_response()
    }
}

async fn list_buckets(Query(params): Query<HashMap<String, String>>) -> Response {
    let name = params.get("name").cloned().unwrap_or_default();
    Json(serde_json::json!({
        "buckets": [
            { "id": "other-id", "name": "other" },
            { "id": format!("{name}-id"), "name": name },
        ]
    }))
    .into_response()
}

async fn delete_bucket(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    state.recorded.lock().unwrap().deleted_buckets.push(id);
    StatusCode::NO_CONTENT.into_response()
}

async fn start_test_server(healthy: bool) -> (String, Arc<Mutex<Recorded>>) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let state = ServerState {
        healthy,
        recorded: recorded.clone(),
    };
    let app = Router::new()
        .route("/health", get(health))
        .route("/write", post(write))
        .route("/api/v2/write", post(write))
        .route("/query", post(query))
        .route("/api/v2/buckets", post(create_bucket).get(list_buckets))
        .route("/api/v2/buckets/:id", delete(delete_bucket))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), recorded)
}

fn v1_config(url: &str) -> InfluxConfig {
    InfluxConfig {
        name: "local".into(),
        url: url.to_string(),
        db: "stress".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_connect_requires_healthy_server() {
    let (url, _) = start_test_server(false).await;
    let err = InfluxClient::connect(&v1_config(&url)).await.unwrap_err();
    assert!(err.to_string().contains("503"), "unexpected error: {err}");
}

#[tokio::test]
async fn test_v1_send_success_and_rejection() {
    let (url, recorded) = start_test_server(true).await;
    let client = InfluxClient::connect(&v1_config(&url)).await.unwrap();

    let ok = client.send(b"cpu v=1i 1\n").await;
    assert_eq!(ok.status, SUCCESS_STATUS);
    assert!(ok.error.is_none());
    assert!(ok.body.is_none());
    assert!(ok.latency_ns > 0);

    let rejected = client.send(b"bad line\n").await;
    assert_eq!(rejected.status, 400);
    assert!(rejected.error.is_some());
    assert_eq!(rejected.body.as_deref(), Some(r#"{"error":"unable to parse"}"#));

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.writes.len(), 2);
    let (params, encoding, auth, body) = &recorded.writes[0];
    assert_eq!(params.get("db").map(String::as_str), Some("stress"));
    assert!(encoding.is_none());
    assert!(auth.is_none());
    assert_eq!(body, b"cpu v=1i 1\n");
}

#[tokio::test]
async fn test_v1_gzip_header() {
    let (url, recorded) = start_test_server(true).await;
    let cfg = InfluxConfig {
        gzip: 6,
        ..v1_config(&url)
    };
    let client = InfluxClient::connect(&cfg).await.unwrap();
    assert_eq!(client.gzip_level(), 6);

    client.send(b"\x1f\x8b").await;
    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.writes[0].1.as_deref(), Some("gzip"));
}

#[tokio::test]
async fn test_v1_create_and_reset() {
    let (url, recorded) = start_test_server(true).await;
    let client = InfluxClient::connect(&v1_config(&url)).await.unwrap();

    client.create("").await.unwrap();
    client
        .create("CREATE DATABASE custom WITH DURATION 1d")
        .await
        .unwrap();
    client.reset().await.unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(
        recorded.queries,
        vec![
            "CREATE DATABASE stress".to_string(),
            "CREATE DATABASE custom WITH DURATION 1d".to_string(),
            "DROP DATABASE stress".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_v2_token_buckets_and_reset() {
    let (url, recorded) = start_test_server(true).await;
    let cfg = InfluxConfig {
        api_version: 2,
        v2: InfluxV2Config {
            org_id: "org1".into(),
            bucket: "stress".into(),
            token: "secret".into(),
        },
        ..v1_config(&url)
    };
    let client = InfluxClient::connect(&cfg).await.unwrap();

    client.create("").await.unwrap();
    let outcome = client.send(b"cpu v=1i 1\n").await;
    assert!(outcome.is_success());
    client.reset().await.unwrap();

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.created_buckets[0]["orgID"], "org1");
    assert_eq!(recorded.created_buckets[0]["name"], "stress");
    let (params, _, auth, _) = &recorded.writes[0];
    assert_eq!(params.get("org").map(String::as_str), Some("org1"));
    assert_eq!(params.get("bucket").map(String::as_str), Some("stress"));
    assert_eq!(auth.as_deref(), Some("Token secret"));
    assert_eq!(recorded.deleted_buckets, vec!["stress-id".to_string()]);
}

#[tokio::test]
async fn test_v2_existing_bucket_is_not_an_error() {
    let (url, _) = start_test_server(true).await;
    let cfg = InfluxConfig {
        api_version: 2,
        v2: InfluxV2Config {
            org_id: "org1".into(),
            bucket: "existing".into(),
            token: String::new(),
        },
        ..v1_config(&url)
    };
    let client = InfluxClient::connect(&cfg).await.unwrap();
    client.create("").await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_reports_status_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = InfluxClient::new(&v1_config(&format!("http://{addr}"))).unwrap();
    let outcome = client.send(b"cpu v=1i 1\n").await;
    assert_eq!(outcome.status, 0);
    assert!(outcome.error.is_some());
}
