use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use emberwatch_bot::{config::Config, create_app, helpers};
use emberwatch_db::{Database, NewTrackedStatus};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
// for `oneshot` method

/// Helper to create test database with in-memory SQLite
async fn setup_test_db() -> Database {
    Database::open_in_memory()
        .await
        .expect("Failed to create in-memory database")
}

/// Helper to create app with default test configuration
fn create_test_app(db: Database) -> axum::Router {
    let config = Config::default();
    create_app(db, config.request_timeout)
}

/// Helper to send a request and get response
async fn send_request(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(uri)
        .method(method)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    // Try to parse as JSON, or return empty object
    let body = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, body)
}

fn new_status(server_id: &str) -> NewTrackedStatus {
    NewTrackedStatus {
        server_id: server_id.to_string(),
        server_name: "Survival SMP".to_string(),
        server_version: "1.20.4".to_string(),
        java_address: Some("play.example.com".to_string()),
        bedrock_address: None,
        show_max_players: false,
        channel_id: 222_333_444_555_666_777,
        message_id: None,
    }
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let db = setup_test_db().await;
    let app = create_test_app(db);

    let (status, _body) = send_request(app, "GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoint_with_post_method() {
    let db = setup_test_db().await;
    let app = create_test_app(db);

    let (status, _body) = send_request(app, "POST", "/health").await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// STATUSES ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_statuses_empty() {
    let db = setup_test_db().await;
    let app = create_test_app(db);

    let (status, body) = send_request(app, "GET", "/statuses").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_statuses_lists_tracked_rows() {
    let db = setup_test_db().await;
    let now = helpers::now();

    let created = db
        .create_tracked(new_status("panel-uuid-1"), now)
        .await
        .expect("Failed to create tracked status");
    db.bind_message(created.id, 999_888_777_666_555_444)
        .await
        .expect("Failed to bind message");

    let app = create_test_app(db);
    let (status, body) = send_request(app, "GET", "/statuses").await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().expect("expected a JSON array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["server_id"], "panel-uuid-1");
    assert_eq!(rows[0]["server_name"], "Survival SMP");
    // Snowflakes must come back as strings, not numbers
    assert_eq!(rows[0]["channel_id"], "222333444555666777");
    assert_eq!(rows[0]["message_id"], "999888777666555444");
}

#[tokio::test]
async fn test_statuses_unbound_message_is_null() {
    let db = setup_test_db().await;
    let now = helpers::now();

    db.create_tracked(new_status("panel-uuid-2"), now)
        .await
        .expect("Failed to create tracked status");

    let app = create_test_app(db);
    let (status, body) = send_request(app, "GET", "/statuses").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["message_id"], Value::Null);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let db = setup_test_db().await;
    let app = create_test_app(db);

    let (status, _body) = send_request(app, "GET", "/nonexistent").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
