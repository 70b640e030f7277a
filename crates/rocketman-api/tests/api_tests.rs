//! Integration tests for the rocket API.
//!
//! Requests go through the full router via `tower::ServiceExt` against an
//! in-process store and bus, so no network or broker is needed.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use jsonwebtoken::{EncodingKey, Header, encode};
use rocketman_api::{AppState, build_router};
use rocketman_core::config::RocketConfig;
use rocketman_db::MemoryStore;
use rocketman_engine::{EngineContext, MemoryBus};
use rocketman_types::{EventKind, RocketId};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    store: MemoryStore,
    bus: MemoryBus,
}

fn app() -> TestApp {
    let mut config = RocketConfig::default();
    config.infrastructure.user_secret = SECRET.to_owned();
    let store = MemoryStore::new();
    let bus = MemoryBus::new();
    let ctx = Arc::new(EngineContext::new(config, store.clone().into(), bus.clone().into()));
    TestApp {
        router: build_router(Arc::new(AppState::new(ctx))),
        store,
        bus,
    }
}

fn token_for(user: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "sub": user }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn create(&self, user: &str, num_engines: u32, height: f64) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/rockets",
                Some(user),
                Some(json!({ "num_engines": num_engines, "height": height })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

#[tokio::test]
async fn root_reports_service_and_version() {
    let app = app();
    let (status, body) = app.send(Method::GET, "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["Service"], "Rocket Manager");
    assert_eq!(body["Version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn status_tracks_store_reachability() {
    let app = app();
    let (status, body) = app.send(Method::GET, "/status", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["store"]["reachable"], true);

    app.store.set_unavailable(true);
    let (status, body) = app.send(Method::GET, "/status", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
    assert_eq!(body["store"]["reachable"], false);
    assert_eq!(body["bus"]["reachable"], true);
}

#[tokio::test]
async fn rocket_routes_require_a_valid_token() {
    let app = app();
    let (status, body) = app.send(Method::GET, "/rockets", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let forged = encode(
        &Header::default(),
        &json!({ "sub": "alice" }),
        &EncodingKey::from_secret(b"wrong"),
    )
    .unwrap();
    let request = Request::builder()
        .uri("/rockets")
        .header(header::AUTHORIZATION, format!("Bearer {forged}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn create_get_list_delete_flow() {
    let app = app();
    let created = app.create("alice", 2, 100.0).await;
    let id = created["id"].as_str().unwrap().to_owned();
    assert_eq!(created["owner"], "alice");
    assert_eq!(created["launched"], false);
    assert_eq!(created["crashed"], false);
    assert_eq!(created["altitude"], 0.0);
    assert!(created["fuel"].as_f64().unwrap() > 0.0);

    let (status, fetched) = app.send(Method::GET, &format!("/rockets/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    app.create("alice", 1, 60.0).await;
    let (status, listed) = app.send(Method::GET, "/rockets", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (status, deleted) = app.send(Method::DELETE, &format!("/rockets/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["id"], id.as_str());

    let (status, body) = app.send(Method::GET, &format!("/rockets/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);

    let created_events = app
        .bus
        .published()
        .into_iter()
        .filter(|(topic, _)| topic.kind == EventKind::Created)
        .count();
    assert_eq!(created_events, 2);
}

#[tokio::test]
async fn rockets_are_private_to_their_owner() {
    let app = app();
    let created = app.create("alice", 2, 100.0).await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = app.send(Method::GET, &format!("/rockets/{id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::PUT, &format!("/rockets/{id}/launch"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, listed) = app.send(Method::GET, "/rockets", Some("bob"), None).await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn ids_cannot_reach_across_owners() {
    let app = app();
    let created = app.create("a:b", 2, 100.0).await;
    let id = created["id"].as_str().unwrap();

    let shifted = format!("/rockets/b:{id}");
    let (status, _) = app.send(Method::GET, &shifted, Some("a"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(Method::DELETE, &shifted, Some("a"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .send(Method::PUT, &format!("{shifted}/launch"), Some("a"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, owned) = app.send(Method::GET, &format!("/rockets/{id}"), Some("a:b"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owned["launched"], false);
}

#[tokio::test]
async fn out_of_bounds_geometry_is_unprocessable() {
    let app = app();
    for params in [
        json!({ "num_engines": 0, "height": 100.0 }),
        json!({ "num_engines": 9, "height": 100.0 }),
        json!({ "num_engines": 2, "height": 10.0 }),
        json!({ "num_engines": 2, "height": 601.0 }),
    ] {
        let (status, body) = app.send(Method::POST, "/rockets", Some("alice"), Some(params)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], 422);
    }
    assert_eq!(app.store.list_by_owner("alice").await.unwrap().len(), 0);
}

#[tokio::test]
async fn edit_before_launch_then_conflicts_after() {
    let app = app();
    let created = app.create("alice", 1, 60.0).await;
    let id = created["id"].as_str().unwrap();

    let (status, edited) = app
        .send(
            Method::PUT,
            &format!("/rockets/{id}"),
            Some("alice"),
            Some(json!({ "num_engines": 4, "height": 200.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["num_engines"], 4);
    assert!(edited["fuel"].as_f64().unwrap() > created["fuel"].as_f64().unwrap());

    let (status, launched) = app.send(Method::PUT, &format!("/rockets/{id}/launch"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(launched["launched"], true);

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/rockets/{id}"),
            Some("alice"),
            Some(json!({ "num_engines": 2, "height": 100.0 })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (status, _) = app.send(Method::PUT, &format!("/rockets/{id}/launch"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let launches = app
        .bus
        .published()
        .into_iter()
        .filter(|(topic, _)| topic.kind == EventKind::Launched && topic.rocket_id == RocketId::new(id))
        .count();
    assert_eq!(launches, 1);
}

#[tokio::test]
async fn abort_requires_a_flight_in_progress() {
    let app = app();
    let created = app.create("alice", 1, 60.0).await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = app.send(Method::PUT, &format!("/rockets/{id}/abort"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.send(Method::PUT, &format!("/rockets/{id}/launch"), Some("alice"), None).await;
    let (status, _) = app.send(Method::PUT, &format!("/rockets/{id}/abort"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);

    let crash = app
        .bus
        .published()
        .into_iter()
        .find(|(topic, _)| topic.kind == EventKind::Crashed)
        .unwrap();
    assert_eq!(crash.1.status.as_deref(), Some("Flight terminated"));
}

#[tokio::test]
async fn websocket_requires_a_token() {
    let app = app();
    let (status, _) = app.send(Method::GET, "/ws/rockets/amber-falcon", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn store_outage_is_a_server_error() {
    let app = app();
    app.store.set_unavailable(true);
    let (status, body) = app.send(Method::GET, "/rockets", Some("alice"), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 500);
}
