//! REST and internal endpoints through the full router

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use xfhub::backend::middleware::INTERNAL_TOKEN_HEADER;
use xfhub::backend::server::create_app_with_stores;
use xfhub::backend::store::{MemoryStore, Stores};

use crate::common::{auth_header, test_config, token_for, TEST_INTERNAL_TOKEN};

fn app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let app = create_app_with_stores(&test_config(), Stores::from_backend(store.clone()));
    (app, store)
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

fn as_user(builder: axum::http::request::Builder, user: Uuid) -> axum::http::request::Builder {
    builder.header("authorization", auth_header(&token_for(user, "api-user")))
}

fn from_address(mut request: Request<Body>, address: &str) -> Request<Body> {
    let addr: SocketAddr = address.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app();
    let (status, body) = send(&app, request(Method::GET, "/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["online_users"], 0);
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = app();
    let response = app
        .oneshot(request(Method::GET, "/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bearer_token_required() {
    let (app, _) = app();

    let (status, body) = send(&app, request(Method::GET, "/api/unread").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "auth_error");
    assert_eq!(body["retryable"], false);

    let forged = request(Method::GET, "/api/unread")
        .header("authorization", "Bearer forged")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unread_counts() {
    let (app, store) = app();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    store.add_participant("3", alice).await;
    store.add_participant("3", bob).await;
    store.add_message("3", Some(bob)).await;

    let (status, body) = send(
        &app,
        as_user(request(Method::GET, "/api/unread"), alice).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({"messages": 1, "notifications": 0, "pending_requests": 0})
    );
}

#[tokio::test]
async fn test_friend_request_flow() {
    let (app, _) = app();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = send(
        &app,
        as_user(request(Method::POST, &format!("/api/friends/{}/request", bob)), alice)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "created");
    assert_eq!(body["state"], "outgoing");

    let (_, body) = send(
        &app,
        as_user(request(Method::GET, &format!("/api/friends/{}", alice)), bob)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body["state"], "incoming");

    let (status, body) = send(
        &app,
        as_user(request(Method::POST, &format!("/api/friends/{}/accept", alice)), bob)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "friends");

    let (_, body) = send(
        &app,
        as_user(request(Method::GET, "/api/friends"), alice).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(body["friends"], serde_json::json!([bob]));

    let (status, body) = send(
        &app,
        as_user(request(Method::DELETE, &format!("/api/friends/{}", bob)), alice)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], true);
}

#[tokio::test]
async fn test_accept_without_request_is_not_found() {
    let (app, _) = app();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let (status, body) = send(
        &app,
        as_user(request(Method::POST, &format!("/api/friends/{}/accept", alice)), bob)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "no_such_request");

    let (status, body) = send(
        &app,
        as_user(request(Method::POST, &format!("/api/friends/{}/request", bob)), bob)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "self_request");
}

#[tokio::test]
async fn test_live_viewers_by_account_and_address() {
    let (app, store) = app();
    store.start_session("live-7").await;
    let join = |address: &str| {
        from_address(
            request(Method::POST, "/api/live/live-7/join").body(Body::empty()).unwrap(),
            address,
        )
    };

    // Same address from a new port is the same anonymous viewer
    let (_, body) = send(&app, join("203.0.113.5:40000")).await;
    assert_eq!(body["viewers"], 1);
    let (_, body) = send(&app, join("203.0.113.5:40001")).await;
    assert_eq!(body["viewers"], 1);
    let (_, body) = send(&app, join("203.0.113.6:40000")).await;
    assert_eq!(body["viewers"], 2);

    let user = Uuid::new_v4();
    let signed_in = from_address(
        as_user(request(Method::POST, "/api/live/live-7/join"), user)
            .body(Body::empty())
            .unwrap(),
        "203.0.113.5:40002",
    );
    let (_, body) = send(&app, signed_in).await;
    assert_eq!(body["viewers"], 3);

    let leave = from_address(
        request(Method::POST, "/api/live/live-7/leave").body(Body::empty()).unwrap(),
        "203.0.113.6:40000",
    );
    let (status, body) = send(&app, leave).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["viewers"], 2);

    assert_eq!(store.session_snapshot("live-7").await.unwrap().peak_viewers, 3);
}

#[tokio::test]
async fn test_live_join_on_ended_session() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        request(Method::POST, "/api/live/gone/join").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "session_not_active");
}

#[tokio::test]
async fn test_internal_routes_require_token() {
    let (app, _) = app();

    let (status, body) = send(
        &app,
        request(Method::POST, "/internal/rooms/conversation:1/messages")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"hi"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = send(
        &app,
        request(Method::POST, "/internal/rooms/conversation:1/messages")
            .header(INTERNAL_TOKEN_HEADER, TEST_INTERNAL_TOKEN)
            .header("content-type", "application/json")
            .body(Body::from(r#"{"text":"hi"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], 0);
}

#[tokio::test]
async fn test_internal_notification_and_session_end() {
    let (app, store) = app();
    store.start_session("live-8").await;
    let user = Uuid::new_v4();

    let body = serde_json::json!({
        "kind": "system",
        "actor": Uuid::new_v4(),
        "body": {"text": "hello"}
    });
    let (status, reply) = send(
        &app,
        request(Method::POST, &format!("/internal/users/{}/notifications", user))
            .header(INTERNAL_TOKEN_HEADER, TEST_INTERNAL_TOKEN)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["delivered"], 0);

    let join = from_address(
        request(Method::POST, "/api/live/live-8/join").body(Body::empty()).unwrap(),
        "192.0.2.1:5000",
    );
    send(&app, join).await;

    let (status, reply) = send(
        &app,
        request(Method::DELETE, "/internal/live/live-8")
            .header(INTERNAL_TOKEN_HEADER, TEST_INTERNAL_TOKEN)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["discarded"], 1);
}
