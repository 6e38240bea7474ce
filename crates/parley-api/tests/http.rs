//! End-to-end tests over the router: auth gate, validation, moderation gate,
//! and visibility-scoped reads, backed by the in-memory store and the
//! keyword fallback (no remote classifier configured).

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

use parley_api::{AppState, AppStateInner, middleware::Claims, router};
use parley_moderation::{FallbackPolicy, Moderator, wordlist};
use parley_store::MemoryStorage;

const SECRET: &str = "test-secret";

fn app() -> Router {
    let state: AppState = Arc::new(AppStateInner {
        store: Arc::new(MemoryStorage::new()),
        moderator: Moderator::new(
            "https://api.openai.com/v1/moderations".to_string(),
            None,
            FallbackPolicy::Keyword,
            wordlist::blocklist(None).unwrap(),
        ),
        prefilter: wordlist::prefilter(None).unwrap(),
        jwt_secret: SECRET.to_string(),
    });
    router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, username: &str, domain: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "username": username,
            "password": "password123",
            "domain": domain,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

/// The API never mints admin tokens; tests sign one directly, standing in
/// for out-of-band admin provisioning.
fn admin_token() -> String {
    let claims = Claims {
        sub: 999,
        username: "root".to_string(),
        domain: "parley.dev".to_string(),
        is_admin: true,
        exp: (chrono::Utc::now() + chrono::Duration::days(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn register_then_login() {
    let app = app();
    register(&app, "alice", "acme.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": "alice", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert!(body["token"].as_str().is_some());

    let (status, _) = send(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "username": "nobody", "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let app = app();
    register(&app, "alice", "acme.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/register",
        None,
        Some(json!({
            "username": "alice",
            "password": "password123",
            "domain": "globex.com",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_rejects_malformed_input() {
    let app = app();

    for body in [
        json!({ "username": "al", "password": "password123", "domain": "acme.com" }),
        json!({ "username": "alice", "password": "short", "domain": "acme.com" }),
        json!({ "username": "alice", "password": "password123", "domain": "  " }),
    ] {
        let (status, _) = send(&app, "POST", "/api/register", None, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn message_routes_require_a_valid_token() {
    let app = app();

    let (status, _) = send(&app, "GET", "/api/messages?visibility=public", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/messages",
        None,
        Some(json!({ "content": "hello world", "visibility": "public" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "GET",
        "/api/messages?visibility=public",
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn posted_public_messages_read_back_newest_first() {
    let app = app();
    let token = register(&app, "alice", "acme.com").await;

    let (status, first) = send(
        &app,
        "POST",
        "/api/messages",
        Some(&token),
        Some(json!({ "content": "hello world", "visibility": "public" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["visibility"], "public");

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let (status, second) = send(
        &app,
        "POST",
        "/api/messages",
        Some(&token),
        Some(json!({ "content": "hello again", "visibility": "public" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(second["id"].as_i64().unwrap() > first["id"].as_i64().unwrap());

    let (status, body) = send(
        &app,
        "GET",
        "/api/messages?visibility=public",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "hello again");
    assert_eq!(messages[1]["content"], "hello world");
}

#[tokio::test]
async fn prefilter_rejects_trivially_profane_content() {
    let app = app();
    let token = register(&app, "alice", "acme.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/messages",
        Some(&token),
        Some(json!({ "content": "shit happens", "visibility": "public" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("inappropriate"));

    // Nothing was persisted.
    let (_, body) = send(
        &app,
        "GET",
        "/api/messages?visibility=public",
        Some(&token),
        None,
    )
    .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn keyword_fallback_rejects_what_the_prefilter_misses() {
    let app = app();
    let token = register(&app, "alice", "acme.com").await;

    // "bastard" is on the fallback blocklist but not the short pre-filter
    // list, so this exercises the moderation gate itself.
    let (status, body) = send(
        &app,
        "POST",
        "/api/messages",
        Some(&token),
        Some(json!({ "content": "bastard move", "visibility": "public" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Content contains inappropriate language");
}

#[tokio::test]
async fn post_rejects_malformed_payloads() {
    let app = app();
    let token = register(&app, "alice", "acme.com").await;

    for body in [
        json!({ "content": "", "visibility": "public" }),
        json!({ "content": "hello", "visibility": "friends" }),
        json!({ "content": "hello", "visibility": "domain" }),
        json!({ "content": "hello", "visibility": "public", "domain": "acme.com" }),
    ] {
        let (status, _) = send(&app, "POST", "/api/messages", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn admin_visibility_requires_the_admin_flag() {
    let app = app();
    let token = register(&app, "alice", "acme.com").await;

    let (status, _) = send(
        &app,
        "GET",
        "/api/messages?visibility=admin",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "GET",
        "/api/messages?visibility=admin",
        Some(&admin_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_messages_are_only_readable_by_admins() {
    let app = app();
    let token = register(&app, "alice", "acme.com").await;
    let admin = admin_token();

    let (status, _) = send(
        &app,
        "POST",
        "/api/messages",
        Some(&admin),
        Some(json!({ "content": "ops heads-up", "visibility": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "GET", "/api/messages?visibility=admin", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Admin messages don't leak into other scopes either.
    let (_, body) = send(
        &app,
        "GET",
        "/api/messages?visibility=public",
        Some(&token),
        None,
    )
    .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_visibility_reads_as_empty() {
    let app = app();
    let token = register(&app, "alice", "acme.com").await;

    send(
        &app,
        "POST",
        "/api/messages",
        Some(&token),
        Some(json!({ "content": "hello world", "visibility": "public" })),
    )
    .await;

    for uri in [
        "/api/messages?visibility=friends",
        "/api/messages",
    ] {
        let (status, body) = send(&app, "GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn domain_reads_are_scoped_to_the_callers_own_domain() {
    let app = app();
    let alice = register(&app, "alice", "acme.com").await;
    let bob = register(&app, "bob", "globex.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/messages",
        Some(&alice),
        Some(json!({ "content": "acme internal", "visibility": "domain", "domain": "acme.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/messages",
        Some(&bob),
        Some(json!({ "content": "globex internal", "visibility": "domain", "domain": "globex.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, "GET", "/api/messages?visibility=domain", Some(&alice), None).await;
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "acme internal");

    let (_, body) = send(&app, "GET", "/api/messages?visibility=domain", Some(&bob), None).await;
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "globex internal");
}
