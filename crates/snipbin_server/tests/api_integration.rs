//! Integration tests for the snipbin HTTP API.

mod support;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::routing::post;
use axum::Router;
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use snipbin_core::dispatch::{verify_signature, SIGNATURE_HEADER};
use std::time::Duration;
use support::{setup_clocked_server, setup_test_server};
use tokio::sync::mpsc;

const T: u64 = 1_700_000_000;

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).expect("header value")
}

fn secret(value: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Secret {value}")).expect("header value")
}

async fn create(server: &TestServer, content: &str, language: Option<&str>) -> (String, String) {
    let response = server
        .post("/documents")
        .json(&json!({ "content": content, "language": language }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    (
        body["id"].as_str().expect("id").to_string(),
        body["token"].as_str().expect("token").to_string(),
    )
}

fn error_message(response: &TestResponse) -> String {
    let body: Value = response.json();
    body["error"].as_str().unwrap_or_default().to_string()
}

async fn spawn_receiver() -> (String, mpsc::UnboundedReceiver<(HeaderMap, Bytes)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/hook",
        post(move |headers: HeaderMap, body: Bytes| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((headers, body));
                StatusCode::OK
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind receiver");
    let addr = listener.local_addr().expect("receiver addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/hook"), rx)
}

#[tokio::test]
async fn test_document_lifecycle() {
    let (server, _temp, _state, clock) = setup_clocked_server(T);

    let (id, token) = create(&server, "hello", None).await;
    assert_eq!(id.len(), 8);
    assert!(id.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));

    let fetched = server.get(&format!("/documents/{id}")).await;
    assert_eq!(fetched.status_code(), StatusCode::OK);
    let doc: Value = fetched.json();
    assert_eq!(doc["content"], "hello");
    assert_eq!(doc["language"], "plaintext");
    assert_eq!(doc["version"], T);

    clock.set(T + 3);
    let updated = server
        .patch(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "content": "hello world" }))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    let updated: Value = updated.json();
    assert_eq!(updated["version"], T + 3);
    assert_eq!(updated["language"], "plaintext");

    let latest: Value = server.get(&format!("/documents/{id}")).await.json();
    assert_eq!(latest["content"], "hello world");

    let count: Value = server
        .get(&format!("/documents/{id}/versions/count"))
        .await
        .json();
    assert_eq!(count["count"], 2);

    let versions: Vec<Value> = server
        .get(&format!("/documents/{id}/versions"))
        .await
        .json();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["version"], T + 3);
    assert!(versions[0].get("content").is_none());

    let versions: Vec<Value> = server
        .get(&format!("/documents/{id}/versions?with_content=true"))
        .await
        .json();
    assert_eq!(versions[1]["content"], "hello");

    let snapshot: Value = server
        .get(&format!("/documents/{id}/versions/{T}"))
        .await
        .json();
    assert_eq!(snapshot["content"], "hello");

    let deleted = server
        .delete(&format!("/documents/{id}"))
        .add_query_param("token", &token)
        .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);

    let gone = server.get(&format!("/documents/{id}")).await;
    assert_eq!(gone.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(error_message(&gone), "Not found");
}

#[tokio::test]
async fn test_same_second_update_conflicts() {
    let (server, _temp, _state, _clock) = setup_clocked_server(T);
    let (id, token) = create(&server, "first", Some("rust")).await;

    let response = server
        .patch(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&token))
        .json(&json!({ "content": "second" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let latest: Value = server.get(&format!("/documents/{id}")).await.json();
    assert_eq!(latest["content"], "first");
    assert_eq!(latest["language"], "rust");
}

#[tokio::test]
async fn test_missing_documents_return_not_found() {
    let (server, _temp, state) = setup_test_server();
    let token = state
        .tokens
        .issue("nosuchid", &snipbin_core::models::permission::Permission::ALL)
        .expect("token");

    for response in [
        server.get("/documents/nosuchid").await,
        server.get("/documents/nosuchid/versions").await,
        server.get("/documents/nosuchid/versions/12").await,
        server
            .patch("/documents/nosuchid")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .json(&json!({ "content": "x" }))
            .await,
        server
            .delete("/documents/nosuchid")
            .add_header(header::AUTHORIZATION, bearer(&token))
            .await,
    ] {
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    let count: Value = server
        .get("/documents/nosuchid/versions/count")
        .await
        .json();
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn test_token_enforcement() {
    let (server, _temp, _state) = setup_test_server();
    let (id, owner) = create(&server, "guarded", None).await;
    let (_other_id, other_owner) = create(&server, "elsewhere", None).await;

    let no_token = server
        .patch(&format!("/documents/{id}"))
        .json(&json!({ "content": "x" }))
        .await;
    assert_eq!(no_token.status_code(), StatusCode::UNAUTHORIZED);

    let garbage = server
        .delete(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer("not.a.token"))
        .await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);

    let wrong_doc = server
        .delete(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&other_owner))
        .await;
    assert_eq!(wrong_doc.status_code(), StatusCode::FORBIDDEN);

    let shared = server
        .post(&format!("/documents/{id}/share"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&json!({ "permissions": ["read"] }))
        .await;
    assert_eq!(shared.status_code(), StatusCode::OK);
    let read_only = shared.json::<Value>()["token"]
        .as_str()
        .expect("token")
        .to_string();

    let forbidden = server
        .delete(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&read_only))
        .await;
    assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

    let foreign_secret = snipbin_core::PermissionTokenService::new("not-the-server-secret")
        .expect("service")
        .issue_token(&id, &["delete"])
        .expect("token");
    let forged = server
        .delete(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&foreign_secret))
        .await;
    assert_eq!(forged.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_share_cannot_escalate() {
    let (server, _temp, _state) = setup_test_server();
    let (id, owner) = create(&server, "shared", None).await;

    let delegated: Value = server
        .post(&format!("/documents/{id}/share"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&json!({ "permissions": ["write", "share"] }))
        .await
        .json();
    let delegated = delegated["token"].as_str().expect("token").to_string();

    let escalate = server
        .post(&format!("/documents/{id}/share"))
        .add_header(header::AUTHORIZATION, bearer(&delegated))
        .json(&json!({ "permissions": ["delete"] }))
        .await;
    assert_eq!(escalate.status_code(), StatusCode::FORBIDDEN);

    let unknown = server
        .post(&format!("/documents/{id}/share"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&json!({ "permissions": ["admin"] }))
        .await;
    assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);
    assert!(error_message(&unknown).contains("admin"));

    let narrower = server
        .post(&format!("/documents/{id}/share"))
        .add_header(header::AUTHORIZATION, bearer(&delegated))
        .json(&json!({ "permissions": ["write"] }))
        .await;
    assert_eq!(narrower.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_share_links_resolve_to_latest_version() {
    let (server, _temp, _state) = setup_test_server();
    let (id, owner) = create(&server, "linked", Some("rust")).await;
    let (_other_id, other_owner) = create(&server, "elsewhere", None).await;

    let opened = server
        .get(&format!("/{id}"))
        .add_query_param("token", &owner)
        .await;
    assert_eq!(opened.status_code(), StatusCode::OK);
    let doc: Value = opened.json();
    assert_eq!(doc["id"], id.as_str());
    assert_eq!(doc["content"], "linked");
    assert_eq!(doc["language"], "rust");

    let shared: Value = server
        .post(&format!("/documents/{id}/share"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&json!({ "permissions": ["read"] }))
        .await
        .json();
    let read_only = shared["token"].as_str().expect("token");
    let via_read_token = server
        .get(&format!("/{id}"))
        .add_query_param("token", read_only)
        .await;
    assert_eq!(via_read_token.status_code(), StatusCode::OK);

    let plain = server.get(&format!("/{id}")).await;
    assert_eq!(plain.status_code(), StatusCode::OK);

    let foreign = server
        .get(&format!("/{id}"))
        .add_query_param("token", &other_owner)
        .await;
    assert_eq!(foreign.status_code(), StatusCode::FORBIDDEN);

    let garbage = server
        .get(&format!("/{id}"))
        .add_query_param("token", "not.a.token")
        .await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);

    assert_eq!(
        server.get("/nosuchid").await.status_code(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        server.get("/favicon.ico").await.status_code(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_webhook_management_requires_secret() {
    let (server, _temp, _state) = setup_test_server();
    let (id, owner) = create(&server, "watched", None).await;

    let created = server
        .post(&format!("/documents/{id}/webhooks"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&json!({
            "url": "https://hooks.example.com/snip",
            "secret": "hunter2",
            "events": ["update", "delete"]
        }))
        .await;
    assert_eq!(created.status_code(), StatusCode::CREATED);
    let created: Value = created.json();
    assert!(created.get("secret").is_none());
    let webhook_id = created["id"].as_str().expect("webhook id").to_string();
    let path = format!("/documents/{id}/webhooks/{webhook_id}");

    let without = server.get(&path).await;
    assert_eq!(without.status_code(), StatusCode::UNAUTHORIZED);
    let wrong = server
        .get(&path)
        .add_header(header::AUTHORIZATION, secret("nope"))
        .await;
    assert_eq!(wrong.status_code(), StatusCode::UNAUTHORIZED);

    let patched = server
        .patch(&path)
        .add_header(header::AUTHORIZATION, secret("hunter2"))
        .json(&json!({ "secret": "hunter3" }))
        .await;
    assert_eq!(patched.status_code(), StatusCode::OK);
    let patched: Value = patched.json();
    assert_eq!(patched["url"], "https://hooks.example.com/snip");
    assert_eq!(patched["events"], json!(["update", "delete"]));

    let fetched = server
        .get(&path)
        .add_header(header::AUTHORIZATION, secret("hunter3"))
        .await;
    assert_eq!(fetched.status_code(), StatusCode::OK);

    let bad_event = server
        .patch(&path)
        .add_header(header::AUTHORIZATION, secret("hunter3"))
        .json(&json!({ "events": ["create"] }))
        .await;
    assert_eq!(bad_event.status_code(), StatusCode::BAD_REQUEST);

    let deleted = server
        .delete(&path)
        .add_header(header::AUTHORIZATION, secret("hunter3"))
        .await;
    assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);
    let again = server
        .delete(&path)
        .add_header(header::AUTHORIZATION, secret("hunter3"))
        .await;
    assert_eq!(again.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_webhook_create_validation() {
    let (server, _temp, _state) = setup_test_server();
    let (id, owner) = create(&server, "watched", None).await;

    for body in [
        json!({ "url": "not a url", "secret": "s", "events": ["update"] }),
        json!({ "url": "https://example.com", "secret": "", "events": ["update"] }),
        json!({ "url": "https://example.com", "secret": "s", "events": [] }),
        json!({ "url": "https://example.com", "secret": "s", "events": ["explode"] }),
    ] {
        let response = server
            .post(&format!("/documents/{id}/webhooks"))
            .add_header(header::AUTHORIZATION, bearer(&owner))
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "body {body}");
    }
}

#[tokio::test]
async fn test_mutations_deliver_signed_webhooks() {
    let (receiver_url, mut received) = spawn_receiver().await;
    let (server, _temp, state, clock) = setup_clocked_server(T);
    let (id, owner) = create(&server, "v1", None).await;

    let created: Value = server
        .post(&format!("/documents/{id}/webhooks"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&json!({
            "url": receiver_url,
            "secret": "hook-secret",
            "events": ["update", "delete"]
        }))
        .await
        .json();
    let webhook_id = created["id"].as_str().expect("webhook id").to_string();

    clock.set(T + 1);
    let updated = server
        .patch(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .json(&json!({ "content": "v2" }))
        .await;
    assert_eq!(updated.status_code(), StatusCode::OK);
    state.webhooks.drain().await;

    let (headers, body) = received.try_recv().expect("update delivered");
    assert_eq!(headers["x-snipbin-event"], "update");
    assert_eq!(headers["x-snipbin-webhook-id"], webhook_id.as_str());
    let signature = headers[SIGNATURE_HEADER].to_str().expect("ascii");
    assert!(verify_signature("hook-secret", &body, signature));
    let payload: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(payload["document"]["content"], "v2");
    assert_eq!(payload["document"]["version"], T + 1);

    let deleted = server
        .delete(&format!("/documents/{id}"))
        .add_header(header::AUTHORIZATION, bearer(&owner))
        .await;
    assert_eq!(deleted.status_code(), StatusCode::OK);
    tokio::time::timeout(Duration::from_secs(10), state.webhooks.drain())
        .await
        .expect("drain completes");

    let (headers, body) = received.try_recv().expect("delete delivered");
    assert_eq!(headers["x-snipbin-event"], "delete");
    let payload: Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(payload["event"], "delete");
    assert_eq!(payload["document"]["id"], id.as_str());

    assert!(state
        .db
        .webhooks
        .get_webhooks_by_document_id(&id)
        .expect("list")
        .is_empty());
}

#[tokio::test]
async fn test_size_limit_rejects_large_documents() {
    let temp_dir = tempfile::TempDir::new().expect("temp dir");
    let mut config = support::test_config_for_db_path(&temp_dir.path().join("test.redb"));
    config.max_document_size = 5;
    let db = snipbin_server::Database::open(
        &config.db_path,
        snipbin_server::db::StoreOptions {
            max_document_size: 5,
            ..Default::default()
        },
    )
    .expect("db");
    let state = snipbin_server::AppState::new(config, db).expect("state");
    let server = TestServer::new(snipbin_server::create_app(state, false)).expect("server");

    let ok = server
        .post("/documents")
        .json(&json!({ "content": "12345" }))
        .await;
    assert_eq!(ok.status_code(), StatusCode::CREATED);

    let too_big = server
        .post("/documents")
        .json(&json!({ "content": "123456" }))
        .await;
    assert_eq!(too_big.status_code(), StatusCode::BAD_REQUEST);
}
