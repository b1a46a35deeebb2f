use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use schoolhub_server::blobs::FileBlobStore;
use schoolhub_server::build_router;
use schoolhub_server::config::{AppState, ServerConfig};
use schoolhub_server::store::{ChaoticStore, DocumentStore, MemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc;
use tower::ServiceExt;

async fn app_with_store(store: Arc<dyn DocumentStore>) -> (Router, AppState, TempDir) {
    let dir = tempdir().unwrap();
    let config = ServerConfig::with_base_dir(dir.path());
    let blobs = Arc::new(FileBlobStore::new(&config.uploads_dir).await.unwrap());
    let state = AppState::new(config, store, blobs);
    (build_router(state.clone()), state, dir)
}

async fn app() -> (Router, AppState, TempDir) {
    app_with_store(Arc::new(MemoryStore::new())).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (app, _state, _dir) = app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_send_message_persists_without_pushing() {
    let (app, state, _dir) = app().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let bob = state.router.connect(tx);
    state.router.register(&bob, "bob");

    let (status, body) = send(
        &app,
        post_json("/sendMessage", json!({"sender": "alice", "receiver": "bob", "body": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "sent");
    assert!(body["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(rx.try_recv().is_err());

    let (status, messages) = send(&app, get("/messages?user=bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().unwrap().len(), 1);
    assert_eq!(messages[0]["content"], "hi");
    assert_eq!(messages[0]["_id"], body["id"]);
}

#[tokio::test]
async fn test_malformed_message_is_rejected() {
    let (app, state, _dir) = app().await;

    let (status, body) = send(&app, post_json("/sendMessage", json!({"sender": "alice", "content": "hi"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("receiver"));

    let request = Request::post("/sendMessage")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{oops"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].is_string());

    let stored = state
        .router
        .messages()
        .find(&schoolhub_server::store::Filter::All, None)
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let store = ChaoticStore::always_failing(MemoryStore::new());
    let (app, _state, _dir) = app_with_store(Arc::new(store)).await;

    let (status, body) = send(
        &app,
        post_json("/sendMessage", json!({"sender": "alice", "receiver": "bob", "content": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]["message"].is_string());

    let (status, _) = send(&app, get("/posts")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_conversation_query() {
    let (app, _state, _dir) = app().await;
    for (sender, receiver, content) in [
        ("alice", "bob", "one"),
        ("carol", "alice", "other"),
        ("bob", "alice", "two"),
    ] {
        let (status, _) = send(
            &app,
            post_json("/sendMessage", json!({"sender": sender, "receiver": receiver, "content": content})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, messages) = send(&app, get("/messages?user=alice&with=bob")).await;
    let contents: Vec<&str> = messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["one", "two"]);

    let (_, all) = send(&app, get("/messages")).await;
    assert_eq!(all.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_posts_lifecycle() {
    let (app, _state, _dir) = app().await;

    let (status, first) = send(
        &app,
        post_json("/uploadPost", json!({"title": "Sports day", "content": "Friday", "imageUrl": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "ok");
    send(&app, post_json("/uploadPost", json!({"title": "Field trip", "content": "Zoo"}))).await;

    let (_, posts) = send(&app, get("/posts")).await;
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    // Newest first
    assert_eq!(posts[0]["title"], "Field trip");
    assert!(posts[0]["createdAt"].is_string());

    let id = first["id"].as_str().unwrap();
    let delete = Request::delete(format!("/posts/{}", id)).body(Body::empty()).unwrap();
    let (status, body) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "id": id}));

    let delete = Request::delete(format!("/posts/{}", id)).body(Body::empty()).unwrap();
    let (status, body) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_modules_lifecycle() {
    let (app, _state, _dir) = app().await;

    let (status, created) = send(
        &app,
        post_json(
            "/uploadModule",
            json!({"title": "Colours", "description": "Week 1", "fileUrl": "/files/abc-colours.pdf"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, modules) = send(&app, get("/modules")).await;
    assert_eq!(modules[0]["fileUrl"], "/files/abc-colours.pdf");

    let id = created["id"].as_str().unwrap();
    let delete = Request::delete(format!("/modules/{}", id)).body(Body::empty()).unwrap();
    let (status, body) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "id": id}));

    let (_, modules) = send(&app, get("/modules")).await;
    assert!(modules.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_evaluations_by_student() {
    let (app, _state, _dir) = app().await;

    let (status, _) = send(&app, post_json("/addEvaluation", json!({"age": "4"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (student, gross) in [("s-1", 2), ("s-2", 5), ("s-1", 4)] {
        let (status, _) = send(
            &app,
            post_json("/addEvaluation", json!({"studentId": student, "age": "4", "grossB": gross})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, all) = send(&app, get("/evaluations")).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, mine) = send(&app, get("/evaluations/s-1")).await;
    let scores: Vec<i64> = mine
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["grossB"].as_i64().unwrap())
        .collect();
    assert_eq!(scores, vec![2, 4]);
}

#[tokio::test]
async fn test_upload_and_download_file() {
    let (app, _state, _dir) = app().await;

    let boundary = "schoolhub-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"lesson plan.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nCount to ten\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, blob) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blob["name"], "lesson_plan.txt");
    assert_eq!(blob["size"], 12);
    assert_eq!(blob["contentType"], "text/plain");

    let url = blob["url"].as_str().unwrap();
    let response = app.clone().oneshot(get(url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"Count to ten");

    let (status, _) = send(&app, get("/files/0000000000000000-missing.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_without_part_content_type_uses_extension() {
    let (app, _state, _dir) = app().await;

    let body = "--b\r\nContent-Disposition: form-data; name=\"file\"; filename=\"map.png\"\r\n\r\nPNG\r\n--b--\r\n";
    let request = Request::post("/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b")
        .body(Body::from(body))
        .unwrap();

    let (status, blob) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(blob["contentType"], "image/png");

    let response = app.clone().oneshot(get(blob["url"].as_str().unwrap())).await.unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
}

#[tokio::test]
async fn test_upload_without_file_field_is_rejected() {
    let (app, _state, _dir) = app().await;

    let boundary = "b";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::post("/upload")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=b")
        .body(Body::from(body))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_online_lists_registered_users() {
    let (app, state, _dir) = app().await;
    let (tx, _rx) = mpsc::unbounded_channel();
    let handle = state.router.connect(tx);
    state.router.register(&handle, "teacher-anna");

    let (status, users) = send(&app, get("/online")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users, json!(["teacher-anna"]));

    state.router.disconnect(&handle, "test");
    let (_, users) = send(&app, get("/online")).await;
    assert_eq!(users, json!([]));
}
