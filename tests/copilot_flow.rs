mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn chat_answers_through_the_configured_provider() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("writer@example.org", "The Writer").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/copilot/chat",
            Some(&token),
            Some(json!({ "message": "tighten my abstract" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "mock");
    assert!(body["reply"].as_str().unwrap().contains("tighten my abstract"));
}

#[tokio::test]
async fn chat_accepts_manuscript_context() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("writer@example.org", "The Writer").await;
    let file_id = app.create_file(&token, "Context", ":rsm:the manuscript::").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/copilot/chat",
            Some(&token),
            Some(json!({ "message": "what should I fix?", "file_id": file_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["reply"].as_str().unwrap().contains("what should I fix?"));
}

#[tokio::test]
async fn chat_validates_input() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("writer@example.org", "The Writer").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/copilot/chat",
            Some(&token),
            Some(json!({ "message": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Context from files you do not own is refused.
    let other = app.register_and_login("other@example.org", "Other").await;
    let file_id = app.create_file(&other, "Private", ":rsm:secret::").await;
    let (status, _) = app
        .request(
            Method::POST,
            "/copilot/chat",
            Some(&token),
            Some(json!({ "message": "summarize", "file_id": file_id })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(
            Method::POST,
            "/copilot/chat",
            None,
            Some(json!({ "message": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
