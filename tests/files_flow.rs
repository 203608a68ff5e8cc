mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn create_list_and_render_round_trip() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;

    let file_id = app
        .create_file(&token, "Shallow Water Waves", ":rsm:\n# Waves\nDispersion matters.\n::")
        .await;

    let (status, body) = app.request(Method::GET, "/files", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Shallow Water Waves");

    // Freshly written source comes back through the rendered view.
    let (status, bytes) = app
        .request_raw(
            Method::GET,
            &format!("/files/{file_id}/content"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(bytes).unwrap();
    assert!(html.contains("Dispersion matters."));
}

#[tokio::test]
async fn malformed_envelope_is_rejected() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/files",
            Some(&token),
            Some(json!({ "title": "Broken", "source": "no envelope here" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .request(
            Method::POST,
            "/files",
            Some(&token),
            Some(json!({ "title": "Broken", "source": ":rsm:unterminated" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn source_update_invalidates_rendered_content() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let file_id = app.create_file(&token, "Draft", ":rsm:old text::").await;

    let (_, bytes) = app
        .request_raw(
            Method::GET,
            &format!("/files/{file_id}/content"),
            Some(&token),
            None,
        )
        .await;
    assert!(String::from_utf8(bytes).unwrap().contains("old text"));

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/files/{file_id}"),
            Some(&token),
            Some(json!({ "source": ":rsm:new text::" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, bytes) = app
        .request_raw(
            Method::GET,
            &format!("/files/{file_id}/content"),
            Some(&token),
            None,
        )
        .await;
    let html = String::from_utf8(bytes).unwrap();
    assert!(html.contains("new text"));
    assert!(!html.contains("old text"));
}

#[tokio::test]
async fn section_content_is_addressable() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let source = ":rsm:\nIntro text.\n## Methods\nCareful measurement.\n::";
    let file_id = app.create_file(&token, "Sectioned", source).await;

    let (status, bytes) = app
        .request_raw(
            Method::GET,
            &format!("/files/{file_id}/content/methods"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("Careful measurement."));

    let (status, _) = app
        .request_raw(
            Method::GET,
            &format!("/files/{file_id}/content/appendix"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn publish_assigns_short_identifier_once() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let file_id = app.create_file(&token, "To Publish", ":rsm:results::").await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/files/{file_id}/publish"),
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "published");
    let public_uuid = body["public_uuid"].as_str().unwrap();
    assert_eq!(public_uuid.len(), 6);
    assert!(public_uuid.chars().all(|c| c.is_ascii_alphanumeric()));
    assert!(body["published_at"].is_string());

    // Publishing twice is a business-rule violation, not a re-roll.
    let (status, _) = app
        .request(
            Method::POST,
            &format!("/files/{file_id}/publish"),
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_draft_cannot_publish() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let file_id = app.create_file(&token, "Empty", "").await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/files/{file_id}/publish"),
            Some(&token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn permalink_slug_conflicts_are_reported() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let first = app.create_file(&token, "First", ":rsm:one::").await;
    let second = app.create_file(&token, "Second", ":rsm:two::").await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/files/{first}/publish"),
            Some(&token),
            Some(json!({ "permalink_slug": "waves" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/files/{second}/publish"),
            Some(&token),
            Some(json!({ "permalink_slug": "waves" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn racing_publish_cannot_reassign_public_uuid() {
    use aris::models::FileStatus;
    use aris::schema::files;
    use chrono::Utc;
    use diesel::prelude::*;
    use uuid::Uuid;

    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let file_id: Uuid = app
        .create_file(&token, "Contended", ":rsm:body::")
        .await
        .parse()
        .unwrap();

    // Two writers that both saw the draft; each issues the publish write
    // guarded on draft status. Only the first may land.
    let mut conn = app.pool.get().unwrap();
    let publish_write = |conn: &mut PgConnection, uuid: &str| {
        diesel::update(
            files::table
                .find(file_id)
                .filter(files::status.eq(FileStatus::Draft.as_str())),
        )
        .set((
            files::status.eq(FileStatus::Published.as_str()),
            files::published_at.eq(Some(Utc::now())),
            files::public_uuid.eq(Some(uuid.to_string())),
        ))
        .execute(conn)
        .unwrap()
    };

    assert_eq!(publish_write(&mut conn, "AAAAAA"), 1);
    assert_eq!(publish_write(&mut conn, "BBBBBB"), 0);
    drop(conn);

    let (status, body) = app
        .request(Method::GET, &format!("/files/{file_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["public_uuid"], "AAAAAA");
}

#[tokio::test]
async fn duplicate_creates_an_independent_copy() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let file_id = app.create_file(&token, "Original", ":rsm:body::").await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/files/{file_id}/duplicate"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Original (copy)");
    assert_eq!(body["source"], ":rsm:body::");
    let copy_id = body["id"].as_str().unwrap();
    assert_ne!(copy_id, file_id);

    let (_, list) = app.request(Method::GET, "/files", Some(&token), None).await;
    assert_eq!(list.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn soft_deleted_files_vanish() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("author@example.org", "Mary Author").await;
    let file_id = app.create_file(&token, "Doomed", ":rsm:gone::").await;

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/files/{file_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .request(Method::GET, &format!("/files/{file_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.request(Method::GET, "/files", Some(&token), None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn files_are_invisible_across_owners() {
    let Some(app) = common::setup() else { return };
    let owner = app.register_and_login("owner@example.org", "The Owner").await;
    let other = app.register_and_login("other@example.org", "Someone Else").await;
    let file_id = app.create_file(&owner, "Private", ":rsm:secret::").await;

    let (status, _) = app
        .request(Method::GET, &format!("/files/{file_id}"), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = app.request(Method::GET, "/files", Some(&other), None).await;
    assert!(list.as_array().unwrap().is_empty());
}
