mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

async fn user_id(app: &common::TestApp, token: &str) -> String {
    let (status, body) = app.request(Method::GET, "/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn tag_lifecycle() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("tagger@example.org", "Tag Author").await;
    let uid = user_id(&app, &token).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/users/{uid}/tags"),
            Some(&token),
            Some(json!({ "name": "hydrodynamics", "color": "#3366ff" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let tag_id = body["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/users/{uid}/tags"),
            Some(&token),
            Some(json!({ "name": "hydrodynamics" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/users/{uid}/tags/{tag_id}"),
            Some(&token),
            Some(json!({ "name": "fluid-dynamics" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "fluid-dynamics");

    let (status, body) = app
        .request(Method::GET, &format!("/users/{uid}/tags"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/users/{uid}/tags/{tag_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app
        .request(Method::GET, &format!("/users/{uid}/tags"), Some(&token), None)
        .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleted_tag_name_is_reusable() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("tagger@example.org", "Tag Author").await;
    let uid = user_id(&app, &token).await;

    let (_, body) = app
        .request(
            Method::POST,
            &format!("/users/{uid}/tags"),
            Some(&token),
            Some(json!({ "name": "draft-ideas" })),
        )
        .await;
    let tag_id = body["id"].as_str().unwrap().to_string();

    app.request(
        Method::DELETE,
        &format!("/users/{uid}/tags/{tag_id}"),
        Some(&token),
        None,
    )
    .await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/users/{uid}/tags"),
            Some(&token),
            Some(json!({ "name": "draft-ideas" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn attach_and_detach_is_idempotent() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("tagger@example.org", "Tag Author").await;
    let uid = user_id(&app, &token).await;
    let file_id = app.create_file(&token, "Tagged Paper", ":rsm:body::").await;

    let (_, body) = app
        .request(
            Method::POST,
            &format!("/users/{uid}/tags"),
            Some(&token),
            Some(json!({ "name": "reviewed" })),
        )
        .await;
    let tag_id = body["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, _) = app
            .request(
                Method::POST,
                &format!("/files/{file_id}/tags/{tag_id}"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (status, _) = app
        .request(
            Method::DELETE,
            &format!("/files/{file_id}/tags/{tag_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn cannot_touch_another_users_tags() {
    let Some(app) = common::setup() else { return };
    let owner = app.register_and_login("owner@example.org", "Owner").await;
    let other = app.register_and_login("other@example.org", "Other").await;
    let owner_id = user_id(&app, &owner).await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/users/{owner_id}/tags"),
            Some(&other),
            Some(json!({ "name": "sneaky" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/users/{owner_id}/tags"),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
