mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

async fn published_identifier(app: &common::TestApp, token: &str) -> String {
    let file_id = app
        .create_file(
            token,
            "Tidal Resonance in Closed Basins",
            ":rsm:\n# Tidal Resonance\nStanding waves amplify.\n::",
        )
        .await;
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/files/{file_id}/publish"),
            Some(token),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    body["public_uuid"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn published_preprint_is_publicly_readable() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("hopper@example.org", "Grace Hopper").await;
    let public_uuid = published_identifier(&app, &token).await;

    // No bearer token on any of these.
    let (status, body) = app
        .request(Method::GET, &format!("/ication/{public_uuid}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Tidal Resonance in Closed Basins");
    assert_eq!(body["author"], "Grace Hopper");
}

#[tokio::test]
async fn drafts_stay_private() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("hopper@example.org", "Grace Hopper").await;
    app.create_file(&token, "Unfinished", ":rsm:wip::").await;

    let (status, _) = app
        .request(Method::GET, "/ication/no-such-slug", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metadata_bundle_covers_all_formats() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("hopper@example.org", "Grace Hopper").await;
    let public_uuid = published_identifier(&app, &token).await;

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/ication/{public_uuid}/metadata"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let apa = body["citations"]["apa"].as_str().unwrap();
    assert!(apa.contains("Grace Hopper"));
    assert!(apa.contains("Tidal Resonance in Closed Basins"));
    assert!(body["citations"]["bibtex"]
        .as_str()
        .unwrap()
        .starts_with("@misc{hopper"));
    assert_eq!(body["schema_org"]["@type"], "ScholarlyArticle");
    assert_eq!(body["dublin_core"]["dc.creator"], "Grace Hopper");
    assert!(!body["highwire"].as_array().unwrap().is_empty());
    assert!(!body["open_graph"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn bibtex_export_downloads_an_entry() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("hopper@example.org", "Grace Hopper").await;
    let public_uuid = published_identifier(&app, &token).await;

    let (status, bytes) = app
        .request_raw(
            Method::GET,
            &format!("/ication/{public_uuid}/export/bibtex"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entry = String::from_utf8(bytes).unwrap();
    assert!(entry.starts_with("@misc{"));
    assert!(entry.contains("Tidal Resonance in Closed Basins"));
}

#[tokio::test]
async fn static_html_embeds_citation_meta() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("hopper@example.org", "Grace Hopper").await;
    let public_uuid = published_identifier(&app, &token).await;

    let (status, bytes) = app
        .request_raw(
            Method::GET,
            &format!("/ication/{public_uuid}/static-html"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(bytes).unwrap();
    assert!(page.contains("citation_title"));
    assert!(page.contains("og:title"));
    assert!(page.contains("Standing waves amplify."));
}

#[tokio::test]
async fn permalink_slug_resolves_too() {
    let Some(app) = common::setup() else { return };
    let token = app.register_and_login("hopper@example.org", "Grace Hopper").await;
    let file_id = app.create_file(&token, "Sluggable", ":rsm:body::").await;

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/files/{file_id}/publish"),
            Some(&token),
            Some(json!({ "permalink_slug": "sluggable-paper" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::GET, "/ication/sluggable-paper", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["permalink_slug"], "sluggable-paper");

    let (status, body) = app
        .request(Method::GET, "/ication/sluggable-paper/dublin-core", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["dc.identifier"]
        .as_str()
        .unwrap()
        .ends_with("/ication/sluggable-paper"));
}
