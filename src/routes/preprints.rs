use axum::extract::{Json, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{File, PUBLIC_UUID_LENGTH};
use crate::routes::files::load_asset_resolver;
use crate::schema::{files, users};
use crate::services::{citation, metadata};
use crate::services::citation::CitationInfo;
use crate::state::AppState;

#[derive(Serialize)]
pub struct PreprintResponse {
    pub title: String,
    pub author: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub published_at: Option<String>,
    pub public_uuid: Option<String>,
    pub permalink_slug: Option<String>,
}

pub async fn get_preprint(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<Json<PreprintResponse>> {
    let mut conn = state.db()?;
    let (file, author) = lookup_published(&mut conn, &identifier)?;

    Ok(Json(PreprintResponse {
        title: file.title,
        author,
        abstract_text: file.abstract_text,
        keywords: file.keywords,
        published_at: file.published_at.map(|at| at.to_rfc3339()),
        public_uuid: file.public_uuid,
        permalink_slug: file.permalink_slug,
    }))
}

/// All citation formats plus the embeddable meta tags in one payload.
pub async fn preprint_metadata(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db()?;
    let (file, author) = lookup_published(&mut conn, &identifier)?;
    let info = CitationInfo::new(&file, Some(&author), &state.config.base_url);

    Ok(Json(json!({
        "citations": {
            "apa": citation::apa(&info),
            "mla": citation::mla(&info),
            "chicago": citation::chicago(&info),
            "bibtex": citation::bibtex(&info),
        },
        "dublin_core": metadata::dublin_core(&file, &info),
        "schema_org": metadata::schema_org(&file, &info),
        "open_graph": tag_pairs(metadata::open_graph(&file, &info)),
        "highwire": tag_pairs(metadata::highwire(&file, &info)),
    })))
}

pub async fn export_bibtex(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<Response> {
    let mut conn = state.db()?;
    let (file, author) = lookup_published(&mut conn, &identifier)?;
    let info = CitationInfo::new(&file, Some(&author), &state.config.base_url);
    let entry = citation::bibtex(&info);

    let filename = file
        .permalink_slug
        .as_deref()
        .or(file.public_uuid.as_deref())
        .unwrap_or("preprint")
        .to_string();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-bibtex".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}.bib\""),
            ),
        ],
        entry,
    )
        .into_response())
}

pub async fn static_html(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<Html<String>> {
    let mut conn = state.db()?;
    let (file, author) = lookup_published(&mut conn, &identifier)?;
    let resolver = load_asset_resolver(&mut conn, file.id)?;
    drop(conn);

    state.files.upsert_row(&file).await;
    let resolver_ref = if resolver.is_empty() {
        None
    } else {
        Some(&resolver)
    };
    let rendered = state
        .files
        .rendered_html(file.id, state.renderer.as_ref(), false, resolver_ref)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(AppError::not_found)?;

    let info = CitationInfo::new(&file, Some(&author), &state.config.base_url);
    Ok(Html(metadata::static_page(&file, &info, &rendered)))
}

pub async fn dublin_core(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db()?;
    let (file, author) = lookup_published(&mut conn, &identifier)?;
    let info = CitationInfo::new(&file, Some(&author), &state.config.base_url);
    Ok(Json(metadata::dublin_core(&file, &info)))
}

pub async fn schema_org(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let mut conn = state.db()?;
    let (file, author) = lookup_published(&mut conn, &identifier)?;
    let info = CitationInfo::new(&file, Some(&author), &state.config.base_url);
    Ok(Json(metadata::schema_org(&file, &info)))
}

fn tag_pairs(tags: Vec<(String, String)>) -> Vec<serde_json::Value> {
    tags.into_iter()
        .map(|(name, content)| json!({ "name": name, "content": content }))
        .collect()
}

/// Resolve a public identifier to a published file and its author's name.
/// Six-character alphanumeric identifiers are tried as public uuids first;
/// everything else is a permalink slug.
fn lookup_published(conn: &mut PgConnection, identifier: &str) -> AppResult<(File, String)> {
    let looks_like_uuid =
        identifier.len() == PUBLIC_UUID_LENGTH && identifier.chars().all(|c| c.is_ascii_alphanumeric());

    let mut file: Option<File> = None;
    if looks_like_uuid {
        file = files::table
            .filter(files::public_uuid.eq(identifier))
            .filter(files::deleted_at.is_null())
            .first(conn)
            .optional()?;
    }
    if file.is_none() {
        file = files::table
            .filter(files::permalink_slug.eq(&identifier.to_lowercase()))
            .filter(files::deleted_at.is_null())
            .first(conn)
            .optional()?;
    }

    let file = file.ok_or_else(AppError::not_found)?;
    if !file.is_published() {
        return Err(AppError::not_found());
    }

    let author: String = users::table
        .find(file.owner_id)
        .select(users::name)
        .first(conn)?;
    Ok((file, author))
}
