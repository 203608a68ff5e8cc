use std::collections::HashMap;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{generate_public_uuid, File, FileStatus, NewFile, PublishError};
use crate::render;
use crate::schema::{file_assets, files};
use crate::state::AppState;

/// Publish retries with a fresh public uuid when the unique constraint
/// trips; collisions on a 62^6 space are rare but not impossible.
const PUBLISH_MAX_ATTEMPTS: usize = 5;

#[derive(Deserialize)]
pub struct CreateFileRequest {
    pub title: String,
    pub source: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateFileRequest {
    pub title: Option<String>,
    pub source: Option<String>,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Deserialize)]
pub struct PublishRequest {
    pub permalink_slug: Option<String>,
}

#[derive(Deserialize)]
pub struct ContentQuery {
    #[serde(default = "default_true")]
    pub handrails: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub abstract_text: Option<String>,
    pub keywords: Option<String>,
    pub status: String,
    pub source: String,
    pub published_at: Option<String>,
    pub public_uuid: Option<String>,
    pub permalink_slug: Option<String>,
    pub version: i32,
    pub prev_version_id: Option<Uuid>,
    pub created_at: String,
    pub last_edited_at: String,
}

impl From<File> for FileResponse {
    fn from(file: File) -> Self {
        Self {
            id: file.id,
            owner_id: file.owner_id,
            title: file.title,
            abstract_text: file.abstract_text,
            keywords: file.keywords,
            status: file.status,
            source: file.source,
            published_at: file.published_at.map(|at| at.to_rfc3339()),
            public_uuid: file.public_uuid,
            permalink_slug: file.permalink_slug,
            version: file.version,
            prev_version_id: file.prev_version_id,
            created_at: file.created_at.to_rfc3339(),
            last_edited_at: file.last_edited_at.to_rfc3339(),
        }
    }
}

pub async fn list_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<FileResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<File> = files::table
        .filter(files::owner_id.eq(user.user_id))
        .filter(files::deleted_at.is_null())
        .order(files::last_edited_at.desc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(FileResponse::from).collect()))
}

pub async fn create_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateFileRequest>,
) -> AppResult<(StatusCode, Json<FileResponse>)> {
    let title = payload.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }
    if !payload.source.trim().is_empty() {
        render::validate_envelope(&payload.source)
            .map_err(|err| AppError::bad_request(err.to_string()))?;
    }

    let new_file = NewFile {
        id: Uuid::new_v4(),
        owner_id: user.user_id,
        title,
        abstract_text: payload.abstract_text,
        keywords: payload.keywords,
        status: FileStatus::Draft.as_str().to_string(),
        source: payload.source,
        version: 1,
        prev_version_id: None,
    };

    let mut conn = state.db()?;
    diesel::insert_into(files::table)
        .values(&new_file)
        .execute(&mut conn)?;
    let file: File = files::table.find(new_file.id).first(&mut conn)?;
    drop(conn);

    state.files.upsert_row(&file).await;
    info!(file_id = %file.id, owner_id = %user.user_id, "file created");
    Ok((StatusCode::CREATED, Json(file.into())))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<FileResponse>> {
    let mut conn = state.db()?;
    let file = load_owned_file(&mut conn, file_id, user.user_id)?;
    Ok(Json(file.into()))
}

pub async fn update_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdateFileRequest>,
) -> AppResult<Json<FileResponse>> {
    if payload.title.is_none()
        && payload.source.is_none()
        && payload.abstract_text.is_none()
        && payload.keywords.is_none()
    {
        return Err(AppError::bad_request("no changes provided"));
    }

    let mut conn = state.db()?;
    let mut file = load_owned_file(&mut conn, file_id, user.user_id)?;

    if let Some(title) = payload.title {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }
        file.title = trimmed.to_string();
    }
    if let Some(source) = payload.source {
        if !source.trim().is_empty() {
            render::validate_envelope(&source)
                .map_err(|err| AppError::bad_request(err.to_string()))?;
        }
        file.source = source;
    }
    if let Some(abstract_text) = payload.abstract_text {
        file.abstract_text = Some(abstract_text);
    }
    if let Some(keywords) = payload.keywords {
        file.keywords = Some(keywords);
    }
    file.last_edited_at = Utc::now();

    diesel::update(files::table.find(file_id))
        .set((
            files::title.eq(&file.title),
            files::abstract_text.eq(&file.abstract_text),
            files::keywords.eq(&file.keywords),
            files::source.eq(&file.source),
            files::last_edited_at.eq(file.last_edited_at),
        ))
        .execute(&mut conn)?;
    drop(conn);

    // Write-through: a changed source drops the mirror's cached render.
    state.files.upsert_row(&file).await;
    Ok(Json(file.into()))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db()?;
    load_owned_file(&mut conn, file_id, user.user_id)?;

    let now = Utc::now();
    diesel::update(files::table.find(file_id))
        .set((
            files::deleted_at.eq(Some(now)),
            files::last_edited_at.eq(now),
        ))
        .execute(&mut conn)?;
    drop(conn);

    state.files.delete_file(file_id).await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn file_content(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    Query(query): Query<ContentQuery>,
    user: AuthenticatedUser,
) -> AppResult<Html<String>> {
    let mut conn = state.db()?;
    let file = load_owned_file(&mut conn, file_id, user.user_id)?;
    render::validate_envelope(&file.source)
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let resolver = load_asset_resolver(&mut conn, file_id)?;
    drop(conn);

    state.files.upsert_row(&file).await;
    let resolver_ref = if resolver.is_empty() {
        None
    } else {
        Some(&resolver)
    };
    let html = state
        .files
        .rendered_html(file_id, state.renderer.as_ref(), query.handrails, resolver_ref)
        .await
        .map_err(AppError::internal)?
        .ok_or_else(AppError::not_found)?;

    Ok(Html(html))
}

pub async fn file_section(
    State(state): State<AppState>,
    Path((file_id, section)): Path<(Uuid, String)>,
    user: AuthenticatedUser,
) -> AppResult<Html<String>> {
    let mut conn = state.db()?;
    let file = load_owned_file(&mut conn, file_id, user.user_id)?;
    render::validate_envelope(&file.source)
        .map_err(|err| AppError::bad_request(err.to_string()))?;
    drop(conn);

    state.files.upsert_row(&file).await;
    let html = state
        .files
        .section_html(file_id, &section, state.renderer.as_ref())
        .await
        .map_err(AppError::internal)?
        .ok_or_else(AppError::not_found)?;

    Ok(Html(html))
}

pub async fn duplicate_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<(StatusCode, Json<FileResponse>)> {
    let mut conn = state.db()?;
    let original = load_owned_file(&mut conn, file_id, user.user_id)?;
    drop(conn);

    state.files.upsert_row(&original).await;
    let copy = state
        .files
        .duplicate_file(file_id)
        .await
        .ok_or_else(AppError::not_found)?;

    let new_file = NewFile {
        id: copy.id,
        owner_id: copy.owner_id,
        title: copy.title.clone(),
        abstract_text: copy.abstract_text.clone(),
        keywords: copy.keywords.clone(),
        status: copy.status.clone(),
        source: copy.source.clone(),
        version: 1,
        prev_version_id: None,
    };

    let mut conn = state.db()?;
    diesel::insert_into(files::table)
        .values(&new_file)
        .execute(&mut conn)?;
    let persisted: File = files::table.find(copy.id).first(&mut conn)?;
    drop(conn);

    state.files.upsert_row(&persisted).await;
    Ok((StatusCode::CREATED, Json(persisted.into())))
}

pub async fn publish_file(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(payload): Json<PublishRequest>,
) -> AppResult<Json<FileResponse>> {
    let permalink_slug = match payload.permalink_slug {
        Some(slug) => {
            let trimmed = slug.trim().to_lowercase();
            if trimmed.is_empty() {
                None
            } else {
                if !trimmed
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
                {
                    return Err(AppError::bad_request(
                        "permalink slug may only contain letters, digits, and hyphens",
                    ));
                }
                Some(trimmed)
            }
        }
        None => None,
    };

    let mut conn = state.db()?;
    let mut file = load_owned_file(&mut conn, file_id, user.user_id)?;

    file.publish()
        .map_err(|err: PublishError| AppError::bad_request(err.to_string()))?;
    file.permalink_slug = permalink_slug;

    for attempt in 0..PUBLISH_MAX_ATTEMPTS {
        // Guarded on status so a concurrent publish that committed between
        // our read and this write affects zero rows instead of re-rolling
        // the already-assigned public uuid.
        let result = diesel::update(
            files::table
                .find(file_id)
                .filter(files::status.eq(FileStatus::Draft.as_str())),
        )
        .set((
            files::status.eq(&file.status),
            files::published_at.eq(file.published_at),
            files::public_uuid.eq(&file.public_uuid),
            files::permalink_slug.eq(&file.permalink_slug),
        ))
        .execute(&mut conn);

        match result {
            Ok(0) => {
                return Err(AppError::conflict("file is no longer a draft"));
            }
            Ok(_) => {
                let persisted: File = files::table.find(file_id).first(&mut conn)?;
                drop(conn);
                state.files.upsert_row(&persisted).await;
                info!(
                    file_id = %file_id,
                    public_uuid = persisted.public_uuid.as_deref().unwrap_or(""),
                    "file published"
                );
                return Ok(Json(persisted.into()));
            }
            Err(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                details,
            )) => {
                let constraint = details.constraint_name().unwrap_or_default().to_string();
                if constraint.contains("permalink_slug") {
                    return Err(AppError::conflict("permalink slug is already taken"));
                }
                warn!(file_id = %file_id, attempt, "public uuid collision, retrying");
                file.public_uuid = Some(generate_public_uuid());
            }
            Err(err) => return Err(AppError::from(err)),
        }
    }

    Err(AppError::internal(
        "could not assign a unique public identifier",
    ))
}

fn load_owned_file(
    conn: &mut PgConnection,
    file_id: Uuid,
    owner_id: Uuid,
) -> AppResult<File> {
    let file: File = files::table.find(file_id).first(conn)?;
    if file.deleted_at.is_some() || file.owner_id != owner_id {
        return Err(AppError::not_found());
    }
    Ok(file)
}

pub(crate) fn load_asset_resolver(
    conn: &mut PgConnection,
    file_id: Uuid,
) -> AppResult<HashMap<String, String>> {
    let rows: Vec<(String, String, String)> = file_assets::table
        .filter(file_assets::file_id.eq(file_id))
        .filter(file_assets::deleted_at.is_null())
        .select((
            file_assets::filename,
            file_assets::mime_type,
            file_assets::content,
        ))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|(filename, mime_type, content)| {
            let data_uri = format!("data:{mime_type};base64,{content}");
            (filename, data_uri)
        })
        .collect())
}
