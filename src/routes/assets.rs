use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{FileAsset, NewFileAsset};
use crate::schema::{file_assets, files};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateAssetRequest {
    pub file_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    /// Base64-encoded bytes; stored and returned verbatim.
    pub content: String,
}

#[derive(Deserialize)]
pub struct UpdateAssetRequest {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct ListAssetsQuery {
    pub file_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct AssetResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub content: String,
    pub uploaded_at: String,
}

impl From<FileAsset> for AssetResponse {
    fn from(asset: FileAsset) -> Self {
        Self {
            id: asset.id,
            file_id: asset.file_id,
            filename: asset.filename,
            mime_type: asset.mime_type,
            content: asset.content,
            uploaded_at: asset.uploaded_at.to_rfc3339(),
        }
    }
}

pub async fn list_assets(
    State(state): State<AppState>,
    Query(query): Query<ListAssetsQuery>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<AssetResponse>>> {
    let mut conn = state.db()?;
    let mut stmt = file_assets::table
        .filter(file_assets::owner_id.eq(auth.user_id))
        .filter(file_assets::deleted_at.is_null())
        .into_boxed();
    if let Some(file_id) = query.file_id {
        stmt = stmt.filter(file_assets::file_id.eq(file_id));
    }
    let rows: Vec<FileAsset> = stmt.order(file_assets::uploaded_at.desc()).load(&mut conn)?;
    Ok(Json(rows.into_iter().map(AssetResponse::from).collect()))
}

pub async fn create_asset(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<CreateAssetRequest>,
) -> AppResult<(StatusCode, Json<AssetResponse>)> {
    let filename = payload.filename.trim().to_string();
    if filename.is_empty() {
        return Err(AppError::bad_request("filename must not be empty"));
    }
    if payload.mime_type.trim().is_empty() {
        return Err(AppError::bad_request("mime type must not be empty"));
    }

    let mut conn = state.db()?;
    require_owned_file(&mut conn, payload.file_id, auth.user_id)?;

    let new_asset = NewFileAsset {
        id: Uuid::new_v4(),
        file_id: payload.file_id,
        owner_id: auth.user_id,
        filename,
        mime_type: payload.mime_type,
        content: payload.content,
    };

    match diesel::insert_into(file_assets::table)
        .values(&new_asset)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict(
                "an asset with that filename already exists for this file",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let asset: FileAsset = file_assets::table.find(new_asset.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(asset.into())))
}

pub async fn get_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<AssetResponse>> {
    let mut conn = state.db()?;
    let asset = load_owned_asset(&mut conn, asset_id, auth.user_id)?;
    Ok(Json(asset.into()))
}

pub async fn update_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(payload): Json<UpdateAssetRequest>,
) -> AppResult<Json<AssetResponse>> {
    let mut conn = state.db()?;
    let mut asset = load_owned_asset(&mut conn, asset_id, auth.user_id)?;

    if let Some(filename) = payload.filename {
        let trimmed = filename.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("filename must not be empty"));
        }
        asset.filename = trimmed.to_string();
    }
    if let Some(mime_type) = payload.mime_type {
        if mime_type.trim().is_empty() {
            return Err(AppError::bad_request("mime type must not be empty"));
        }
        asset.mime_type = mime_type;
    }
    if let Some(content) = payload.content {
        asset.content = content;
    }

    let result = diesel::update(file_assets::table.find(asset_id))
        .set((
            file_assets::filename.eq(&asset.filename),
            file_assets::mime_type.eq(&asset.mime_type),
            file_assets::content.eq(&asset.content),
        ))
        .execute(&mut conn);
    match result {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict(
                "an asset with that filename already exists for this file",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    Ok(Json(asset.into()))
}

pub async fn delete_asset(
    State(state): State<AppState>,
    Path(asset_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    load_owned_asset(&mut conn, asset_id, auth.user_id)?;

    diesel::update(file_assets::table.find(asset_id))
        .set(file_assets::deleted_at.eq(Some(Utc::now())))
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

fn load_owned_asset(
    conn: &mut PgConnection,
    asset_id: Uuid,
    owner_id: Uuid,
) -> AppResult<FileAsset> {
    let asset: FileAsset = file_assets::table.find(asset_id).first(conn)?;
    if asset.deleted_at.is_some() || asset.owner_id != owner_id {
        return Err(AppError::not_found());
    }
    Ok(asset)
}

fn require_owned_file(conn: &mut PgConnection, file_id: Uuid, owner_id: Uuid) -> AppResult<()> {
    let exists = diesel::select(diesel::dsl::exists(
        files::table
            .filter(files::id.eq(file_id))
            .filter(files::owner_id.eq(owner_id))
            .filter(files::deleted_at.is_null()),
    ))
    .get_result::<bool>(conn)?;
    if !exists {
        return Err(AppError::not_found());
    }
    Ok(())
}
