use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{NewFileTag, NewTag, Tag};
use crate::schema::{file_tags, files, tags};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct TagResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: Option<String>,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            user_id: tag.user_id,
            name: tag.name,
            color: tag.color,
        }
    }
}

pub async fn list_tags(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<TagResponse>>> {
    require_self(user_id, &auth)?;
    let mut conn = state.db()?;
    let rows: Vec<Tag> = tags::table
        .filter(tags::user_id.eq(user_id))
        .filter(tags::deleted_at.is_null())
        .order(tags::name.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(TagResponse::from).collect()))
}

pub async fn create_tag(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(payload): Json<CreateTagRequest>,
) -> AppResult<(StatusCode, Json<TagResponse>)> {
    require_self(user_id, &auth)?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("tag name must not be empty"));
    }

    let new_tag = NewTag {
        id: Uuid::new_v4(),
        user_id,
        name,
        color: payload.color,
    };

    let mut conn = state.db()?;
    match diesel::insert_into(tags::table)
        .values(&new_tag)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("a tag with that name already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let tag: Tag = tags::table.find(new_tag.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Path((user_id, tag_id)): Path<(Uuid, Uuid)>,
    auth: AuthenticatedUser,
    Json(payload): Json<UpdateTagRequest>,
) -> AppResult<Json<TagResponse>> {
    require_self(user_id, &auth)?;
    let mut conn = state.db()?;
    let mut tag = load_owned_tag(&mut conn, tag_id, user_id)?;

    if let Some(name) = payload.name {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::bad_request("tag name must not be empty"));
        }
        tag.name = trimmed.to_string();
    }
    if let Some(color) = payload.color {
        tag.color = Some(color);
    }

    let result = diesel::update(tags::table.find(tag_id))
        .set((tags::name.eq(&tag.name), tags::color.eq(&tag.color)))
        .execute(&mut conn);
    match result {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("a tag with that name already exists"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    Ok(Json(tag.into()))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Path((user_id, tag_id)): Path<(Uuid, Uuid)>,
    auth: AuthenticatedUser,
) -> AppResult<StatusCode> {
    require_self(user_id, &auth)?;
    let mut conn = state.db()?;
    load_owned_tag(&mut conn, tag_id, user_id)?;

    // Assignments go with the tag so stale links never resurface.
    diesel::delete(file_tags::table.filter(file_tags::tag_id.eq(tag_id))).execute(&mut conn)?;
    diesel::update(tags::table.find(tag_id))
        .set(tags::deleted_at.eq(Some(Utc::now())))
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn attach_tag(
    State(state): State<AppState>,
    Path((file_id, tag_id)): Path<(Uuid, Uuid)>,
    auth: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    require_owned_file(&mut conn, file_id, auth.user_id)?;
    load_owned_tag(&mut conn, tag_id, auth.user_id)?;

    let result = diesel::insert_into(file_tags::table)
        .values(&NewFileTag { file_id, tag_id })
        .execute(&mut conn);
    match result {
        // Attaching an already-attached tag is a no-op.
        Ok(_)
        | Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Ok(StatusCode::NO_CONTENT)
        }
        Err(err) => Err(AppError::from(err)),
    }
}

pub async fn detach_tag(
    State(state): State<AppState>,
    Path((file_id, tag_id)): Path<(Uuid, Uuid)>,
    auth: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    require_owned_file(&mut conn, file_id, auth.user_id)?;

    diesel::delete(
        file_tags::table
            .filter(file_tags::file_id.eq(file_id))
            .filter(file_tags::tag_id.eq(tag_id)),
    )
    .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

fn require_self(user_id: Uuid, auth: &AuthenticatedUser) -> AppResult<()> {
    if user_id != auth.user_id {
        return Err(AppError::forbidden());
    }
    Ok(())
}

fn load_owned_tag(conn: &mut PgConnection, tag_id: Uuid, user_id: Uuid) -> AppResult<Tag> {
    let tag: Tag = tags::table.find(tag_id).first(conn)?;
    if tag.deleted_at.is_some() || tag.user_id != user_id {
        return Err(AppError::not_found());
    }
    Ok(tag)
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
