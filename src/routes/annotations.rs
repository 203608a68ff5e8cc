use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Annotation, AnnotationMessage, NewAnnotation, NewAnnotationMessage};
use crate::schema::{annotation_messages, annotations, files};
use crate::state::AppState;

const ANNOTATION_KINDS: &[&str] = &["comment", "note"];

#[derive(Deserialize)]
pub struct CreateAnnotationRequest {
    pub kind: String,
    #[serde(default)]
    pub position: i32,
    /// Optional first message, created alongside the annotation.
    pub message: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateAnnotationRequest {
    pub kind: Option<String>,
    pub position: Option<i32>,
}

#[derive(Deserialize)]
pub struct CreateMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct AnnotationResponse {
    pub id: Uuid,
    pub file_id: Uuid,
    pub owner_id: Uuid,
    pub kind: String,
    pub position: i32,
    pub created_at: String,
}

impl From<Annotation> for AnnotationResponse {
    fn from(annotation: Annotation) -> Self {
        Self {
            id: annotation.id,
            file_id: annotation.file_id,
            owner_id: annotation.owner_id,
            kind: annotation.kind,
            position: annotation.position,
            created_at: annotation.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub annotation_id: Uuid,
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: String,
}

impl From<AnnotationMessage> for MessageResponse {
    fn from(message: AnnotationMessage) -> Self {
        Self {
            id: message.id,
            annotation_id: message.annotation_id,
            owner_id: message.owner_id,
            content: message.content,
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

pub async fn list_annotations(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<AnnotationResponse>>> {
    let mut conn = state.db()?;
    require_owned_file(&mut conn, file_id, auth.user_id)?;

    let rows: Vec<Annotation> = annotations::table
        .filter(annotations::file_id.eq(file_id))
        .filter(annotations::deleted_at.is_null())
        .order((annotations::position.asc(), annotations::created_at.asc()))
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(AnnotationResponse::from).collect()))
}

pub async fn create_annotation(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(payload): Json<CreateAnnotationRequest>,
) -> AppResult<(StatusCode, Json<AnnotationResponse>)> {
    if !ANNOTATION_KINDS.contains(&payload.kind.as_str()) {
        return Err(AppError::bad_request("kind must be 'comment' or 'note'"));
    }
    if payload.position < 0 {
        return Err(AppError::bad_request("position must not be negative"));
    }

    let mut conn = state.db()?;
    require_owned_file(&mut conn, file_id, auth.user_id)?;

    let new_annotation = NewAnnotation {
        id: Uuid::new_v4(),
        file_id,
        owner_id: auth.user_id,
        kind: payload.kind,
        position: payload.position,
    };
    diesel::insert_into(annotations::table)
        .values(&new_annotation)
        .execute(&mut conn)?;

    if let Some(content) = payload.message {
        let trimmed = content.trim();
        if !trimmed.is_empty() {
            diesel::insert_into(annotation_messages::table)
                .values(&NewAnnotationMessage {
                    id: Uuid::new_v4(),
                    annotation_id: new_annotation.id,
                    owner_id: auth.user_id,
                    content: trimmed.to_string(),
                })
                .execute(&mut conn)?;
        }
    }

    let annotation: Annotation = annotations::table.find(new_annotation.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(annotation.into())))
}

pub async fn update_annotation(
    State(state): State<AppState>,
    Path(annotation_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(payload): Json<UpdateAnnotationRequest>,
) -> AppResult<Json<AnnotationResponse>> {
    let mut conn = state.db()?;
    let mut annotation = load_owned_annotation(&mut conn, annotation_id, auth.user_id)?;

    if let Some(kind) = payload.kind {
        if !ANNOTATION_KINDS.contains(&kind.as_str()) {
            return Err(AppError::bad_request("kind must be 'comment' or 'note'"));
        }
        annotation.kind = kind;
    }
    if let Some(position) = payload.position {
        if position < 0 {
            return Err(AppError::bad_request("position must not be negative"));
        }
        annotation.position = position;
    }

    diesel::update(annotations::table.find(annotation_id))
        .set((
            annotations::kind.eq(&annotation.kind),
            annotations::position.eq(annotation.position),
        ))
        .execute(&mut conn)?;

    Ok(Json(annotation.into()))
}

pub async fn delete_annotation(
    State(state): State<AppState>,
    Path(annotation_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;
    load_owned_annotation(&mut conn, annotation_id, auth.user_id)?;

    let now = Utc::now();
    diesel::update(
        annotation_messages::table.filter(annotation_messages::annotation_id.eq(annotation_id)),
    )
    .set(annotation_messages::deleted_at.eq(Some(now)))
    .execute(&mut conn)?;
    diesel::update(annotations::table.find(annotation_id))
        .set(annotations::deleted_at.eq(Some(now)))
        .execute(&mut conn)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(annotation_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<Vec<MessageResponse>>> {
    let mut conn = state.db()?;
    load_owned_annotation(&mut conn, annotation_id, auth.user_id)?;

    let rows: Vec<AnnotationMessage> = annotation_messages::table
        .filter(annotation_messages::annotation_id.eq(annotation_id))
        .filter(annotation_messages::deleted_at.is_null())
        .order(annotation_messages::created_at.asc())
        .load(&mut conn)?;
    Ok(Json(rows.into_iter().map(MessageResponse::from).collect()))
}

pub async fn create_message(
    State(state): State<AppState>,
    Path(annotation_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(payload): Json<CreateMessageRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let content = payload.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::bad_request("message content must not be empty"));
    }

    let mut conn = state.db()?;
    load_owned_annotation(&mut conn, annotation_id, auth.user_id)?;

    let new_message = NewAnnotationMessage {
        id: Uuid::new_v4(),
        annotation_id,
        owner_id: auth.user_id,
        content,
    };
    diesel::insert_into(annotation_messages::table)
        .values(&new_message)
        .execute(&mut conn)?;

    let message: AnnotationMessage = annotation_messages::table
        .find(new_message.id)
        .first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(message.into())))
}

fn load_owned_annotation(
    conn: &mut PgConnection,
    annotation_id: Uuid,
    user_id: Uuid,
) -> AppResult<Annotation> {
    let annotation: Annotation = annotations::table.find(annotation_id).first(conn)?;
    if annotation.deleted_at.is_some() {
        return Err(AppError::not_found());
    }

    // Visible to the annotation author and to the file owner.
    if annotation.owner_id != user_id {
        let owns_file = diesel::select(diesel::dsl::exists(
            files::table
                .filter(files::id.eq(annotation.file_id))
                .filter(files::owner_id.eq(user_id))
                .filter(files::deleted_at.is_null()),
        ))
        .get_result::<bool>(conn)?;
        if !owns_file {
            return Err(AppError::not_found());
        }
    }
    Ok(annotation)
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
