use axum::extract::{Json, Path, State};
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{
    FileSettings, NewFileSettings, NewUserSettings, UserSettings,
};
use crate::schema::{file_settings, files, user_settings};
use crate::state::AppState;

const DEFAULT_BACKGROUND: &str = "var(--surface-page)";
const DEFAULT_FONT_SIZE: &str = "16px";
const DEFAULT_FONT_FAMILY: &str = "Source Sans 3";
const DEFAULT_LINE_HEIGHT: &str = "1.5";
const DEFAULT_MARGIN_WIDTH: &str = "64px";
const DEFAULT_COLUMNS: i32 = 1;

#[derive(Deserialize)]
pub struct SaveSettingsRequest {
    pub background: Option<String>,
    pub font_size: Option<String>,
    pub font_family: Option<String>,
    pub line_height: Option<String>,
    pub margin_width: Option<String>,
    pub columns: Option<i32>,
    pub email_notifications: Option<bool>,
}

#[derive(Serialize)]
pub struct SettingsResponse {
    pub background: String,
    pub font_size: String,
    pub font_family: String,
    pub line_height: String,
    pub margin_width: String,
    pub columns: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<bool>,
}

impl SettingsResponse {
    fn defaults() -> Self {
        Self {
            background: DEFAULT_BACKGROUND.to_string(),
            font_size: DEFAULT_FONT_SIZE.to_string(),
            font_family: DEFAULT_FONT_FAMILY.to_string(),
            line_height: DEFAULT_LINE_HEIGHT.to_string(),
            margin_width: DEFAULT_MARGIN_WIDTH.to_string(),
            columns: DEFAULT_COLUMNS,
            email_notifications: None,
        }
    }
}

impl From<UserSettings> for SettingsResponse {
    fn from(settings: UserSettings) -> Self {
        Self {
            background: settings.background,
            font_size: settings.font_size,
            font_family: settings.font_family,
            line_height: settings.line_height,
            margin_width: settings.margin_width,
            columns: settings.columns,
            email_notifications: Some(settings.email_notifications),
        }
    }
}

impl From<FileSettings> for SettingsResponse {
    fn from(settings: FileSettings) -> Self {
        Self {
            background: settings.background,
            font_size: settings.font_size,
            font_family: settings.font_family,
            line_height: settings.line_height,
            margin_width: settings.margin_width,
            columns: settings.columns,
            email_notifications: None,
        }
    }
}

/// Missing rows answer with the documented defaults rather than a 404, so
/// clients never special-case a first visit.
pub async fn get_user_settings(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> AppResult<Json<SettingsResponse>> {
    let mut conn = state.db()?;
    let existing = load_user_settings(&mut conn, auth.user_id)?;
    Ok(Json(match existing {
        Some(settings) => settings.into(),
        None => {
            let mut defaults = SettingsResponse::defaults();
            defaults.email_notifications = Some(true);
            defaults
        }
    }))
}

pub async fn save_user_settings(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<SaveSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    validate_columns(payload.columns)?;
    let mut conn = state.db()?;

    let saved: UserSettings = match load_user_settings(&mut conn, auth.user_id)? {
        Some(existing) => {
            diesel::update(user_settings::table.find(existing.id))
                .set((
                    user_settings::background
                        .eq(payload.background.unwrap_or(existing.background)),
                    user_settings::font_size.eq(payload.font_size.unwrap_or(existing.font_size)),
                    user_settings::font_family
                        .eq(payload.font_family.unwrap_or(existing.font_family)),
                    user_settings::line_height
                        .eq(payload.line_height.unwrap_or(existing.line_height)),
                    user_settings::margin_width
                        .eq(payload.margin_width.unwrap_or(existing.margin_width)),
                    user_settings::columns_.eq(payload.columns.unwrap_or(existing.columns)),
                    user_settings::email_notifications.eq(payload
                        .email_notifications
                        .unwrap_or(existing.email_notifications)),
                    user_settings::updated_at.eq(Utc::now()),
                ))
                .get_result(&mut conn)?
        }
        None => {
            let new_settings = NewUserSettings {
                id: Uuid::new_v4(),
                user_id: auth.user_id,
                background: payload
                    .background
                    .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
                font_size: payload
                    .font_size
                    .unwrap_or_else(|| DEFAULT_FONT_SIZE.to_string()),
                font_family: payload
                    .font_family
                    .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
                line_height: payload
                    .line_height
                    .unwrap_or_else(|| DEFAULT_LINE_HEIGHT.to_string()),
                margin_width: payload
                    .margin_width
                    .unwrap_or_else(|| DEFAULT_MARGIN_WIDTH.to_string()),
                columns: payload.columns.unwrap_or(DEFAULT_COLUMNS),
                email_notifications: payload.email_notifications.unwrap_or(true),
            };
            diesel::insert_into(user_settings::table)
                .values(&new_settings)
                .get_result(&mut conn)?
        }
    };

    Ok(Json(saved.into()))
}

pub async fn get_file_settings(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    auth: AuthenticatedUser,
) -> AppResult<Json<SettingsResponse>> {
    let mut conn = state.db()?;
    require_owned_file(&mut conn, file_id, auth.user_id)?;

    let existing = load_file_settings(&mut conn, auth.user_id, file_id)?;
    Ok(Json(match existing {
        Some(settings) => settings.into(),
        None => SettingsResponse::defaults(),
    }))
}

pub async fn save_file_settings(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    auth: AuthenticatedUser,
    Json(payload): Json<SaveSettingsRequest>,
) -> AppResult<Json<SettingsResponse>> {
    validate_columns(payload.columns)?;
    let mut conn = state.db()?;
    require_owned_file(&mut conn, file_id, auth.user_id)?;

    let saved: FileSettings = match load_file_settings(&mut conn, auth.user_id, file_id)? {
        Some(existing) => {
            diesel::update(file_settings::table.find(existing.id))
                .set((
                    file_settings::background
                        .eq(payload.background.unwrap_or(existing.background)),
                    file_settings::font_size.eq(payload.font_size.unwrap_or(existing.font_size)),
                    file_settings::font_family
                        .eq(payload.font_family.unwrap_or(existing.font_family)),
                    file_settings::line_height
                        .eq(payload.line_height.unwrap_or(existing.line_height)),
                    file_settings::margin_width
                        .eq(payload.margin_width.unwrap_or(existing.margin_width)),
                    file_settings::columns_.eq(payload.columns.unwrap_or(existing.columns)),
                    file_settings::updated_at.eq(Utc::now()),
                ))
                .get_result(&mut conn)?
        }
        None => {
            let new_settings = NewFileSettings {
                id: Uuid::new_v4(),
                user_id: auth.user_id,
                file_id,
                background: payload
                    .background
                    .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
                font_size: payload
                    .font_size
                    .unwrap_or_else(|| DEFAULT_FONT_SIZE.to_string()),
                font_family: payload
                    .font_family
                    .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
                line_height: payload
                    .line_height
                    .unwrap_or_else(|| DEFAULT_LINE_HEIGHT.to_string()),
                margin_width: payload
                    .margin_width
                    .unwrap_or_else(|| DEFAULT_MARGIN_WIDTH.to_string()),
                columns: payload.columns.unwrap_or(DEFAULT_COLUMNS),
            };
            diesel::insert_into(file_settings::table)
                .values(&new_settings)
                .get_result(&mut conn)?
        }
    };

    Ok(Json(saved.into()))
}

fn validate_columns(columns: Option<i32>) -> AppResult<()> {
    if let Some(columns) = columns {
        if !(1..=3).contains(&columns) {
            return Err(AppError::bad_request("columns must be between 1 and 3"));
        }
    }
    Ok(())
}

fn load_user_settings(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> AppResult<Option<UserSettings>> {
    user_settings::table
        .filter(user_settings::user_id.eq(user_id))
        .filter(user_settings::deleted_at.is_null())
        .first(conn)
        .optional()
        .map_err(AppError::from)
}

fn load_file_settings(
    conn: &mut PgConnection,
    user_id: Uuid,
    file_id: Uuid,
) -> AppResult<Option<FileSettings>> {
    file_settings::table
        .filter(file_settings::user_id.eq(user_id))
        .filter(file_settings::file_id.eq(file_id))
        .filter(file_settings::deleted_at.is_null())
        .first(conn)
        .optional()
        .map_err(AppError::from)
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
