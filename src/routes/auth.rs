use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    models::{NewUser, User},
    schema::users::dsl,
    schema::users,
    services::email,
    state::AppState,
};

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub initials: Option<String>,
    pub affiliation: Option<String>,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub initials: Option<String>,
    pub affiliation: Option<String>,
    pub email_verified: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            initials: user.initials,
            affiliation: user.affiliation,
            email_verified: user.email_verified,
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let email_addr = payload.email.trim().to_lowercase();
    if email_addr.is_empty() || !email_addr.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let password_hash = password::hash_password(&payload.password)?;
    let verification_token = generate_token();
    let new_user = NewUser {
        id: Uuid::new_v4(),
        email: email_addr.clone(),
        password_hash,
        name: name.clone(),
        initials: payload.initials.map(|i| i.trim().to_string()),
        affiliation: payload.affiliation.map(|a| a.trim().to_string()),
        verification_token_hash: Some(hash_token(&verification_token)),
    };

    let mut conn = state.db()?;
    match diesel::insert_into(users::table)
        .values(&new_user)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict("email is already registered"));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let user: User = users::table.find(new_user.id).first(&mut conn)?;
    drop(conn);

    let verify_url = format!(
        "{}/verify/{}",
        state.config.base_url.trim_end_matches('/'),
        verification_token
    );
    let (subject, html) = email::verification_email(&user.name, &verify_url);
    if let Err(err) = state.mailer.send(&user.email, &subject, &html).await {
        warn!(error = %err, user_id = %user.id, "failed to send verification email");
    }

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email_addr = payload.email.trim().to_lowercase();
    let mut conn = state.db()?;

    let user: User = match dsl::users
        .filter(dsl::email.eq(&email_addr))
        .filter(dsl::deleted_at.is_null())
        .first(&mut conn)
    {
        Ok(user) => user,
        Err(diesel::result::Error::NotFound) => return Err(AppError::unauthorized()),
        Err(err) => return Err(AppError::from(err)),
    };

    let valid = password::verify_password(&payload.password, &user.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let access_token = state
        .jwt
        .generate_token(user.id, &user.email)
        .map_err(AppError::from)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let mut conn = state.db()?;
    let user: User = users::table.find(auth.user_id).first(&mut conn)?;
    if user.deleted_at.is_some() {
        return Err(AppError::not_found());
    }
    Ok(Json(user.into()))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<StatusCode> {
    let hashed = hash_token(&token);
    let mut conn = state.db()?;

    let updated = diesel::update(
        dsl::users
            .filter(dsl::verification_token_hash.eq(&hashed))
            .filter(dsl::deleted_at.is_null()),
    )
    .set((
        dsl::email_verified.eq(true),
        dsl::verification_token_hash.eq(None::<String>),
        dsl::updated_at.eq(Utc::now()),
    ))
    .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::not_found());
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
